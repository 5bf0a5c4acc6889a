//! Logging initialization for host builds

/// Inits logging for host. Safe to call more than once; later calls are
/// no-ops so tests can share a process.
pub fn init_logging() {
    env_logger::Builder::new()
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .ok();
}
