use std::future::Future;

use bluetooth_le_acl::{core::logging::init_logging, utils::task::block_on_locally};

pub fn start_test(f: impl Future<Output = ()>) {
    init_logging();
    block_on_locally(f);
}
