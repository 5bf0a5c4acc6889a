//! The boundary to the round-robin packet scheduler, which needs to know the
//! set of live connection handles to apportion ACL credits.

use super::ids::ConnectionHandle;

/// Registration of live LE connections with the packet scheduler
pub trait RoundRobinScheduler {
    /// A connection with this handle is now live
    fn register_le_connection(&self, handle: ConnectionHandle);
    /// The connection with this handle has been released
    fn unregister(&self, handle: ConnectionHandle);
}
