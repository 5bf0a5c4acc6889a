//! These are strongly-typed identifiers for the various objects handed
//! across the connection-manager boundary

/// The controller-assigned handle of an ACL connection. Unique only while
/// the connection is alive; the controller reuses handles after release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u16);

impl ConnectionHandle {
    /// Sentinel for "no such connection"
    pub const INVALID: Self = ConnectionHandle(0xffff);
}

/// The ID of an LE advertising set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdvertiserId(pub u8);

/// A tag distinguishing successive uses of the same connection handle, so
/// a reference to a released connection can never alias a later one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Generation(pub u64);
