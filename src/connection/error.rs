//! HCI status codes surfaced by the controller

use std::fmt;

/// An HCI Error Code from the controller
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ErrorCode(pub u8);

impl ErrorCode {
    /// Operation completed successfully
    pub const SUCCESS: Self = ErrorCode(0x00);
    /// The connection identified in the command does not exist; also the
    /// status of a connection-complete event for a cancelled attempt
    pub const UNKNOWN_CONNECTION: Self = ErrorCode(0x02);
    /// The peer did not complete the connection within the accept timeout
    pub const CONNECTION_ACCEPT_TIMEOUT: Self = ErrorCode(0x10);

    /// Whether this status reports success
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SUCCESS => write!(f, "SUCCESS"),
            Self::UNKNOWN_CONNECTION => write!(f, "UNKNOWN_CONNECTION"),
            Self::CONNECTION_ACCEPT_TIMEOUT => write!(f, "CONNECTION_ACCEPT_TIMEOUT"),
            Self(code) => write!(f, "UNKNOWN[{code:#04x}]"),
        }
    }
}
