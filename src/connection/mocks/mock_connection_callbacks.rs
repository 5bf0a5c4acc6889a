//! Mocked implementation of the primary client callbacks for use in test

use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver};

use crate::{
    connection::{
        acl_connection::LeAclConnection, callbacks::LeConnectionCallbacks, error::ErrorCode,
    },
    core::address::AddressWithType,
};

/// Routes calls to LeConnectionCallbacks into a channel of
/// MockConnectionEvents
pub struct MockConnectionCallbacks(mpsc::UnboundedSender<MockConnectionEvents>);

impl MockConnectionCallbacks {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockConnectionEvents>) {
        let (tx, rx) = unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to LeConnectionCallbacks
#[derive(Debug)]
pub enum MockConnectionEvents {
    /// LeConnectionCallbacks#on_le_connect_success invoked
    OnLeConnectSuccess(AddressWithType, LeAclConnection),
    /// LeConnectionCallbacks#on_le_connect_fail invoked
    OnLeConnectFail(AddressWithType, ErrorCode),
}

impl LeConnectionCallbacks for MockConnectionCallbacks {
    fn on_le_connect_success(&self, address: AddressWithType, connection: LeAclConnection) {
        self.0.send(MockConnectionEvents::OnLeConnectSuccess(address, connection)).unwrap();
    }

    fn on_le_connect_fail(&self, address: AddressWithType, reason: ErrorCode) {
        self.0.send(MockConnectionEvents::OnLeConnectFail(address, reason)).unwrap();
    }
}
