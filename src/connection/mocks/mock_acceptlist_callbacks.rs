//! Mocked implementation of the accept-list observer callbacks for use in
//! test

use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver};

use crate::{
    connection::{callbacks::LeAcceptlistCallbacks, error::ErrorCode},
    core::address::AddressWithType,
};

/// Routes calls to LeAcceptlistCallbacks into a channel of
/// MockAcceptlistEvents
pub struct MockAcceptlistCallbacks(mpsc::UnboundedSender<MockAcceptlistEvents>);

impl MockAcceptlistCallbacks {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockAcceptlistEvents>) {
        let (tx, rx) = unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to LeAcceptlistCallbacks
#[derive(Debug)]
pub enum MockAcceptlistEvents {
    /// LeAcceptlistCallbacks#on_le_connect_success invoked
    OnLeConnectSuccess(AddressWithType),
    /// LeAcceptlistCallbacks#on_le_connect_fail invoked
    OnLeConnectFail(AddressWithType, ErrorCode),
    /// LeAcceptlistCallbacks#on_le_disconnection invoked
    OnLeDisconnection(AddressWithType),
    /// LeAcceptlistCallbacks#on_resolving_list_change invoked
    OnResolvingListChange,
}

impl LeAcceptlistCallbacks for MockAcceptlistCallbacks {
    fn on_le_connect_success(&self, address: AddressWithType) {
        self.0.send(MockAcceptlistEvents::OnLeConnectSuccess(address)).unwrap();
    }

    fn on_le_connect_fail(&self, address: AddressWithType, reason: ErrorCode) {
        self.0.send(MockAcceptlistEvents::OnLeConnectFail(address, reason)).unwrap();
    }

    fn on_le_disconnection(&self, address: AddressWithType) {
        self.0.send(MockAcceptlistEvents::OnLeDisconnection(address)).unwrap();
    }

    fn on_resolving_list_change(&self) {
        self.0.send(MockAcceptlistEvents::OnResolvingListChange).unwrap();
    }
}
