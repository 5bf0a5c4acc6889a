//! Mocked implementation of the per-connection event callbacks for use in
//! test

use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver};

use crate::connection::{callbacks::LeConnectionManagementCallbacks, error::ErrorCode};

/// Routes calls to LeConnectionManagementCallbacks into a channel of
/// MockConnectionManagementEvents
pub struct MockConnectionManagementCallbacks(
    mpsc::UnboundedSender<MockConnectionManagementEvents>,
);

impl MockConnectionManagementCallbacks {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<MockConnectionManagementEvents>) {
        let (tx, rx) = unbounded_channel();
        (Self(tx), rx)
    }
}

/// Events representing calls to LeConnectionManagementCallbacks
#[derive(Debug)]
pub enum MockConnectionManagementEvents {
    /// LeConnectionManagementCallbacks#on_connection_update invoked
    OnConnectionUpdate(ErrorCode, u16, u16, u16),
    /// LeConnectionManagementCallbacks#on_phy_update invoked
    OnPhyUpdate(ErrorCode, u8, u8),
    /// LeConnectionManagementCallbacks#on_data_length_change invoked
    OnDataLengthChange(u16, u16, u16, u16),
    /// LeConnectionManagementCallbacks#on_subrate_change invoked
    OnSubrateChange(ErrorCode, u16, u16, u16, u16),
    /// LeConnectionManagementCallbacks#on_read_remote_version_information
    /// invoked
    OnReadRemoteVersionInformation(ErrorCode, u8, u16, u16),
    /// LeConnectionManagementCallbacks#on_disconnection invoked
    OnDisconnection(ErrorCode),
}

impl LeConnectionManagementCallbacks for MockConnectionManagementCallbacks {
    fn on_connection_update(
        &self,
        status: ErrorCode,
        conn_interval: u16,
        conn_latency: u16,
        supervision_timeout: u16,
    ) {
        self.0
            .send(MockConnectionManagementEvents::OnConnectionUpdate(
                status,
                conn_interval,
                conn_latency,
                supervision_timeout,
            ))
            .unwrap();
    }

    fn on_phy_update(&self, status: ErrorCode, tx_phy: u8, rx_phy: u8) {
        self.0.send(MockConnectionManagementEvents::OnPhyUpdate(status, tx_phy, rx_phy)).unwrap();
    }

    fn on_data_length_change(&self, tx_octets: u16, tx_time: u16, rx_octets: u16, rx_time: u16) {
        self.0
            .send(MockConnectionManagementEvents::OnDataLengthChange(
                tx_octets, tx_time, rx_octets, rx_time,
            ))
            .unwrap();
    }

    fn on_subrate_change(
        &self,
        status: ErrorCode,
        subrate_factor: u16,
        peripheral_latency: u16,
        continuation_number: u16,
        supervision_timeout: u16,
    ) {
        self.0
            .send(MockConnectionManagementEvents::OnSubrateChange(
                status,
                subrate_factor,
                peripheral_latency,
                continuation_number,
                supervision_timeout,
            ))
            .unwrap();
    }

    fn on_read_remote_version_information(
        &self,
        status: ErrorCode,
        version: u8,
        manufacturer_name: u16,
        sub_version: u16,
    ) {
        self.0
            .send(MockConnectionManagementEvents::OnReadRemoteVersionInformation(
                status,
                version,
                manufacturer_name,
                sub_version,
            ))
            .unwrap();
    }

    fn on_disconnection(&self, reason: ErrorCode) {
        self.0.send(MockConnectionManagementEvents::OnDisconnection(reason)).unwrap();
    }
}
