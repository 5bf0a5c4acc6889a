//! Routing of asynchronous controller events to the connection table and
//! the per-connection callback sets. The event space is a closed enum, so a
//! new event kind is a compile error at the dispatch site rather than a
//! runtime fatal.

use log::{info, warn};

use crate::core::address::{Address, AddressType, AddressWithType, PeerAddressType};

use super::{
    acl_connection::{Role, RoleSpecificData},
    controller::ConnectionParameterRequestReply,
    error::ErrorCode,
    ids::{AdvertiserId, ConnectionHandle},
    LeConnectionManager,
};

/// An LE connection-complete event
#[derive(Clone, Debug)]
pub struct LeConnectionCompleteEvent {
    /// Completion status
    pub status: ErrorCode,
    /// The handle assigned to the new connection
    pub connection_handle: ConnectionHandle,
    /// Our role on the connection
    pub role: Role,
    /// The peer device address type
    pub peer_address_type: AddressType,
    /// The peer device address
    pub peer_address: Address,
    /// Negotiated connection interval (1.25 ms units)
    pub conn_interval: u16,
    /// Negotiated peripheral latency
    pub conn_latency: u16,
    /// Negotiated supervision timeout (10 ms units)
    pub supervision_timeout: u16,
}

/// An LE enhanced-connection-complete event, carrying the resolvable
/// private addresses in use when privacy is enabled
#[derive(Clone, Debug)]
pub struct LeEnhancedConnectionCompleteEvent {
    /// Completion status
    pub status: ErrorCode,
    /// The handle assigned to the new connection
    pub connection_handle: ConnectionHandle,
    /// Our role on the connection
    pub role: Role,
    /// The peer address type, distinguishing identity addresses
    pub peer_address_type: PeerAddressType,
    /// The peer device address
    pub peer_address: Address,
    /// The local resolvable private address in use, or zero
    pub local_resolvable_private_address: Address,
    /// The peer resolvable private address in use, or zero
    pub peer_resolvable_private_address: Address,
    /// Negotiated connection interval (1.25 ms units)
    pub conn_interval: u16,
    /// Negotiated peripheral latency
    pub conn_latency: u16,
    /// Negotiated supervision timeout (10 ms units)
    pub supervision_timeout: u16,
}

/// The controller events consumed by the connection manager
#[derive(Clone, Debug)]
pub enum LeAclEvent {
    /// A (legacy) connection attempt completed
    ConnectionComplete(LeConnectionCompleteEvent),
    /// A connection attempt completed, with privacy addressing detail
    EnhancedConnectionComplete(LeEnhancedConnectionCompleteEvent),
    /// A connection parameter update completed
    ConnectionUpdateComplete {
        /// Completion status
        status: ErrorCode,
        /// The affected connection
        connection_handle: ConnectionHandle,
        /// New connection interval (1.25 ms units)
        conn_interval: u16,
        /// New peripheral latency
        conn_latency: u16,
        /// New supervision timeout (10 ms units)
        supervision_timeout: u16,
    },
    /// The PHY in use on a connection changed
    PhyUpdateComplete {
        /// Completion status
        status: ErrorCode,
        /// The affected connection
        connection_handle: ConnectionHandle,
        /// Transmit PHY
        tx_phy: u8,
        /// Receive PHY
        rx_phy: u8,
    },
    /// The data length in use on a connection changed
    DataLengthChange {
        /// The affected connection
        connection_handle: ConnectionHandle,
        /// Maximum transmit payload
        max_tx_octets: u16,
        /// Maximum transmit time (microseconds)
        max_tx_time: u16,
        /// Maximum receive payload
        max_rx_octets: u16,
        /// Maximum receive time (microseconds)
        max_rx_time: u16,
    },
    /// The peer requested new connection parameters
    RemoteConnectionParameterRequest {
        /// The affected connection
        connection_handle: ConnectionHandle,
        /// Requested minimum interval (1.25 ms units)
        interval_min: u16,
        /// Requested maximum interval (1.25 ms units)
        interval_max: u16,
        /// Requested peripheral latency
        latency: u16,
        /// Requested supervision timeout (10 ms units)
        timeout: u16,
    },
    /// The subrate parameters of a connection changed
    SubrateChange {
        /// Completion status
        status: ErrorCode,
        /// The affected connection
        connection_handle: ConnectionHandle,
        /// New subrate factor
        subrate_factor: u16,
        /// New peripheral latency in subrated events
        peripheral_latency: u16,
        /// New continuation number
        continuation_number: u16,
        /// New supervision timeout (10 ms units)
        supervision_timeout: u16,
    },
    /// The remote version information read completed
    ReadRemoteVersionComplete {
        /// Completion status
        status: ErrorCode,
        /// The affected connection
        connection_handle: ConnectionHandle,
        /// Link layer version
        version: u8,
        /// Manufacturer identifier
        manufacturer_name: u16,
        /// Manufacturer-controlled subversion
        sub_version: u16,
    },
    /// A connection was released
    Disconnect {
        /// The released connection
        connection_handle: ConnectionHandle,
        /// Why the connection ended
        reason: ErrorCode,
    },
    /// An advertising set stopped because a peer connected to it; carries
    /// the identity a pending peripheral connection was waiting for
    AdvertisingSetTerminated {
        /// The connection that terminated the set
        connection_handle: ConnectionHandle,
        /// The terminated advertising set
        advertising_set_id: AdvertiserId,
        /// The address the set was advertising with
        advertiser_address: AddressWithType,
        /// Whether the advertisement was discoverable
        discoverable: bool,
    },
}

impl LeConnectionManager {
    /// Process one controller event. Must be invoked on the serial context.
    pub fn on_le_event(&self, event: LeAclEvent) {
        match event {
            LeAclEvent::ConnectionComplete(event) => self.on_le_connection_complete(event),
            LeAclEvent::EnhancedConnectionComplete(event) => {
                self.on_le_enhanced_connection_complete(event)
            }
            LeAclEvent::ConnectionUpdateComplete {
                status,
                connection_handle,
                conn_interval,
                conn_latency,
                supervision_timeout,
            } => self.connections.execute(connection_handle, |callbacks| {
                callbacks.on_connection_update(
                    status,
                    conn_interval,
                    conn_latency,
                    supervision_timeout,
                )
            }),
            LeAclEvent::PhyUpdateComplete { status, connection_handle, tx_phy, rx_phy } => {
                self.connections.execute(connection_handle, |callbacks| {
                    callbacks.on_phy_update(status, tx_phy, rx_phy)
                })
            }
            LeAclEvent::DataLengthChange {
                connection_handle,
                max_tx_octets,
                max_tx_time,
                max_rx_octets,
                max_rx_time,
            } => self.connections.execute(connection_handle, |callbacks| {
                callbacks.on_data_length_change(max_tx_octets, max_tx_time, max_rx_octets, max_rx_time)
            }),
            LeAclEvent::RemoteConnectionParameterRequest {
                connection_handle,
                interval_min,
                interval_max,
                latency,
                timeout,
            } => self.on_remote_connection_parameter_request(
                connection_handle,
                interval_min,
                interval_max,
                latency,
                timeout,
            ),
            LeAclEvent::SubrateChange {
                status,
                connection_handle,
                subrate_factor,
                peripheral_latency,
                continuation_number,
                supervision_timeout,
            } => self.connections.execute(connection_handle, |callbacks| {
                callbacks.on_subrate_change(
                    status,
                    subrate_factor,
                    peripheral_latency,
                    continuation_number,
                    supervision_timeout,
                )
            }),
            LeAclEvent::ReadRemoteVersionComplete {
                status,
                connection_handle,
                version,
                manufacturer_name,
                sub_version,
            } => self.connections.execute(connection_handle, |callbacks| {
                callbacks.on_read_remote_version_information(
                    status,
                    version,
                    manufacturer_name,
                    sub_version,
                )
            }),
            LeAclEvent::Disconnect { connection_handle, reason } => {
                self.on_le_disconnect(connection_handle, reason)
            }
            LeAclEvent::AdvertisingSetTerminated {
                connection_handle,
                advertising_set_id,
                advertiser_address,
                discoverable,
            } => self.on_advertising_set_terminated(
                connection_handle,
                advertising_set_id,
                advertiser_address,
                discoverable,
            ),
        }
    }

    fn on_remote_connection_parameter_request(
        &self,
        connection_handle: ConnectionHandle,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        timeout: u16,
    ) {
        if self.connections.get_address(connection_handle).is_none() {
            warn!("dropping parameter request for unknown handle {connection_handle:?}");
            return;
        }
        // TODO: this is blindly accepting any parameters, just so we don't
        // hang the connection; add proper parameter negotiation
        self.controller.connection_parameter_request_reply(
            connection_handle,
            ConnectionParameterRequestReply {
                interval_min,
                interval_max,
                latency,
                timeout,
                min_ce_length: 0,
                max_ce_length: 0,
            },
            Box::new(|_| {}),
        );
    }

    fn on_le_disconnect(&self, connection_handle: ConnectionHandle, reason: ErrorCode) {
        let remote_address = self.connections.get_address(connection_handle);

        // disconnections also route to receivers outside this table, so an
        // unknown handle stays ignorable even in strict mode
        let event_also_routes_to_other_receivers = self.connections.strict();
        self.connections.set_strict(false);
        if remote_address.is_some() {
            self.scheduler.unregister(connection_handle);
        }
        self.connections
            .execute_and_remove(connection_handle, |callbacks| callbacks.on_disconnection(reason));
        self.connections.set_strict(event_also_routes_to_other_receivers);

        let Some(remote_address) = remote_address else {
            return;
        };

        self.acceptlist_callbacks.with(|callbacks| callbacks.on_le_disconnection(remote_address));

        if self.background_connections.borrow().contains(&remote_address) {
            info!("re-adding {remote_address:?} to the accept list for background reconnect");
            self.arm_on_resume.set(true);
            self.add_device_to_connect_list(remote_address);
        }
        self.check_for_unregister();
    }

    fn on_advertising_set_terminated(
        &self,
        connection_handle: ConnectionHandle,
        advertising_set_id: AdvertiserId,
        advertiser_address: AddressWithType,
        discoverable: bool,
    ) {
        let connection = self.connections.record_peripheral_data_and_extract_pending(
            connection_handle,
            RoleSpecificData::Peripheral {
                local_address: advertiser_address,
                advertising_set_id: Some(advertising_set_id),
                discoverable,
            },
        );

        let Some(connection) = connection else {
            info!("advertising set terminated without a pending connection on {connection_handle:?}");
            return;
        };

        let remote_address = connection.remote_address();
        self.acceptlist_callbacks.with(|callbacks| callbacks.on_le_connect_success(remote_address));
        self.client_callbacks
            .with(move |callbacks| callbacks.on_le_connect_success(remote_address, connection));
    }
}
