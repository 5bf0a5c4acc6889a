//! The client-facing handle to a live LE ACL connection, plus the
//! role-specific identity data attached to it.

use std::sync::{Arc, Weak};

use log::warn;

use crate::core::address::{Address, AddressWithType, PeerAddressType};

use super::{
    callbacks::LeConnectionManagementCallbacks,
    connection_table::ConnectionTable,
    ids::{AdvertiserId, ConnectionHandle, Generation},
};

/// Our role on a connection, as reported by the controller
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// We initiated the connection
    Central,
    /// The peer connected to one of our advertisements
    Peripheral,
}

/// The local identity context of a connection, which differs by role
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleSpecificData {
    /// We initiated with this local address
    Central {
        /// The initiator address in use when the connection completed
        local_address: AddressWithType,
    },
    /// The peer connected to an advertisement using this local identity
    Peripheral {
        /// The advertised address the peer connected to
        local_address: AddressWithType,
        /// The advertising set the peer connected to, when sets are
        /// individually identified
        advertising_set_id: Option<AdvertiserId>,
        /// Whether the advertisement was discoverable
        discoverable: bool,
    },
    /// The peer connected to one of several advertising sets and we do not
    /// yet know which; completed by the set-terminated notification
    UninitializedPeripheral,
}

/// A live connection, owned by the client that requested it (or accepted
/// it, for peripheral connections). The connection table holds only a weak
/// association from the handle to the callbacks attached here.
#[derive(Debug)]
pub struct LeAclConnection {
    handle: ConnectionHandle,
    generation: Generation,
    remote_address: AddressWithType,
    peer_address: Address,
    peer_address_type: Option<PeerAddressType>,
    pub(crate) role_specific_data: RoleSpecificData,
    conn_interval: u16,
    conn_latency: u16,
    supervision_timeout: u16,
    local_resolvable_private_address: Option<Address>,
    peer_resolvable_private_address: Option<Address>,
    in_filter_accept_list: bool,
    locally_initiated: bool,
    table: Weak<ConnectionTable>,
}

impl LeAclConnection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        handle: ConnectionHandle,
        generation: Generation,
        remote_address: AddressWithType,
        peer_address: Address,
        peer_address_type: Option<PeerAddressType>,
        role_specific_data: RoleSpecificData,
        conn_interval: u16,
        conn_latency: u16,
        supervision_timeout: u16,
        local_resolvable_private_address: Option<Address>,
        peer_resolvable_private_address: Option<Address>,
        in_filter_accept_list: bool,
        locally_initiated: bool,
        table: Weak<ConnectionTable>,
    ) -> Self {
        Self {
            handle,
            generation,
            remote_address,
            peer_address,
            peer_address_type,
            role_specific_data,
            conn_interval,
            conn_latency,
            supervision_timeout,
            local_resolvable_private_address,
            peer_resolvable_private_address,
            in_filter_accept_list,
            locally_initiated,
            table,
        }
    }

    /// The controller-assigned connection handle
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// The peer device address, normalized to a device address type
    pub fn remote_address(&self) -> AddressWithType {
        self.remote_address
    }

    /// The raw peer address bytes as reported in the completion event
    pub fn peer_address(&self) -> Address {
        self.peer_address
    }

    /// The raw peer address type, when the completion event carried one
    pub fn peer_address_type(&self) -> Option<PeerAddressType> {
        self.peer_address_type
    }

    /// The local identity context of this connection
    pub fn role_specific_data(&self) -> &RoleSpecificData {
        &self.role_specific_data
    }

    /// The negotiated connection interval (1.25 ms units)
    pub fn conn_interval(&self) -> u16 {
        self.conn_interval
    }

    /// The negotiated peripheral latency
    pub fn conn_latency(&self) -> u16 {
        self.conn_latency
    }

    /// The negotiated supervision timeout (10 ms units)
    pub fn supervision_timeout(&self) -> u16 {
        self.supervision_timeout
    }

    /// The local resolvable private address, when privacy was in use
    pub fn local_resolvable_private_address(&self) -> Option<Address> {
        self.local_resolvable_private_address
    }

    /// The peer resolvable private address, when the peer used one
    pub fn peer_resolvable_private_address(&self) -> Option<Address> {
        self.peer_resolvable_private_address
    }

    /// Whether the peer was on the filter accept list when it connected
    pub fn in_filter_accept_list(&self) -> bool {
        self.in_filter_accept_list
    }

    /// Whether we initiated the connection
    pub fn locally_initiated(&self) -> bool {
        self.locally_initiated
    }

    /// Attach per-connection event callbacks. The attachment is rejected
    /// (with a log) if the connection has since been released, even if the
    /// controller has already reused the handle for a new connection.
    pub fn register_callbacks(&self, callbacks: Arc<dyn LeConnectionManagementCallbacks>) {
        let Some(table) = self.table.upgrade() else {
            warn!("attaching callbacks for {:?} after the connection table is gone", self.handle);
            return;
        };
        if !table.attach_callbacks(self.handle, self.generation, callbacks) {
            warn!("attaching callbacks for {:?} after the connection was released", self.handle);
        }
    }
}
