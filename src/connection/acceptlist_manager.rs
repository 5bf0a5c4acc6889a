//! Accept-list and resolving-list bookkeeping, coordinated with the address
//! manager. The local connect_list set is the single source of truth for
//! membership; every controller-side mutation is issued through the address
//! manager, which pauses us around the actual list command.

use log::{info, warn};

use crate::core::address::AddressWithType;

use super::LeConnectionManager;

impl LeConnectionManager {
    /// Add a peer to the accept list. No-ops (with a log) if the peer is
    /// already connected or already listed.
    pub fn add_device_to_connect_list(&self, address: AddressWithType) {
        if self.connections.already_connected(address) {
            info!("device {address:?} already connected, not adding to accept list");
            return;
        }
        if self.connect_list.borrow().contains(&address) {
            warn!("device {address:?} already exists in accept list and cannot be added");
            return;
        }

        self.connect_list.borrow_mut().insert(address);
        self.register_with_address_manager();
        self.address_manager.add_device_to_filter_accept_list(address);
    }

    /// Whether the peer is on the accept list
    pub fn is_device_in_connect_list(&self, address: AddressWithType) -> bool {
        self.connect_list.borrow().contains(&address)
    }

    /// Remove a peer from the accept list, cascading to the in-flight
    /// connecting snapshot and any direct-connection intent.
    pub fn remove_device_from_connect_list(&self, address: AddressWithType) {
        if !self.connect_list.borrow().contains(&address) {
            warn!("device {address:?} not in accept list and cannot be removed");
            return;
        }
        self.connect_list.borrow_mut().remove(&address);
        self.connecting.borrow_mut().remove(&address);
        self.direct_connections.borrow_mut().remove(&address);
        self.register_with_address_manager();
        self.address_manager.remove_device_from_filter_accept_list(address);
    }

    /// Remove every peer from the accept list
    pub fn clear_filter_accept_list(&self) {
        self.connect_list.borrow_mut().clear();
        self.register_with_address_manager();
        self.address_manager.clear_filter_accept_list();
    }

    /// Add a peer identity to the controller resolving list
    pub fn add_device_to_resolving_list(
        &self,
        address: AddressWithType,
        peer_irk: [u8; 16],
        local_irk: [u8; 16],
    ) {
        self.register_with_address_manager();
        self.address_manager.add_device_to_resolving_list(address, peer_irk, local_irk);
        self.acceptlist_callbacks.with(|callbacks| callbacks.on_resolving_list_change());
    }

    /// Remove a peer identity from the controller resolving list
    pub fn remove_device_from_resolving_list(&self, address: AddressWithType) {
        self.register_with_address_manager();
        self.address_manager.remove_device_from_resolving_list(address);
        self.acceptlist_callbacks.with(|callbacks| callbacks.on_resolving_list_change());
    }

    /// Clear the controller resolving list
    pub fn clear_resolving_list(&self) {
        self.register_with_address_manager();
        self.address_manager.clear_resolving_list();
    }

    /// Mark a peer for silent accept-list re-add after disconnection
    pub fn add_device_to_background_connection_list(&self, address: AddressWithType) {
        self.background_connections.borrow_mut().insert(address);
    }

    /// Clear a peer's background-reconnect intent
    pub fn remove_device_from_background_connection_list(&self, address: AddressWithType) {
        self.background_connections.borrow_mut().remove(&address);
    }

    /// Whether the peer will be silently reconnected after disconnection
    pub fn is_on_background_connection_list(&self, address: AddressWithType) -> bool {
        self.background_connections.borrow().contains(&address)
    }
}
