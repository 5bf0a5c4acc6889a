//! Callback interfaces exposed by the connection manager, and the registry
//! enforcing their registration contract.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::info;

use crate::core::address::AddressWithType;

use super::{acl_connection::LeAclConnection, error::ErrorCode};

/// The primary client interface: whoever requested connections receives
/// ownership of the resulting connection object here.
pub trait LeConnectionCallbacks {
    /// An LE connection to the peer completed; the client owns the
    /// connection object from this point on.
    fn on_le_connect_success(&self, address: AddressWithType, connection: LeAclConnection);
    /// A connection attempt to the peer failed or timed out
    fn on_le_connect_fail(&self, address: AddressWithType, reason: ErrorCode);
}

/// A secondary observer interface for components that track accept-list
/// driven connectivity without owning the connection objects.
pub trait LeAcceptlistCallbacks {
    /// An LE connection to the peer completed
    fn on_le_connect_success(&self, address: AddressWithType);
    /// A connection attempt to the peer failed or timed out
    fn on_le_connect_fail(&self, address: AddressWithType, reason: ErrorCode);
    /// The peer disconnected
    fn on_le_disconnection(&self, address: AddressWithType);
    /// The controller resolving list changed
    fn on_resolving_list_change(&self);
}

/// Per-connection event callbacks, attached to a live connection through
/// LeAclConnection::register_callbacks. Events may be delivered from the
/// controller event thread, so implementations must be thread-safe.
pub trait LeConnectionManagementCallbacks: Send + Sync {
    /// The connection parameters were renegotiated
    fn on_connection_update(
        &self,
        status: ErrorCode,
        conn_interval: u16,
        conn_latency: u16,
        supervision_timeout: u16,
    );
    /// The PHY in use changed
    fn on_phy_update(&self, status: ErrorCode, tx_phy: u8, rx_phy: u8);
    /// The link data length changed
    fn on_data_length_change(
        &self,
        tx_octets: u16,
        tx_time: u16,
        rx_octets: u16,
        rx_time: u16,
    );
    /// The subrate parameters changed
    fn on_subrate_change(
        &self,
        status: ErrorCode,
        subrate_factor: u16,
        peripheral_latency: u16,
        continuation_number: u16,
        supervision_timeout: u16,
    );
    /// The remote version information read completed
    fn on_read_remote_version_information(
        &self,
        status: ErrorCode,
        version: u8,
        manufacturer_name: u16,
        sub_version: u16,
    );
    /// The connection was released
    fn on_disconnection(&self, reason: ErrorCode);
}

/// Token returned on registration, required for unregistration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallbackId(u64);

/// Holds at most one registrant. Double registration and unregistration with
/// a stale token are contract violations and panic, so a misbehaving caller
/// is caught at the call site rather than by a later pointer comparison.
pub struct CallbackRegistry<T: ?Sized> {
    registrant: RefCell<Option<(CallbackId, Rc<T>)>>,
    next_id: Cell<u64>,
}

impl<T: ?Sized> CallbackRegistry<T> {
    /// Constructor
    pub fn new() -> Self {
        Self { registrant: RefCell::new(None), next_id: Cell::new(0) }
    }

    /// Register the sole callback implementation. Panics if one is already
    /// registered. Tokens are never reused, so a token from a previous
    /// registrant can never unregister the current one.
    pub fn register(&self, callbacks: Rc<T>) -> CallbackId {
        let mut registrant = self.registrant.borrow_mut();
        assert!(registrant.is_none(), "callbacks registered twice");
        let id = CallbackId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        *registrant = Some((id, callbacks));
        id
    }

    /// Unregister using the token from register. Panics if the token does
    /// not identify the current registrant.
    pub fn unregister(&self, id: CallbackId) {
        let mut registrant = self.registrant.borrow_mut();
        match registrant.take() {
            Some((registered_id, _)) => {
                assert!(registered_id == id, "unregistering callbacks not registered by caller")
            }
            None => panic!("unregistering callbacks while none are registered"),
        }
    }

    /// Whether a registrant is present
    pub fn is_registered(&self) -> bool {
        self.registrant.borrow().is_some()
    }

    /// Invoke f on the registrant, if any; logs and drops the notification
    /// if none is registered. The registrant is retained across the call so
    /// it may unregister itself from within f.
    pub fn with(&self, f: impl FnOnce(&T)) {
        let registrant = self.registrant.borrow().as_ref().map(|(_, cbs)| cbs.clone());
        match registrant {
            Some(callbacks) => f(&callbacks),
            None => info!("dropping notification, no callbacks registered"),
        }
    }
}

impl<T: ?Sized> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    trait Named {
        fn name(&self) -> &'static str;
    }

    struct A;
    impl Named for A {
        fn name(&self) -> &'static str {
            "a"
        }
    }

    #[test]
    fn test_register_and_invoke() {
        // arrange
        let registry = CallbackRegistry::<dyn Named>::new();
        let invoked = Cell::new("");

        // act
        registry.register(Rc::new(A));
        registry.with(|cbs| invoked.set(cbs.name()));

        // assert
        assert_eq!(invoked.get(), "a");
    }

    #[test]
    fn test_invoke_unregistered() {
        let registry = CallbackRegistry::<dyn Named>::new();

        registry.with(|_| panic!("should not be invoked"));
    }

    #[test]
    fn test_clean_unregister() {
        // arrange
        let registry = CallbackRegistry::<dyn Named>::new();
        let id = registry.register(Rc::new(A));

        // act
        registry.unregister(id);

        // assert: the slot is free again
        assert!(!registry.is_registered());
        registry.register(Rc::new(A));
    }

    #[test]
    #[should_panic]
    fn test_double_register_panics() {
        let registry = CallbackRegistry::<dyn Named>::new();
        registry.register(Rc::new(A));
        registry.register(Rc::new(A));
    }

    #[test]
    #[should_panic]
    fn test_unregister_without_registrant_panics() {
        let registry = CallbackRegistry::<dyn Named>::new();
        let id = registry.register(Rc::new(A));
        registry.unregister(id);
        registry.unregister(id);
    }
}
