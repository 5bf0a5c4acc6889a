//! The table of live LE connections, keyed by controller-assigned handle.
//!
//! The rest of the manager runs on a single serial context, but connection
//! events can be routed here from the controller event thread, so this table
//! carries its own lock. No operation blocks while holding it: callback sets
//! are cloned out under the lock and invoked after it is released, since a
//! callback may well call back into the table.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use log::{info, warn};

use crate::core::address::AddressWithType;

use super::{
    acl_connection::{LeAclConnection, RoleSpecificData},
    callbacks::LeConnectionManagementCallbacks,
    ids::{ConnectionHandle, Generation},
};

struct Connection {
    remote_address: AddressWithType,
    generation: Generation,
    /// Peripheral connections whose advertising identity is not yet known
    /// are parked here until the set-terminated notification completes them
    pending_connection: Option<LeAclConnection>,
    callbacks: Option<Arc<dyn LeConnectionManagementCallbacks>>,
}

#[derive(Default)]
struct TableInner {
    connections: HashMap<ConnectionHandle, Connection>,
    next_generation: u64,
}

/// The handle-indexed map of live connections and their callback sets
pub struct ConnectionTable {
    inner: Mutex<TableInner>,
    crash_on_unknown_handle: AtomicBool,
}

impl ConnectionTable {
    /// Constructor. In strict mode, an event for an unknown handle is a
    /// fatal contract violation rather than an ignorable race.
    pub fn new(crash_on_unknown_handle: bool) -> Self {
        Self {
            inner: Mutex::new(TableInner::default()),
            crash_on_unknown_handle: AtomicBool::new(crash_on_unknown_handle),
        }
    }

    /// Whether unknown-handle events are fatal
    pub fn strict(&self) -> bool {
        self.crash_on_unknown_handle.load(Ordering::Relaxed)
    }

    /// Change the unknown-handle policy. Used around events that also route
    /// to receivers outside this table.
    pub fn set_strict(&self, strict: bool) {
        self.crash_on_unknown_handle.store(strict, Ordering::Relaxed);
    }

    /// Create a record for a newly completed connection. A handle collision
    /// is a protocol violation by the controller and panics: the colliding
    /// handle necessarily belongs to a connection we have not been told is
    /// released. Handle reuse after release creates a fresh record under a
    /// new generation.
    pub fn add(&self, handle: ConnectionHandle, remote_address: AddressWithType) -> Generation {
        let mut inner = self.inner.lock().unwrap();
        let generation = Generation(inner.next_generation);
        inner.next_generation += 1;
        let displaced = inner.connections.insert(
            handle,
            Connection { remote_address, generation, pending_connection: None, callbacks: None },
        );
        assert!(displaced.is_none(), "connection complete for already-known handle {handle:?}");
        generation
    }

    /// Park a not-yet-announced peripheral connection on its record.
    /// Must follow add() for the same handle.
    pub fn set_pending(&self, handle: ConnectionHandle, connection: LeAclConnection) {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .connections
            .get_mut(&handle)
            .unwrap_or_else(|| panic!("storing pending connection for unknown {handle:?}"));
        assert!(entry.pending_connection.is_none(), "pending connection stored twice");
        entry.pending_connection = Some(connection);
    }

    /// Associate a callback set with a live connection. Fails (returns
    /// false) if the handle is gone or has been reused since `generation`
    /// was issued, so a stale connection object can never observe events of
    /// its successor.
    pub fn attach_callbacks(
        &self,
        handle: ConnectionHandle,
        generation: Generation,
        callbacks: Arc<dyn LeConnectionManagementCallbacks>,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.connections.get_mut(&handle) {
            Some(connection) if connection.generation == generation => {
                connection.callbacks = Some(callbacks);
                true
            }
            _ => false,
        }
    }

    /// Invoke f with the callback set attached to the handle, if any. The
    /// lock is not held during the invocation.
    pub fn execute(
        &self,
        handle: ConnectionHandle,
        f: impl FnOnce(&dyn LeConnectionManagementCallbacks),
    ) {
        let callbacks = {
            let inner = self.inner.lock().unwrap();
            match inner.connections.get(&handle) {
                Some(connection) => connection.callbacks.clone(),
                None => {
                    assert!(!self.strict(), "received event for unknown handle {handle:?}");
                    warn!("dropping event for unknown handle {handle:?}");
                    return;
                }
            }
        };
        match callbacks {
            Some(callbacks) => f(callbacks.as_ref()),
            None => info!("dropping event for {handle:?}, no callbacks attached"),
        }
    }

    /// Like execute, but the record is removed before f runs, atomically
    /// with respect to concurrent lookups (the callback association is
    /// cleared together with the record, so it can never dangle). Returns
    /// whether the handle was known.
    pub fn execute_and_remove(
        &self,
        handle: ConnectionHandle,
        f: impl FnOnce(&dyn LeConnectionManagementCallbacks),
    ) -> bool {
        let connection = {
            let mut inner = self.inner.lock().unwrap();
            match inner.connections.remove(&handle) {
                Some(connection) => connection,
                None => {
                    assert!(!self.strict(), "received event for unknown handle {handle:?}");
                    warn!("dropping event for unknown handle {handle:?}");
                    return false;
                }
            }
        };
        match connection.callbacks {
            Some(callbacks) => f(callbacks.as_ref()),
            None => info!("dropping event for {handle:?}, no callbacks attached"),
        }
        true
    }

    /// Remove the record for this handle, if present. Idempotent.
    pub fn invalidate(&self, handle: ConnectionHandle) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            inner.connections.remove(&handle)
        };
        drop(removed);
    }

    /// Whether no connections are live
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().connections.is_empty()
    }

    /// Drop all records. Record destructors run outside the lock.
    pub fn reset(&self) {
        let connections = {
            let mut inner = self.inner.lock().unwrap();
            std::mem::take(&mut inner.connections)
        };
        drop(connections);
    }

    /// The remote address of a live connection
    pub fn get_address(&self, handle: ConnectionHandle) -> Option<AddressWithType> {
        self.inner.lock().unwrap().connections.get(&handle).map(|c| c.remote_address)
    }

    /// Whether any live connection has this remote address
    pub fn already_connected(&self, address: AddressWithType) -> bool {
        self.inner.lock().unwrap().connections.values().any(|c| c.remote_address == address)
    }

    /// Complete a parked peripheral connection with its advertising
    /// identity and extract it for delivery to the client. Returns None if
    /// the handle is unknown or carries no parked connection.
    pub fn record_peripheral_data_and_extract_pending(
        &self,
        handle: ConnectionHandle,
        data: RoleSpecificData,
    ) -> Option<LeAclConnection> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.connections.get_mut(&handle)?;
        let mut connection = entry.pending_connection.take()?;
        connection.role_specific_data = data;
        Some(connection)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        connection::{
            error::ErrorCode,
            mocks::mock_connection_management_callbacks::{
                MockConnectionManagementCallbacks, MockConnectionManagementEvents,
            },
        },
        core::address::{AddressType, AddressWithType},
    };

    use super::*;

    const HANDLE_1: ConnectionHandle = ConnectionHandle(1);
    const HANDLE_2: ConnectionHandle = ConnectionHandle(2);

    const ADDRESS_1: AddressWithType =
        AddressWithType { address: [1, 2, 3, 4, 5, 6], address_type: AddressType::Public };
    const ADDRESS_2: AddressWithType =
        AddressWithType { address: [6, 5, 4, 3, 2, 1], address_type: AddressType::Random };

    #[test]
    fn test_add_and_lookup() {
        // arrange
        let table = ConnectionTable::new(false);

        // act
        table.add(HANDLE_1, ADDRESS_1);

        // assert
        assert_eq!(table.get_address(HANDLE_1), Some(ADDRESS_1));
        assert!(table.already_connected(ADDRESS_1));
        assert!(!table.already_connected(ADDRESS_2));
        assert!(!table.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_handle_collision_panics() {
        let table = ConnectionTable::new(false);
        table.add(HANDLE_1, ADDRESS_1);
        table.add(HANDLE_1, ADDRESS_2);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        // arrange
        let table = ConnectionTable::new(false);
        table.add(HANDLE_1, ADDRESS_1);

        // act
        table.invalidate(HANDLE_1);
        table.invalidate(HANDLE_1);

        // assert
        assert!(table.is_empty());
        assert_eq!(table.get_address(HANDLE_1), None);
    }

    #[test]
    fn test_execute_routes_to_attached_callbacks() {
        // arrange
        let table = ConnectionTable::new(false);
        let generation = table.add(HANDLE_1, ADDRESS_1);
        let (callbacks, mut rx) = MockConnectionManagementCallbacks::new();
        assert!(table.attach_callbacks(HANDLE_1, generation, Arc::new(callbacks)));

        // act
        table.execute(HANDLE_1, |callbacks| callbacks.on_phy_update(ErrorCode::SUCCESS, 2, 2));

        // assert
        let MockConnectionManagementEvents::OnPhyUpdate(ErrorCode::SUCCESS, 2, 2) =
            rx.try_recv().unwrap()
        else {
            unreachable!()
        };
    }

    #[test]
    fn test_execute_unknown_handle_ignored_when_not_strict() {
        let table = ConnectionTable::new(false);

        table.execute(HANDLE_1, |_| panic!("should not be invoked"));
    }

    #[test]
    #[should_panic]
    fn test_execute_unknown_handle_fatal_when_strict() {
        let table = ConnectionTable::new(true);

        table.execute(HANDLE_1, |_| {});
    }

    #[test]
    fn test_execute_without_callbacks_ignored() {
        let table = ConnectionTable::new(false);
        table.add(HANDLE_1, ADDRESS_1);

        table.execute(HANDLE_1, |_| panic!("should not be invoked"));
    }

    #[test]
    fn test_execute_and_remove() {
        // arrange
        let table = ConnectionTable::new(false);
        let generation = table.add(HANDLE_1, ADDRESS_1);
        let (callbacks, mut rx) = MockConnectionManagementCallbacks::new();
        assert!(table.attach_callbacks(HANDLE_1, generation, Arc::new(callbacks)));

        // act
        let existed = table.execute_and_remove(HANDLE_1, |callbacks| {
            callbacks.on_disconnection(ErrorCode(0x13))
        });

        // assert: the callback ran and the record is gone
        assert!(existed);
        let MockConnectionManagementEvents::OnDisconnection(ErrorCode(0x13)) =
            rx.try_recv().unwrap()
        else {
            unreachable!()
        };
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_generation_cannot_attach_after_handle_reuse() {
        // arrange: a connection whose handle is released and then reused
        let table = ConnectionTable::new(false);
        let stale_generation = table.add(HANDLE_1, ADDRESS_1);
        table.invalidate(HANDLE_1);
        let fresh_generation = table.add(HANDLE_1, ADDRESS_2);

        // act: attach with the stale generation
        let (callbacks, _rx) = MockConnectionManagementCallbacks::new();
        let attached = table.attach_callbacks(HANDLE_1, stale_generation, Arc::new(callbacks));

        // assert: rejected, while the fresh generation attaches fine
        assert!(!attached);
        let (callbacks, _rx) = MockConnectionManagementCallbacks::new();
        assert!(table.attach_callbacks(HANDLE_1, fresh_generation, Arc::new(callbacks)));
    }

    #[test]
    fn test_reset_clears_all() {
        // arrange
        let table = ConnectionTable::new(false);
        table.add(HANDLE_1, ADDRESS_1);
        table.add(HANDLE_2, ADDRESS_2);

        // act
        table.reset();

        // assert
        assert!(table.is_empty());
    }
}
