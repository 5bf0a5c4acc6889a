//! Mocked implementation of the packet scheduler registration for use in
//! test

use std::{cell::RefCell, collections::HashSet, rc::Rc};

use crate::connection::{ids::ConnectionHandle, scheduler::RoundRobinScheduler};

/// Tracks the set of handles registered with the scheduler, and enforces
/// that registration and unregistration are correctly paired.
#[derive(Clone, Default)]
pub struct MockRoundRobinScheduler {
    registered: Rc<RefCell<HashSet<ConnectionHandle>>>,
}

impl MockRoundRobinScheduler {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// The handles currently registered
    pub fn registered_handles(&self) -> HashSet<ConnectionHandle> {
        self.registered.borrow().clone()
    }
}

impl RoundRobinScheduler for MockRoundRobinScheduler {
    fn register_le_connection(&self, handle: ConnectionHandle) {
        let inserted = self.registered.borrow_mut().insert(handle);
        assert!(inserted, "{handle:?} registered twice");
    }

    fn unregister(&self, handle: ConnectionHandle) {
        let removed = self.registered.borrow_mut().remove(&handle);
        assert!(removed, "{handle:?} unregistered while not registered");
    }
}
