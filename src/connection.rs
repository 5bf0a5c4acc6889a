//! This module manages LE connection establishment and lifecycle: arming and
//! disarming the controller's accept-list initiator, tracking direct and
//! background connection attempts with their timeouts, cooperating with the
//! address-rotation manager, and routing asynchronous controller events to
//! per-connection callback sets.
//!
//! One serial execution context owns the manager; every entry point (client
//! API, command completions, controller events) must run on it. The only
//! piece shared with other threads is the connection table, which carries
//! its own lock.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::Arc,
};

use log::warn;
use tokio::task::spawn_local;

use crate::{
    core::{
        address::AddressWithType,
        shared_box::{SharedBox, WeakBox},
    },
    utils::owned_handle::OwnedHandle,
};

use self::{
    address_manager::{LeAddressManager, LeAddressManagerCallback, PrivacyPolicyParameters},
    callbacks::{
        CallbackId, CallbackRegistry, LeAcceptlistCallbacks, LeConnectionCallbacks,
    },
    config::Property,
    connectability::ConnectabilityState,
    connection_table::ConnectionTable,
    controller::{
        ControllerCapabilities, DefaultSubrateParameters, LeAclConnectionInterface,
    },
    error::ErrorCode,
    scheduler::RoundRobinScheduler,
};

pub mod acceptlist_manager;
pub mod acl_connection;
pub mod address_manager;
pub mod attempt_manager;
pub mod callbacks;
pub mod config;
pub mod connectability;
pub mod connection_table;
pub mod controller;
pub mod error;
pub mod event_dispatcher;
pub mod ids;
pub mod mocks;
pub mod scheduler;

/// Manages the initiator state machine, the accept-list bookkeeping, and the
/// set of live LE connections.
pub struct LeConnectionManager {
    controller: Rc<dyn LeAclConnectionInterface>,
    capabilities: ControllerCapabilities,
    address_manager: Rc<dyn LeAddressManager>,
    scheduler: Rc<dyn RoundRobinScheduler>,
    connections: Arc<ConnectionTable>,

    client_callbacks: CallbackRegistry<dyn LeConnectionCallbacks>,
    acceptlist_callbacks: CallbackRegistry<dyn LeAcceptlistCallbacks>,

    connectability: Cell<ConnectabilityState>,
    /// Re-arm once the in-flight disarm settles (set when the accept list
    /// changes while armed)
    rearm_after_disarm: Cell<bool>,
    /// Arm once the address manager resumes us
    arm_on_resume: Cell<bool>,
    /// A pause from the address manager is in effect
    paused: Cell<bool>,
    address_manager_registered: Cell<bool>,
    ready_to_unregister: Cell<bool>,
    system_suspended: Cell<bool>,

    /// The accept list as we have driven it; single source of truth for
    /// membership
    connect_list: RefCell<HashSet<AddressWithType>>,
    /// Snapshot of the accept list taken when the initiator was armed
    connecting: RefCell<HashSet<AddressWithType>>,
    /// Peers with a bounded (direct) connection attempt outstanding
    direct_connections: RefCell<HashSet<AddressWithType>>,
    /// Peers silently re-added to the accept list after disconnection
    background_connections: RefCell<HashSet<AddressWithType>>,
    create_connection_timeout_alarms: RefCell<HashMap<AddressWithType, OwnedHandle<()>>>,

    this: WeakBox<LeConnectionManager>,
}

struct AddressManagerPauseHandler(WeakBox<LeConnectionManager>);

impl LeAddressManagerCallback for AddressManagerPauseHandler {
    fn on_pause(&self) {
        self.0.with(|manager| manager.expect("paused after stack died").on_pause())
    }

    fn on_resume(&self) {
        self.0.with(|manager| manager.expect("resumed after stack died").on_resume())
    }
}

impl LeConnectionManager {
    /// Constructor. The manager is handed its collaborators by the
    /// composition root and owned by it; nothing here is process-global.
    pub fn new(
        controller: Rc<dyn LeAclConnectionInterface>,
        capabilities: ControllerCapabilities,
        address_manager: Rc<dyn LeAddressManager>,
        scheduler: Rc<dyn RoundRobinScheduler>,
        crash_on_unknown_handle: bool,
    ) -> SharedBox<Self> {
        SharedBox::new_cyclic(|this| Self {
            controller,
            capabilities,
            address_manager,
            scheduler,
            connections: Arc::new(ConnectionTable::new(crash_on_unknown_handle)),
            client_callbacks: CallbackRegistry::new(),
            acceptlist_callbacks: CallbackRegistry::new(),
            connectability: Cell::new(ConnectabilityState::Disarmed),
            rearm_after_disarm: Cell::new(false),
            arm_on_resume: Cell::new(false),
            paused: Cell::new(false),
            address_manager_registered: Cell::new(false),
            ready_to_unregister: Cell::new(false),
            system_suspended: Cell::new(false),
            connect_list: RefCell::new(HashSet::new()),
            connecting: RefCell::new(HashSet::new()),
            direct_connections: RefCell::new(HashSet::new()),
            background_connections: RefCell::new(HashSet::new()),
            create_connection_timeout_alarms: RefCell::new(HashMap::new()),
            this,
        })
    }

    /// Register the primary client callbacks. At most one client may be
    /// registered at a time.
    pub fn register_le_callbacks(&self, callbacks: Rc<dyn LeConnectionCallbacks>) -> CallbackId {
        self.client_callbacks.register(callbacks)
    }

    /// Unregister the primary client callbacks
    pub fn unregister_le_callbacks(&self, id: CallbackId) {
        self.client_callbacks.unregister(id)
    }

    /// Register the accept-list observer callbacks
    pub fn register_le_acceptlist_callbacks(
        &self,
        callbacks: Rc<dyn LeAcceptlistCallbacks>,
    ) -> CallbackId {
        self.acceptlist_callbacks.register(callbacks)
    }

    /// Unregister the accept-list observer callbacks
    pub fn unregister_le_acceptlist_callbacks(&self, id: CallbackId) {
        self.acceptlist_callbacks.unregister(id)
    }

    /// Select suspend-specific scan parameters for subsequent arm cycles
    pub fn set_system_suspend_state(&self, suspended: bool) {
        self.system_suspended.set(suspended);
    }

    /// Suggest the default data length for new connections
    pub fn set_le_suggested_default_data_parameters(&self, tx_octets: u16, tx_time: u16) {
        self.controller.write_suggested_default_data_length(tx_octets, tx_time, Box::new(|_| {}));
    }

    /// Set the default subrate range for new connections. A failure here
    /// means the capability was advertised but the command rejected, which
    /// is a controller contract violation.
    pub fn set_default_subrate(&self, parameters: DefaultSubrateParameters) {
        self.controller.set_default_subrate(
            parameters,
            Box::new(|status| {
                assert!(status.is_success(), "set default subrate failed: {status:?}")
            }),
        );
    }

    /// Configure the initiator address policy. Privacy is only engaged when
    /// the controller supports it and it is enabled by configuration.
    pub fn set_privacy_policy_for_initiator_address(&self, parameters: PrivacyPolicyParameters) {
        let enable_address_privacy = parameters.enable_address_privacy
            && self.capabilities.supports_privacy
            && config::get_bool(Property::EnableBlePrivacy);
        self.address_manager.set_privacy_policy(PrivacyPolicyParameters {
            enable_address_privacy,
            ..parameters
        });
    }

    fn report_le_connection_failure(&self, address: AddressWithType, status: ErrorCode) {
        self.client_callbacks.with(|callbacks| callbacks.on_le_connect_fail(address, status));
        self.acceptlist_callbacks.with(|callbacks| callbacks.on_le_connect_fail(address, status));
    }

    /// Defer a self-call onto the serial context
    fn post(&self, f: impl FnOnce(&LeConnectionManager) + 'static) {
        let this = self.this.clone();
        spawn_local(async move {
            this.with(|manager| f(&manager.expect("deferred call after stack died")))
        });
    }

    fn register_with_address_manager(&self) {
        if !self.address_manager_registered.get() {
            let this = self.this.clone();
            self.address_manager.register(Box::new(AddressManagerPauseHandler(this)));
            self.address_manager_registered.set(true);
            // the list mutation about to be issued will pause us; defer
            // connection attempts until the resulting resume
            self.paused.set(true);
        }
    }

    fn check_for_unregister(&self) {
        if self.connections.is_empty()
            && self.connecting.borrow().is_empty()
            && self.connect_list.borrow().is_empty()
            && !self.arm_on_resume.get()
            && self.address_manager_registered.get()
            && self.ready_to_unregister.get()
        {
            self.address_manager.unregister();
            self.address_manager_registered.set(false);
            self.paused.set(false);
            self.ready_to_unregister.set(false);
        }
    }
}

impl Drop for LeConnectionManager {
    fn drop(&mut self) {
        if self.address_manager_registered.get() {
            self.address_manager.unregister();
        } else if self.paused.get() {
            warn!("dropping connection manager while paused but unregistered");
        }
        self.connections.reset();
    }
}
