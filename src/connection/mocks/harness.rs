//! A fully mocked connection-manager stack for use in test, with helpers
//! for the common bring-up sequences.

use std::rc::Rc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    connection::{
        acl_connection::{LeAclConnection, Role},
        address_manager::AddressPolicy,
        controller::ControllerCapabilities,
        error::ErrorCode,
        event_dispatcher::{
            LeAclEvent, LeConnectionCompleteEvent, LeEnhancedConnectionCompleteEvent,
        },
        ids::ConnectionHandle,
        LeConnectionManager,
    },
    core::{
        address::{AddressType, AddressWithType, PeerAddressType, EMPTY_ADDRESS},
        logging::init_logging,
        shared_box::SharedBox,
    },
};

use super::{
    mock_acceptlist_callbacks::{MockAcceptlistCallbacks, MockAcceptlistEvents},
    mock_address_manager::MockLeAddressManager,
    mock_connection_callbacks::{MockConnectionCallbacks, MockConnectionEvents},
    mock_controller::{MockCommand, MockController},
    mock_scheduler::MockRoundRobinScheduler,
};

/// The initiator address the mock address manager reports
pub const LOCAL_ADDRESS: AddressWithType =
    AddressWithType { address: [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5], address_type: AddressType::Public };

/// A connection manager wired to mock collaborators
pub struct Harness {
    /// The manager under test
    pub manager: SharedBox<LeConnectionManager>,
    /// The mocked controller command interface
    pub controller: MockController,
    /// The mocked address manager
    pub address_manager: MockLeAddressManager,
    /// The mocked packet scheduler
    pub scheduler: MockRoundRobinScheduler,
    /// Events delivered to the primary client callbacks
    pub client_rx: UnboundedReceiver<MockConnectionEvents>,
    /// Events delivered to the accept-list observer
    pub acceptlist_rx: UnboundedReceiver<MockAcceptlistEvents>,
}

impl Harness {
    /// Bring up a manager with a public initiator address
    pub fn bring_up(capabilities: ControllerCapabilities) -> Self {
        Self::bring_up_with_policy(capabilities, AddressPolicy::UsePublicAddress)
    }

    /// Bring up a manager against an address manager with the given policy
    pub fn bring_up_with_policy(
        capabilities: ControllerCapabilities,
        policy: AddressPolicy,
    ) -> Self {
        init_logging();
        let controller = MockController::new();
        let address_manager = MockLeAddressManager::new(policy, LOCAL_ADDRESS);
        let scheduler = MockRoundRobinScheduler::new();
        let manager = LeConnectionManager::new(
            Rc::new(controller.clone()),
            capabilities,
            Rc::new(address_manager.clone()),
            Rc::new(scheduler.clone()),
            false,
        );
        let (client_callbacks, client_rx) = MockConnectionCallbacks::new();
        manager.register_le_callbacks(Rc::new(client_callbacks));
        let (acceptlist_callbacks, acceptlist_rx) = MockAcceptlistCallbacks::new();
        manager.register_le_acceptlist_callbacks(Rc::new(acceptlist_callbacks));
        Self { manager, controller, address_manager, scheduler, client_rx, acceptlist_rx }
    }

    /// Request a direct connection and run the accept-list update handshake,
    /// leaving the state machine arming with a create-connection command
    /// captured by the mock controller.
    pub fn start_direct_connection(&self, address: AddressWithType) {
        self.manager.create_le_connection(address, true, true);
        self.address_manager.process_queued_operations();
    }

    /// Deliver a successful command status for the captured
    /// create-connection command. Note that the resulting state is not
    /// necessarily Armed: a disarm deferred during Arming fires here.
    pub fn complete_arm(&self) {
        match self.controller.pop_command().expect("no create connection command captured") {
            MockCommand::CreateConnection { on_status, .. } => on_status(ErrorCode::SUCCESS),
            MockCommand::ExtendedCreateConnection { on_status, .. } => on_status(ErrorCode::SUCCESS),
            _ => panic!("captured command is not a create connection"),
        }
    }

    /// Drive a full successful direct connection to the peer and return the
    /// connection object delivered to the client.
    pub fn connect_peer(
        &mut self,
        handle: ConnectionHandle,
        address: AddressWithType,
    ) -> LeAclConnection {
        self.start_direct_connection(address);
        self.complete_arm();
        self.manager.on_le_event(LeAclEvent::ConnectionComplete(Self::connection_complete_event(
            ErrorCode::SUCCESS,
            handle,
            Role::Central,
            address,
        )));
        // apply the accept-list removal triggered by the completion
        self.address_manager.process_queued_operations();

        let MockConnectionEvents::OnLeConnectSuccess(_, connection) =
            self.client_rx.try_recv().expect("no connect success delivered")
        else {
            panic!("expected a connect success");
        };
        let MockAcceptlistEvents::OnLeConnectSuccess(_) =
            self.acceptlist_rx.try_recv().expect("no observer notification delivered")
        else {
            panic!("expected an observer connect success");
        };
        connection
    }

    /// A connection-complete event with valid connection parameters
    pub fn connection_complete_event(
        status: ErrorCode,
        connection_handle: ConnectionHandle,
        role: Role,
        peer: AddressWithType,
    ) -> LeConnectionCompleteEvent {
        LeConnectionCompleteEvent {
            status,
            connection_handle,
            role,
            peer_address_type: peer.address_type,
            peer_address: peer.address,
            conn_interval: 0x0024,
            conn_latency: 0x0000,
            supervision_timeout: 0x01f4,
        }
    }

    /// An enhanced connection-complete event with valid connection
    /// parameters and zeroed resolvable private addresses
    pub fn enhanced_connection_complete_event(
        status: ErrorCode,
        connection_handle: ConnectionHandle,
        role: Role,
        peer: AddressWithType,
    ) -> LeEnhancedConnectionCompleteEvent {
        LeEnhancedConnectionCompleteEvent {
            status,
            connection_handle,
            role,
            peer_address_type: match peer.address_type {
                AddressType::Public => PeerAddressType::PublicDeviceAddress,
                AddressType::Random => PeerAddressType::RandomDeviceAddress,
            },
            peer_address: peer.address,
            local_resolvable_private_address: EMPTY_ADDRESS,
            peer_resolvable_private_address: EMPTY_ADDRESS,
            conn_interval: 0x0024,
            conn_latency: 0x0000,
            supervision_timeout: 0x01f4,
        }
    }
}
