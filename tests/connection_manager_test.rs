mod utils;

use std::time::Duration;

use bluetooth_le_acl::{
    connection::{
        acl_connection::Role,
        connectability::ConnectabilityState,
        controller::{ControllerCapabilities, DefaultSubrateParameters},
        error::ErrorCode,
        event_dispatcher::LeAclEvent,
        ids::ConnectionHandle,
        mocks::{
            harness::Harness,
            mock_acceptlist_callbacks::MockAcceptlistEvents,
            mock_connection_callbacks::MockConnectionEvents,
            mock_controller::MockCommand,
        },
    },
    core::address::{AddressType, AddressWithType},
    utils::task::try_await,
};
use tokio::time::sleep;
use utils::start_test;

const ADDRESS_A: AddressWithType =
    AddressWithType { address: [1, 2, 3, 4, 5, 6], address_type: AddressType::Public };
const ADDRESS_B: AddressWithType =
    AddressWithType { address: [6, 5, 4, 3, 2, 1], address_type: AddressType::Random };

const HANDLE_1: ConnectionHandle = ConnectionHandle(1);

/// Longer than the default direct-connection timeout
const PAST_CONNECTION_TIMEOUT: Duration = Duration::from_millis(30 * 1000 + 500);

#[test]
fn test_direct_connection_brings_up_initiator() {
    start_test(async {
        // arrange
        let harness = Harness::bring_up(ControllerCapabilities::default());

        // act: request a direct connection to A and let the accept-list
        // update land
        harness.manager.create_le_connection(ADDRESS_A, true, true);
        harness.address_manager.process_queued_operations();

        // assert: accept list is {A}, the initiator is arming
        assert!(harness.manager.is_device_in_connect_list(ADDRESS_A));
        assert_eq!(harness.address_manager.accept_list().len(), 1);
        assert_eq!(
            harness.manager.connectability_state(),
            ConnectabilityState::Arming { pending_disarm: false }
        );

        // act: command status success
        harness.complete_arm();

        // assert
        assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Armed);
    });
}

#[test]
fn test_successful_connection_reports_once_and_cleans_up() {
    start_test(async {
        // arrange: an armed direct attempt to A
        let mut harness = Harness::bring_up(ControllerCapabilities::default());
        harness.manager.create_le_connection(ADDRESS_A, true, true);
        harness.address_manager.process_queued_operations();
        harness.complete_arm();

        // act
        harness.manager.on_le_event(LeAclEvent::ConnectionComplete(
            Harness::connection_complete_event(
                ErrorCode::SUCCESS,
                HANDLE_1,
                Role::Central,
                ADDRESS_A,
            ),
        ));
        harness.address_manager.process_queued_operations();

        // assert: disarmed, accept list emptied, exactly one success on each
        // interface
        assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
        assert!(harness.address_manager.accept_list().is_empty());
        let MockConnectionEvents::OnLeConnectSuccess(ADDRESS_A, connection) =
            harness.client_rx.try_recv().unwrap()
        else {
            panic!("expected a connect success");
        };
        assert_eq!(connection.remote_address(), ADDRESS_A);
        assert!(harness.client_rx.try_recv().is_err());
        let MockAcceptlistEvents::OnLeConnectSuccess(ADDRESS_A) =
            harness.acceptlist_rx.try_recv().unwrap()
        else {
            panic!("expected an observer connect success");
        };

        // assert: the direct-connection alarm is gone
        sleep(PAST_CONNECTION_TIMEOUT).await;
        assert!(harness.client_rx.try_recv().is_err());
    });
}

#[test]
fn test_pause_cancels_attempt_without_client_visible_failure() {
    start_test(async {
        // arrange: an armed direct attempt to A
        let mut harness = Harness::bring_up(ControllerCapabilities::default());
        harness.manager.create_le_connection(ADDRESS_A, true, true);
        harness.address_manager.process_queued_operations();
        harness.complete_arm();
        let acked_pauses = harness.address_manager.ack_pause_count();

        // act: an address rotation pauses connectivity
        harness.address_manager.pause();

        // assert: the outstanding create-connection is being cancelled
        let Some(MockCommand::CreateConnectionCancel { on_complete }) =
            harness.controller.pop_command()
        else {
            panic!("expected a create connection cancel");
        };

        // act: cancel completes, and the cancelled attempt surfaces
        on_complete(ErrorCode::SUCCESS);
        harness.manager.on_le_event(LeAclEvent::ConnectionComplete(
            Harness::connection_complete_event(
                ErrorCode::UNKNOWN_CONNECTION,
                ConnectionHandle::INVALID,
                Role::Central,
                ADDRESS_A,
            ),
        ));

        // assert: disarmed, pause acknowledged, and no callback fired
        assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
        assert_eq!(harness.address_manager.ack_pause_count(), acked_pauses + 1);
        assert!(harness.client_rx.try_recv().is_err());

        // act: rotation done
        harness.address_manager.resume();

        // assert: the attempt resumes on its own
        assert!(matches!(
            harness.controller.pop_command(),
            Some(MockCommand::CreateConnection { .. })
        ));
    });
}

#[test]
fn test_direct_connection_timeout_of_background_peer() {
    start_test(async {
        // arrange: B is a background peer with a direct attempt outstanding
        let harness = Harness::bring_up(ControllerCapabilities::default());
        harness.manager.add_device_to_background_connection_list(ADDRESS_B);
        harness.manager.create_le_connection(ADDRESS_B, true, true);
        harness.address_manager.process_queued_operations();
        harness.complete_arm();

        // act: watch for the failure callback; it must not fire yet
        let mut client_rx = harness.client_rx;
        let pending_failure = try_await(async move { client_rx.recv().await }).await;
        let Err(pending_failure) = pending_failure else {
            panic!("failure reported before the timeout elapsed");
        };

        // act: let the direct-connection timeout elapse
        sleep(PAST_CONNECTION_TIMEOUT).await;

        // assert: exactly one timeout failure reaches the client
        let Some(MockConnectionEvents::OnLeConnectFail(
            ADDRESS_B,
            ErrorCode::CONNECTION_ACCEPT_TIMEOUT,
        )) = pending_failure.await
        else {
            panic!("expected a timeout failure");
        };

        // assert: the initiator was disarmed, and B stays ready for the
        // background reconnect
        assert!(matches!(
            harness.controller.pop_command(),
            Some(MockCommand::CreateConnectionCancel { .. })
        ));
        assert!(harness.manager.is_on_background_connection_list(ADDRESS_B));
        assert!(harness.manager.is_device_in_connect_list(ADDRESS_B));
    });
}

#[test]
fn test_disconnect_of_background_peer_reconnects_silently() {
    start_test(async {
        // arrange: a connected background peer
        let mut harness = Harness::bring_up(ControllerCapabilities::default());
        harness.manager.add_device_to_background_connection_list(ADDRESS_A);
        let _connection = harness.connect_peer(HANDLE_1, ADDRESS_A);
        assert!(!harness.manager.is_device_in_connect_list(ADDRESS_A));

        // act
        harness.manager.on_le_event(LeAclEvent::Disconnect {
            connection_handle: HANDLE_1,
            reason: ErrorCode(0x08),
        });

        // assert: the observer heard the disconnection, and the peer was
        // re-added to the accept list
        let MockAcceptlistEvents::OnLeDisconnection(ADDRESS_A) =
            harness.acceptlist_rx.try_recv().unwrap()
        else {
            panic!("expected an observer disconnection");
        };
        assert!(harness.manager.is_device_in_connect_list(ADDRESS_A));

        // act: the accept-list update lands
        harness.address_manager.process_queued_operations();

        // assert: the initiator is re-armed for the background attempt
        assert!(matches!(
            harness.controller.pop_command(),
            Some(MockCommand::CreateConnection { .. })
        ));
        assert_eq!(
            harness.manager.connectability_state(),
            ConnectabilityState::Arming { pending_disarm: false }
        );
    });
}

#[test]
fn test_remaining_peers_rearmed_after_one_connects() {
    start_test(async {
        // arrange: armed for A, with B joining the accept list afterwards
        let mut harness = Harness::bring_up(ControllerCapabilities::default());
        harness.manager.create_le_connection(ADDRESS_A, true, true);
        harness.address_manager.process_queued_operations();
        harness.manager.create_le_connection(ADDRESS_B, true, true);
        harness.address_manager.process_queued_operations();

        // the accept-list change cycles the in-flight arm
        harness.complete_arm();
        let Some(MockCommand::CreateConnectionCancel { on_complete }) =
            harness.controller.pop_command()
        else {
            panic!("expected a create connection cancel");
        };
        on_complete(ErrorCode::SUCCESS);
        harness.manager.on_le_event(LeAclEvent::ConnectionComplete(
            Harness::connection_complete_event(
                ErrorCode::UNKNOWN_CONNECTION,
                ConnectionHandle::INVALID,
                Role::Central,
                AddressWithType::EMPTY,
            ),
        ));
        harness.complete_arm();

        // act: A connects
        harness.manager.on_le_event(LeAclEvent::ConnectionComplete(
            Harness::connection_complete_event(
                ErrorCode::SUCCESS,
                HANDLE_1,
                Role::Central,
                ADDRESS_A,
            ),
        ));
        let MockConnectionEvents::OnLeConnectSuccess(ADDRESS_A, _connection) =
            harness.client_rx.try_recv().unwrap()
        else {
            panic!("expected a connect success");
        };
        // run the deferred aggregate re-arm
        sleep(Duration::from_millis(1)).await;

        // assert: a fresh create-connection covers the remaining peer B
        assert!(harness.manager.is_device_in_connect_list(ADDRESS_B));
        assert_eq!(
            harness.manager.connectability_state(),
            ConnectabilityState::Arming { pending_disarm: false }
        );
        assert!(matches!(
            harness.controller.pop_command(),
            Some(MockCommand::CreateConnection { .. })
        ));
    });
}

#[test]
fn test_never_connected_peer_stays_listed_until_removed() {
    start_test(async {
        // arrange
        let harness = Harness::bring_up(ControllerCapabilities::default());

        // act
        harness.manager.add_device_to_connect_list(ADDRESS_A);
        harness.address_manager.process_queued_operations();

        // assert: still listed after unrelated traffic
        harness.manager.add_device_to_connect_list(ADDRESS_B);
        harness.address_manager.process_queued_operations();
        harness.manager.remove_device_from_connect_list(ADDRESS_B);
        harness.address_manager.process_queued_operations();
        assert!(harness.manager.is_device_in_connect_list(ADDRESS_A));

        // act: explicit removal
        harness.manager.remove_device_from_connect_list(ADDRESS_A);
        harness.address_manager.process_queued_operations();

        // assert
        assert!(!harness.manager.is_device_in_connect_list(ADDRESS_A));
        assert!(harness.address_manager.accept_list().is_empty());
    });
}

#[test]
fn test_data_length_and_subrate_passthrough() {
    start_test(async {
        // arrange
        let harness = Harness::bring_up(ControllerCapabilities::default());

        // act
        harness.manager.set_le_suggested_default_data_parameters(0x00fb, 0x0848);
        harness.manager.set_default_subrate(DefaultSubrateParameters {
            subrate_min: 1,
            subrate_max: 4,
            max_latency: 0,
            continuation_number: 1,
            supervision_timeout: 0x01f4,
        });

        // assert
        let Some(MockCommand::WriteSuggestedDefaultDataLength { tx_octets, tx_time, .. }) =
            harness.controller.pop_command()
        else {
            panic!("expected a write suggested default data length");
        };
        assert_eq!((tx_octets, tx_time), (0x00fb, 0x0848));
        let Some(MockCommand::SetDefaultSubrate { parameters, on_complete }) =
            harness.controller.pop_command()
        else {
            panic!("expected a set default subrate");
        };
        assert_eq!(parameters.subrate_max, 4);
        on_complete(ErrorCode::SUCCESS);
    });
}

#[test]
fn test_privacy_policy_disabled_without_controller_support() {
    start_test(async {
        use bluetooth_le_acl::connection::address_manager::{
            AddressPolicy, PrivacyPolicyParameters,
        };

        // arrange: a controller without LL privacy
        let harness = Harness::bring_up(ControllerCapabilities::default());

        // act
        harness.manager.set_privacy_policy_for_initiator_address(PrivacyPolicyParameters {
            address_policy: AddressPolicy::UseResolvableAddress,
            fixed_address: AddressWithType::EMPTY,
            rotation_irk: [7; 16],
            enable_address_privacy: true,
            minimum_rotation_time: Duration::from_secs(7 * 60),
            maximum_rotation_time: Duration::from_secs(15 * 60),
        });

        // assert: the policy reaches the address manager with privacy off
        let policy = harness.address_manager.privacy_policy().unwrap();
        assert!(!policy.enable_address_privacy);
        assert_eq!(policy.address_policy, AddressPolicy::UseResolvableAddress);
    });
}
