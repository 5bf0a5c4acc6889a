//! The arm/disarm state machine for the controller's accept-list initiator.
//!
//! The controller accepts only one outstanding create-connection command, so
//! arming and disarming must round-trip through the command status / cancel
//! completion before the next transition. Requests arriving during those
//! transient windows are deferred and merged, never dropped: a disarm during
//! Arming is queued into the state itself, and a re-arm after an
//! accept-list change rides the rearm_after_disarm intent.

use log::{error, info, warn};

use crate::core::address::AddressWithType;

use super::{
    config::{self, Property},
    controller::{
        ConnectionParameters, InitiatorFilterPolicy, LeCreateConnectionParameters,
        LeExtendedCreateConnectionParameters, PhyScanParameters, ScanParameters, PHY_LE_1M,
        PHY_LE_2M, PHY_LE_CODED,
    },
    error::ErrorCode,
    LeConnectionManager,
};

/// Whether a create-connection command against the accept list is
/// outstanding, being issued, or being cancelled
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectabilityState {
    /// No create-connection command outstanding
    Disarmed,
    /// A create-connection command has been issued; its status is pending.
    /// A disarm requested in this window is deferred into pending_disarm.
    Arming {
        /// Disarm as soon as the arm settles
        pending_disarm: bool,
    },
    /// The controller is connecting to anything on the accept list
    Armed,
    /// A create-connection-cancel has been issued; its completion is pending
    Disarming,
}

impl LeConnectionManager {
    /// The current initiator state, for diagnostics
    pub fn connectability_state(&self) -> ConnectabilityState {
        self.connectability.get()
    }

    pub(crate) fn arm_connectability(&self) {
        let state = self.connectability.get();
        if state != ConnectabilityState::Disarmed {
            error!("attempting to re-arm le connection state machine in unexpected state:{state:?}");
            return;
        }
        if self.connect_list.borrow().is_empty() {
            info!("ignored request to arm le connection state machine with empty accept list");
            return;
        }
        self.connectability.set(ConnectabilityState::Arming { pending_disarm: false });
        *self.connecting.borrow_mut() = self.connect_list.borrow().clone();

        let mut scan_interval = config::get_u16(Property::ConnScanIntervalSlow);
        let mut scan_window = config::get_u16(Property::ConnScanWindowSlow);
        let mut scan_window_2m = scan_window;
        let mut scan_window_coded = scan_window;
        // If there is any direct connection outstanding, use the fast parameters
        if !self.direct_connections.borrow().is_empty() {
            scan_interval = config::get_u16(Property::ConnScanIntervalFast);
            scan_window = config::get_u16(Property::ConnScanWindowFast);
            scan_window_2m = config::get_u16(Property::ConnScanWindow2mFast);
            scan_window_coded = config::get_u16(Property::ConnScanWindowCodedFast);
        }
        // Use specific parameters when in system suspend
        if self.system_suspended.get() {
            scan_interval = config::SCAN_INTERVAL_SYSTEM_SUSPEND;
            scan_window = config::SCAN_WINDOW_SYSTEM_SUSPEND;
            scan_window_2m = scan_window;
            scan_window_coded = scan_window;
        }

        let connection = ConnectionParameters {
            conn_interval_min: config::get_u16(Property::MinConnInterval),
            conn_interval_max: config::get_u16(Property::MaxConnInterval),
            conn_latency: config::get_u16(Property::ConnLatency),
            supervision_timeout: config::get_u16(Property::ConnSupervisionTimeout),
            min_ce_length: 0x00,
            max_ce_length: 0x00,
        };
        assert!(
            config::check_connection_parameters(
                connection.conn_interval_min,
                connection.conn_interval_max,
                connection.conn_latency,
                connection.supervision_timeout,
            ),
            "configured connection parameters are invalid"
        );

        let own_address_type = self.address_manager.initiator_address().address_type;

        let this = self.this.clone();
        let on_status = Box::new(move |status: ErrorCode| {
            this.with(|manager| {
                manager
                    .expect("got create connection status after stack died")
                    .on_create_connection_status(status)
            })
        });

        if self.capabilities.supports_extended_create_connection {
            let only_init_1m_phy = config::get_bool(Property::OnlyInit1mPhy);

            let mut initiating_phys = PHY_LE_1M;
            let mut phy_parameters = vec![PhyScanParameters {
                scan: ScanParameters { scan_interval, scan_window },
                connection,
            }];
            if self.capabilities.supports_2m_phy && !only_init_1m_phy {
                phy_parameters.push(PhyScanParameters {
                    scan: ScanParameters { scan_interval, scan_window: scan_window_2m },
                    connection,
                });
                initiating_phys |= PHY_LE_2M;
            }
            if self.capabilities.supports_coded_phy && !only_init_1m_phy {
                phy_parameters.push(PhyScanParameters {
                    scan: ScanParameters { scan_interval, scan_window: scan_window_coded },
                    connection,
                });
                initiating_phys |= PHY_LE_CODED;
            }

            self.controller.extended_create_connection(
                LeExtendedCreateConnectionParameters {
                    initiator_filter_policy: InitiatorFilterPolicy::UseFilterAcceptList,
                    own_address_type,
                    peer_address: AddressWithType::EMPTY,
                    initiating_phys,
                    phy_parameters,
                },
                on_status,
            );
        } else {
            self.controller.create_connection(
                LeCreateConnectionParameters {
                    scan: ScanParameters { scan_interval, scan_window },
                    initiator_filter_policy: InitiatorFilterPolicy::UseFilterAcceptList,
                    peer_address: AddressWithType::EMPTY,
                    own_address_type,
                    connection,
                },
                on_status,
            );
        }
    }

    pub(crate) fn disarm_connectability(&self) {
        match self.connectability.get() {
            ConnectabilityState::Armed => {
                info!("disarming le connection state machine with create connection cancel");
                self.connectability.set(ConnectabilityState::Disarming);
                let this = self.this.clone();
                self.controller.create_connection_cancel(Box::new(move |status| {
                    this.with(|manager| {
                        manager
                            .expect("got create connection cancel completion after stack died")
                            .on_create_connection_cancel_complete(status)
                    })
                }));
            }
            ConnectabilityState::Arming { .. } => {
                info!("queueing cancel until le connection state machine is armed");
                self.connectability.set(ConnectabilityState::Arming { pending_disarm: true });
            }
            state @ (ConnectabilityState::Disarmed | ConnectabilityState::Disarming) => {
                error!(
                    "attempting to disarm le connection state machine in unexpected state:{state:?}"
                );
            }
        }
    }

    fn on_create_connection_status(&self, status: ErrorCode) {
        match self.connectability.get() {
            ConnectabilityState::Arming { pending_disarm } => {
                if !status.is_success() {
                    error!("le connection state machine failed to arm, status:{status:?}");
                }
                self.connectability.set(if status.is_success() {
                    ConnectabilityState::Armed
                } else {
                    ConnectabilityState::Disarmed
                });
                info!(
                    "le connection state machine armed, state:{:?} status:{status:?}",
                    self.connectability.get()
                );
                if pending_disarm {
                    self.disarm_connectability();
                }
            }
            state => {
                error!(
                    "received connectability arm notification in unexpected state:{state:?} status:{status:?}"
                );
            }
        }
    }

    fn on_create_connection_cancel_complete(&self, status: ErrorCode) {
        if !status.is_success() {
            warn!("create connection cancel failed, status:{status:?}");
            if self.paused.get() {
                warn!("acking pause after failed create connection cancel");
                self.address_manager.ack_pause();
                return;
            }
        }
        match self.connectability.get() {
            ConnectabilityState::Disarming => {
                self.connectability.set(ConnectabilityState::Disarmed);
            }
            state => {
                error!("received create connection cancel completion in unexpected state:{state:?}");
            }
        }
    }

    /// The outstanding create-connection was cancelled to satisfy a pause
    /// from the address manager; it will be re-issued on resume.
    pub(crate) fn on_le_connection_canceled_on_pause(&self) {
        assert!(self.paused.get(), "connection must be paused to ack the le address manager");
        self.arm_on_resume.set(true);
        self.connectability.set(ConnectabilityState::Disarmed);
        self.address_manager.ack_pause();
    }

    pub(crate) fn on_pause(&self) {
        if !self.address_manager_registered.get() {
            warn!("pause callback while unregistered");
            return;
        }
        self.paused.set(true);
        if self.connectability.get() == ConnectabilityState::Disarmed {
            self.address_manager.ack_pause();
            return;
        }
        self.arm_on_resume.set(!self.connecting.borrow().is_empty());
        self.disarm_connectability();
    }

    pub(crate) fn on_resume(&self) {
        if !self.address_manager_registered.get() {
            warn!("resume callback while unregistered");
            return;
        }
        self.paused.set(false);
        if self.arm_on_resume.get() {
            self.arm_connectability();
        }
        self.arm_on_resume.set(false);
        self.address_manager.ack_resume();
        self.check_for_unregister();
    }
}

#[cfg(test)]
mod test {
    use crate::{
        connection::{
            controller::ControllerCapabilities,
            mocks::{harness::Harness, mock_controller::MockCommand},
        },
        core::address::{AddressType, AddressWithType},
        utils::task::block_on_locally,
    };

    use super::*;

    const ADDRESS_1: AddressWithType =
        AddressWithType { address: [1, 2, 3, 4, 5, 6], address_type: AddressType::Public };

    fn legacy_controller() -> ControllerCapabilities {
        ControllerCapabilities::default()
    }

    fn extended_controller() -> ControllerCapabilities {
        ControllerCapabilities {
            supports_extended_create_connection: true,
            supports_2m_phy: true,
            supports_coded_phy: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_arm_with_empty_accept_list_is_noop() {
        block_on_locally(async {
            // arrange
            let harness = Harness::bring_up(legacy_controller());

            // act: arm before anything is on the accept list
            harness.manager.arm_connectability();

            // assert: no command was issued and we stay disarmed
            assert_eq!(harness.controller.outstanding_command_count(), 0);
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
        });
    }

    #[test]
    fn test_arm_issues_legacy_create_connection() {
        block_on_locally(async {
            // arrange
            let harness = Harness::bring_up(legacy_controller());
            harness.start_direct_connection(ADDRESS_1);

            // assert: a legacy create-connection is outstanding and we are arming
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Arming {
                pending_disarm: false
            });
            let MockCommand::CreateConnection { parameters, on_status } =
                harness.controller.pop_command().unwrap()
            else {
                unreachable!()
            };
            assert_eq!(parameters.peer_address, AddressWithType::EMPTY);

            // act: the command status arrives
            on_status(ErrorCode::SUCCESS);

            // assert
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Armed);
        });
    }

    #[test]
    fn test_arm_issues_extended_create_connection_with_all_phys() {
        block_on_locally(async {
            // arrange
            let harness = Harness::bring_up(extended_controller());
            harness.start_direct_connection(ADDRESS_1);

            // assert: the extended form carries 1M + 2M + Coded entries
            let MockCommand::ExtendedCreateConnection { parameters, on_status } =
                harness.controller.pop_command().unwrap()
            else {
                unreachable!()
            };
            assert_eq!(parameters.initiating_phys, PHY_LE_1M | PHY_LE_2M | PHY_LE_CODED);
            assert_eq!(parameters.phy_parameters.len(), 3);
            on_status(ErrorCode::SUCCESS);
        });
    }

    #[test]
    fn test_arm_failure_returns_to_disarmed() {
        block_on_locally(async {
            // arrange
            let harness = Harness::bring_up(legacy_controller());
            harness.start_direct_connection(ADDRESS_1);

            // act: the create-connection command is rejected
            let MockCommand::CreateConnection { on_status, .. } =
                harness.controller.pop_command().unwrap()
            else {
                unreachable!()
            };
            on_status(ErrorCode(0x0c));

            // assert
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
        });
    }

    #[test]
    fn test_single_outstanding_arm() {
        block_on_locally(async {
            // arrange: an armed state machine
            let harness = Harness::bring_up(legacy_controller());
            harness.start_direct_connection(ADDRESS_1);
            harness.complete_arm();

            // act: arm again
            harness.manager.arm_connectability();

            // assert: no second command was issued
            assert_eq!(harness.controller.outstanding_command_count(), 0);
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Armed);
        });
    }

    #[test]
    fn test_disarm_while_arming_is_deferred() {
        block_on_locally(async {
            // arrange: an arm whose command status is still pending
            let harness = Harness::bring_up(legacy_controller());
            harness.start_direct_connection(ADDRESS_1);

            // act: disarm before the arm settles
            harness.manager.disarm_connectability();

            // assert: no cancel issued yet, only the deferred intent
            assert_eq!(
                harness.manager.connectability_state(),
                ConnectabilityState::Arming { pending_disarm: true }
            );
            let MockCommand::CreateConnection { on_status, .. } =
                harness.controller.pop_command().unwrap()
            else {
                unreachable!()
            };

            // act: the arm settles
            on_status(ErrorCode::SUCCESS);

            // assert: the deferred disarm fires immediately
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarming);
            let Some(MockCommand::CreateConnectionCancel { on_complete }) =
                harness.controller.pop_command()
            else {
                unreachable!()
            };
            on_complete(ErrorCode::SUCCESS);
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
        });
    }

    #[test]
    fn test_disarm_while_disarmed_logs_but_does_not_crash() {
        block_on_locally(async {
            let harness = Harness::bring_up(legacy_controller());

            harness.manager.disarm_connectability();

            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
            assert_eq!(harness.controller.outstanding_command_count(), 0);
        });
    }

    #[test]
    fn test_cancel_completion_settles_disarm() {
        block_on_locally(async {
            // arrange: an armed state machine
            let harness = Harness::bring_up(legacy_controller());
            harness.start_direct_connection(ADDRESS_1);
            harness.complete_arm();

            // act
            harness.manager.disarm_connectability();
            let Some(MockCommand::CreateConnectionCancel { on_complete }) =
                harness.controller.pop_command()
            else {
                unreachable!()
            };
            on_complete(ErrorCode::SUCCESS);

            // assert
            assert_eq!(harness.manager.connectability_state(), ConnectabilityState::Disarmed);
        });
    }
}
