//! Tracking of in-flight connection attempts: the direct set with its
//! per-peer timeout alarms, the background-reconnect set, and the
//! per-role decision trees run on each connection-complete event.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{task::spawn_local, time::sleep};

use crate::core::address::{Address, AddressWithType, PeerAddressType};

use super::{
    acl_connection::{LeAclConnection, Role, RoleSpecificData},
    config::{self, Property},
    connectability::ConnectabilityState,
    error::ErrorCode,
    event_dispatcher::{LeConnectionCompleteEvent, LeEnhancedConnectionCompleteEvent},
    ids::ConnectionHandle,
    AddressManagerPauseHandler, LeConnectionManager,
};

struct ConnectionCompleteContext {
    status: ErrorCode,
    connection_handle: ConnectionHandle,
    role: Role,
    remote_address: AddressWithType,
    peer_address_type: Option<PeerAddressType>,
    conn_interval: u16,
    conn_latency: u16,
    supervision_timeout: u16,
    local_resolvable_private_address: Option<Address>,
    peer_resolvable_private_address: Option<Address>,
}

/// How a connection-complete event was classified by the per-role decision
/// tree
enum CompleteDisposition {
    /// A protocol-timing race (cancelled or retried attempt); nothing is
    /// reported to the client
    BenignRace,
    /// A client-visible failure; already reported
    Failed,
    /// A live connection; a record must be created
    Proceed,
}

impl LeConnectionManager {
    /// Request a connection to the peer. With add_to_accept_list the peer
    /// joins the accept list (registering with the address manager on first
    /// use); with is_direct the attempt is bounded by the configured
    /// direct-connection timeout, otherwise it runs in the background
    /// indefinitely.
    pub fn create_le_connection(
        &self,
        address: AddressWithType,
        add_to_accept_list: bool,
        is_direct: bool,
    ) {
        if !self.client_callbacks.is_registered() {
            error!("no callbacks to call");
            return;
        }
        if self.connections.already_connected(address) {
            info!("device {address:?} already connected, ignoring connection request");
            return;
        }

        let already_in_connect_list = self.connect_list.borrow().contains(&address);
        if add_to_accept_list {
            if !already_in_connect_list {
                self.add_device_to_connect_list(address);
            }
            if is_direct {
                self.direct_connections.borrow_mut().insert(address);
                self.schedule_create_connection_timeout(address);
            }
        }

        if !self.address_manager_registered.get() {
            let this = self.this.clone();
            let policy = self.address_manager.register(Box::new(AddressManagerPauseHandler(this)));
            self.address_manager_registered.set(true);
            // rotating policies need a completed set-random-address cycle
            // before the first connection attempt
            if policy.pauses_on_register() {
                self.paused.set(true);
            }
        }

        if self.paused.get() {
            self.arm_on_resume.set(true);
            return;
        }

        match self.connectability.get() {
            ConnectabilityState::Armed | ConnectabilityState::Arming { .. } => {
                if already_in_connect_list {
                    // the accept list changed under the outstanding
                    // create-connection; cycle it
                    self.rearm_after_disarm.set(true);
                    self.disarm_connectability();
                } else {
                    debug!(
                        "deferred until accept list update completes, state {:?}",
                        self.connectability.get()
                    );
                }
            }
            _ => {
                if add_to_accept_list {
                    // the arm must wait for the accept-list command; the
                    // resume following it will arm
                    self.arm_on_resume.set(true);
                    debug!("deferred until accept list update completes");
                } else {
                    self.post(|manager| manager.arm_connectability());
                }
            }
        }
    }

    /// Abandon the connection attempt to the peer: clears its timeout alarm
    /// and removes it from the accept list.
    pub fn cancel_connect(&self, address: AddressWithType) {
        self.cancel_connection_timeout(address);
        // the outstanding create-connection is cancelled by the address
        // manager pause around the accept-list removal
        self.remove_device_from_connect_list(address);
    }

    fn schedule_create_connection_timeout(&self, address: AddressWithType) {
        let mut alarms = self.create_connection_timeout_alarms.borrow_mut();
        if alarms.contains_key(&address) {
            return;
        }
        let timeout = Duration::from_millis(config::get_u32(Property::DirectConnTimeoutMs) as u64);
        let this = self.this.clone();
        let task = spawn_local(async move {
            sleep(timeout).await;
            this.with(|manager| {
                manager
                    .expect("create connection timeout fired after stack died")
                    .on_create_connection_timeout(address)
            });
        });
        alarms.insert(address, task.into());
    }

    fn cancel_connection_timeout(&self, address: AddressWithType) {
        let alarm = self.create_connection_timeout_alarms.borrow_mut().remove(&address);
        drop(alarm);
    }

    fn on_create_connection_timeout(&self, address: AddressWithType) {
        info!("create connection timeout for {address:?}");
        if self.create_connection_timeout_alarms.borrow_mut().remove(&address).is_none() {
            // cancelled in the window between firing and running
            return;
        }
        if self.background_connections.borrow().contains(&address) {
            // keep the accept-list entry for the background reconnect, just
            // stop the bounded attempt
            self.direct_connections.borrow_mut().remove(&address);
            self.disarm_connectability();
        } else {
            self.cancel_connect(address);
        }
        self.client_callbacks.with(|callbacks| {
            callbacks.on_le_connect_fail(address, ErrorCode::CONNECTION_ACCEPT_TIMEOUT)
        });
    }

    pub(crate) fn on_le_connection_complete(&self, event: LeConnectionCompleteEvent) {
        let remote_address = AddressWithType {
            address: event.peer_address,
            address_type: event.peer_address_type,
        };
        self.process_connection_complete(ConnectionCompleteContext {
            status: event.status,
            connection_handle: event.connection_handle,
            role: event.role,
            remote_address,
            peer_address_type: None,
            conn_interval: event.conn_interval,
            conn_latency: event.conn_latency,
            supervision_timeout: event.supervision_timeout,
            local_resolvable_private_address: None,
            peer_resolvable_private_address: None,
        });
    }

    pub(crate) fn on_le_enhanced_connection_complete(
        &self,
        event: LeEnhancedConnectionCompleteEvent,
    ) {
        let remote_address = AddressWithType {
            address: event.peer_address,
            address_type: event.peer_address_type.to_device_address_type(),
        };
        self.process_connection_complete(ConnectionCompleteContext {
            status: event.status,
            connection_handle: event.connection_handle,
            role: event.role,
            remote_address,
            peer_address_type: Some(event.peer_address_type),
            conn_interval: event.conn_interval,
            conn_latency: event.conn_latency,
            supervision_timeout: event.supervision_timeout,
            local_resolvable_private_address: Some(event.local_resolvable_private_address),
            peer_resolvable_private_address: Some(event.peer_resolvable_private_address),
        });
    }

    fn process_connection_complete(&self, ctx: ConnectionCompleteContext) {
        let in_filter_accept_list = self.is_device_in_connect_list(ctx.remote_address);

        let disposition = match ctx.role {
            Role::Central => {
                self.process_central_connection_complete(ctx.status, ctx.remote_address)
            }
            Role::Peripheral => self.process_peripheral_connection_complete(
                ctx.status,
                ctx.remote_address,
                in_filter_accept_list,
            ),
        };
        match disposition {
            CompleteDisposition::BenignRace => return,
            CompleteDisposition::Failed => {
                self.check_for_unregister();
                return;
            }
            CompleteDisposition::Proceed => {}
        }

        if !config::check_connection_parameters(
            ctx.conn_interval,
            ctx.conn_interval,
            ctx.conn_latency,
            ctx.supervision_timeout,
        ) {
            error!("received connection complete with invalid connection parameters");
            return;
        }

        let role_specific_data = self.initialize_role_specific_data(ctx.role);
        let awaiting_advertising_identity =
            matches!(role_specific_data, RoleSpecificData::UninitializedPeripheral);

        self.scheduler.register_le_connection(ctx.connection_handle);
        let generation = self.connections.add(ctx.connection_handle, ctx.remote_address);
        let connection = LeAclConnection::new(
            ctx.connection_handle,
            generation,
            ctx.remote_address,
            ctx.remote_address.address,
            ctx.peer_address_type,
            role_specific_data,
            ctx.conn_interval,
            ctx.conn_latency,
            ctx.supervision_timeout,
            ctx.local_resolvable_private_address,
            ctx.peer_resolvable_private_address,
            in_filter_accept_list,
            ctx.role == Role::Central,
            Arc::downgrade(&self.connections),
        );

        if awaiting_advertising_identity {
            // the client success callback fires once the advertising-set
            // terminated notification identifies the set the peer hit
            self.connections.set_pending(ctx.connection_handle, connection);
        } else {
            self.client_callbacks.with(move |callbacks| {
                callbacks.on_le_connect_success(ctx.remote_address, connection)
            });
            self.acceptlist_callbacks
                .with(|callbacks| callbacks.on_le_connect_success(ctx.remote_address));
        }
        self.check_for_unregister();
    }

    fn process_central_connection_complete(
        &self,
        status: ErrorCode,
        remote_address: AddressWithType,
    ) -> CompleteDisposition {
        // the controller releases the outstanding create-connection when it
        // reports a completion, whatever the status
        self.connectability.set(ConnectabilityState::Disarmed);

        if status == ErrorCode::UNKNOWN_CONNECTION {
            if self.paused.get() {
                self.on_le_connection_canceled_on_pause();
                return CompleteDisposition::BenignRace;
            }
            if self.rearm_after_disarm.get() {
                self.rearm_after_disarm.set(false);
                self.arm_connectability();
                return CompleteDisposition::BenignRace;
            }
        }

        self.on_common_le_connection_complete(remote_address);

        if status == ErrorCode::UNKNOWN_CONNECTION {
            if !remote_address.is_empty() {
                info!("controller sent non-empty address field: {remote_address:?}");
            }
            // direct connect cancelled by its create-connection timeout;
            // keep trying in the background
            self.create_le_connection(remote_address, false, false);
            return CompleteDisposition::BenignRace;
        }

        self.arm_on_resume.set(false);
        self.ready_to_unregister.set(true);
        self.remove_device_from_connect_list(remote_address);

        if !self.connect_list.borrow().is_empty() {
            self.post(|manager| {
                manager.create_le_connection(AddressWithType::EMPTY, false, false)
            });
        }

        if !self.client_callbacks.is_registered() {
            error!("no callbacks to call");
            return CompleteDisposition::Failed;
        }
        if !status.is_success() {
            self.report_le_connection_failure(remote_address, status);
            return CompleteDisposition::Failed;
        }
        CompleteDisposition::Proceed
    }

    fn process_peripheral_connection_complete(
        &self,
        status: ErrorCode,
        remote_address: AddressWithType,
        in_filter_accept_list: bool,
    ) -> CompleteDisposition {
        info!("received connection complete with peripheral role");
        if !self.client_callbacks.is_registered() {
            error!("no callbacks to call");
            return CompleteDisposition::Failed;
        }
        if !status.is_success() {
            warn!("received peripheral connection complete with error code {status:?}");
            self.report_le_connection_failure(remote_address, status);
            return CompleteDisposition::Failed;
        }
        if in_filter_accept_list {
            info!("received incoming connection of device in filter accept list, {remote_address:?}");
            self.remove_device_from_connect_list(remote_address);
            self.cancel_connection_timeout(remote_address);
        }
        CompleteDisposition::Proceed
    }

    fn on_common_le_connection_complete(&self, remote_address: AddressWithType) {
        if !self.connecting.borrow().contains(&remote_address) {
            warn!("no prior connection request for {remote_address:?}");
        }
        self.connecting.borrow_mut().clear();
        self.cancel_connection_timeout(remote_address);
    }

    fn initialize_role_specific_data(&self, role: Role) -> RoleSpecificData {
        if role == Role::Central {
            RoleSpecificData::Central { local_address: self.address_manager.initiator_address() }
        } else if self.capabilities.supports_extended_advertising
            || self.capabilities.supports_multi_advertising
        {
            // when accepting a connection we must learn the address from the
            // advertiser; the set-terminated notification associates the
            // connection handle with its advertising identity
            RoleSpecificData::UninitializedPeripheral
        } else {
            // with legacy single-set advertising, our current address is
            // also the advertised address
            RoleSpecificData::Peripheral {
                local_address: self.address_manager.initiator_address(),
                advertising_set_id: None,
                discoverable: true,
            }
        }
    }
}
