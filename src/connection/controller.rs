//! The command interface the controller transport exposes to the connection
//! manager. Every command is fire-and-forget: the transport delivers exactly
//! one status or completion callback per command, on the same serial context
//! that issued it. The connection manager never blocks on a command.

use crate::core::address::{AddressType, AddressWithType};

use super::{error::ErrorCode, ids::ConnectionHandle};

/// LE 1M PHY bit in an initiating-PHY mask
pub const PHY_LE_1M: u8 = 0x01;
/// LE 2M PHY bit in an initiating-PHY mask
pub const PHY_LE_2M: u8 = 0x02;
/// LE Coded PHY bit in an initiating-PHY mask
pub const PHY_LE_CODED: u8 = 0x04;

/// Static controller capabilities relevant to connection establishment,
/// read once at startup.
#[derive(Copy, Clone, Debug, Default)]
pub struct ControllerCapabilities {
    /// The controller accepts the extended (multi-PHY) create-connection form
    pub supports_extended_create_connection: bool,
    /// The controller can initiate on the 2M PHY
    pub supports_2m_phy: bool,
    /// The controller can initiate on the Coded PHY
    pub supports_coded_phy: bool,
    /// The controller supports extended advertising, so incoming connections
    /// carry an advertising-set identity resolved only on set termination
    pub supports_extended_advertising: bool,
    /// The controller multiplexes several legacy advertising sets
    pub supports_multi_advertising: bool,
    /// The controller supports LL privacy (address resolution)
    pub supports_privacy: bool,
}

/// Negotiable connection parameters carried by a create-connection command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Minimum connection interval (1.25 ms units)
    pub conn_interval_min: u16,
    /// Maximum connection interval (1.25 ms units)
    pub conn_interval_max: u16,
    /// Peripheral latency in connection events
    pub conn_latency: u16,
    /// Supervision timeout (10 ms units)
    pub supervision_timeout: u16,
    /// Minimum connection event length (0.625 ms units)
    pub min_ce_length: u16,
    /// Maximum connection event length (0.625 ms units)
    pub max_ce_length: u16,
}

/// The initiator scan timing for one PHY
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanParameters {
    /// Scan interval (0.625 ms units)
    pub scan_interval: u16,
    /// Scan window (0.625 ms units)
    pub scan_window: u16,
}

/// Per-PHY entry of an extended create-connection command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhyScanParameters {
    /// Scan timing used while initiating on this PHY
    pub scan: ScanParameters,
    /// Connection parameters requested on this PHY
    pub connection: ConnectionParameters,
}

/// Whether the initiator connects to a single peer or to anything on the
/// filter accept list
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InitiatorFilterPolicy {
    /// Connect to the peer address in the command
    UsePeerAddress,
    /// Connect to any device on the filter accept list
    UseFilterAcceptList,
}

/// The legacy (single-PHY) create-connection command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LeCreateConnectionParameters {
    /// Scan timing while initiating
    pub scan: ScanParameters,
    /// Peer selection policy
    pub initiator_filter_policy: InitiatorFilterPolicy,
    /// The peer to connect to; ignored under UseFilterAcceptList
    pub peer_address: AddressWithType,
    /// The local address type to initiate with
    pub own_address_type: AddressType,
    /// Requested connection parameters
    pub connection: ConnectionParameters,
}

/// The extended (multi-PHY) create-connection command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeExtendedCreateConnectionParameters {
    /// Peer selection policy
    pub initiator_filter_policy: InitiatorFilterPolicy,
    /// The local address type to initiate with
    pub own_address_type: AddressType,
    /// The peer to connect to; ignored under UseFilterAcceptList
    pub peer_address: AddressWithType,
    /// Bitmask of PHY_LE_* values; one entry in phy_parameters per set bit
    pub initiating_phys: u8,
    /// Scan/connection parameters, ordered to match initiating_phys
    pub phy_parameters: Vec<PhyScanParameters>,
}

/// The set-default-subrate command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DefaultSubrateParameters {
    /// Minimum subrate factor
    pub subrate_min: u16,
    /// Maximum subrate factor
    pub subrate_max: u16,
    /// Maximum peripheral latency in subrated events
    pub max_latency: u16,
    /// Minimum number of underlying connection events to remain active
    pub continuation_number: u16,
    /// Supervision timeout (10 ms units)
    pub supervision_timeout: u16,
}

/// The reply to a remote connection parameter request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParameterRequestReply {
    /// Minimum accepted connection interval (1.25 ms units)
    pub interval_min: u16,
    /// Maximum accepted connection interval (1.25 ms units)
    pub interval_max: u16,
    /// Accepted peripheral latency
    pub latency: u16,
    /// Accepted supervision timeout (10 ms units)
    pub timeout: u16,
    /// Minimum connection event length (0.625 ms units)
    pub min_ce_length: u16,
    /// Maximum connection event length (0.625 ms units)
    pub max_ce_length: u16,
}

/// Invoked with the command-status event for a pending command
pub type CommandStatusCallback = Box<dyn FnOnce(ErrorCode)>;
/// Invoked with the command-complete status for a command
pub type CommandCompleteCallback = Box<dyn FnOnce(ErrorCode)>;

/// The LE ACL commands issued by the connection manager. Implemented by the
/// HCI transport; mocked in tests.
pub trait LeAclConnectionInterface {
    /// Issue a legacy create-connection command. The controller reports a
    /// command status, then (much later) a connection-complete event.
    fn create_connection(
        &self,
        parameters: LeCreateConnectionParameters,
        on_status: CommandStatusCallback,
    );

    /// Issue an extended (multi-PHY) create-connection command
    fn extended_create_connection(
        &self,
        parameters: LeExtendedCreateConnectionParameters,
        on_status: CommandStatusCallback,
    );

    /// Cancel the outstanding create-connection command. The controller
    /// reports command completion, then a connection-complete event with
    /// status UNKNOWN_CONNECTION.
    fn create_connection_cancel(&self, on_complete: CommandCompleteCallback);

    /// Suggest the default data length for new connections
    fn write_suggested_default_data_length(
        &self,
        tx_octets: u16,
        tx_time: u16,
        on_complete: CommandCompleteCallback,
    );

    /// Set the default subrate range for new connections
    fn set_default_subrate(
        &self,
        parameters: DefaultSubrateParameters,
        on_complete: CommandCompleteCallback,
    );

    /// Accept a remote connection parameter request
    fn connection_parameter_request_reply(
        &self,
        handle: ConnectionHandle,
        reply: ConnectionParameterRequestReply,
        on_complete: CommandCompleteCallback,
    );
}
