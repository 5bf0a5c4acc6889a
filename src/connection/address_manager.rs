//! The boundary to the address-rotation manager: the component that owns the
//! initiator address (rotating it when privacy is enabled) and the
//! controller-resident filter accept / resolving lists.
//!
//! List mutations and address rotations require the controller to have no
//! outstanding create-connection command, so the address manager pauses its
//! registered clients before touching the controller and resumes them after.
//! The handshake is cooperative: a paused client must acknowledge the pause
//! (immediately if it is disarmed, otherwise once its disarm completes), and
//! must acknowledge each resume.

use std::time::Duration;

use crate::core::address::AddressWithType;

/// The policy governing the initiator address
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Use the controller's public address
    UsePublicAddress,
    /// Use a fixed random static address
    UseStaticAddress,
    /// Rotate through non-resolvable private addresses
    UseNonResolvableAddress,
    /// Rotate through resolvable private addresses generated from the
    /// rotation IRK
    UseResolvableAddress,
}

impl AddressPolicy {
    /// Rotating policies require a completed set-random-address cycle before
    /// the first connection attempt, so registration starts paused.
    pub fn pauses_on_register(self) -> bool {
        matches!(self, AddressPolicy::UseResolvableAddress | AddressPolicy::UseNonResolvableAddress)
    }
}

/// Parameters of the initiator address privacy policy
#[derive(Copy, Clone, Debug)]
pub struct PrivacyPolicyParameters {
    /// The address policy to apply
    pub address_policy: AddressPolicy,
    /// The fixed address, for UseStaticAddress
    pub fixed_address: AddressWithType,
    /// The IRK used to generate resolvable private addresses
    pub rotation_irk: [u8; 16],
    /// Whether controller-level address privacy may be used at all
    pub enable_address_privacy: bool,
    /// Lower bound on the rotation period
    pub minimum_rotation_time: Duration,
    /// Upper bound on the rotation period
    pub maximum_rotation_time: Duration,
}

/// The pause handshake, implemented by each registered client
pub trait LeAddressManagerCallback {
    /// The address manager needs the client quiesced. The client must call
    /// ack_pause once it has no outstanding create-connection command.
    fn on_pause(&self);
    /// The address manager has finished its work. The client may re-arm,
    /// and must call ack_resume.
    fn on_resume(&self);
}

/// The operations the address manager provides to the connection manager.
/// No operation may be invoked before register; registration is idempotent
/// from the caller's side and tracked there.
pub trait LeAddressManager {
    /// Register a client for pause callbacks. Returns the active policy.
    fn register(&self, callback: Box<dyn LeAddressManagerCallback>) -> AddressPolicy;
    /// Unregister the previously registered client
    fn unregister(&self);
    /// Acknowledge a pause delivered through on_pause
    fn ack_pause(&self);
    /// Acknowledge a resume delivered through on_resume
    fn ack_resume(&self);

    /// The address the initiator currently advertises/connects with
    fn initiator_address(&self) -> AddressWithType;

    /// Add an address to the controller filter accept list
    fn add_device_to_filter_accept_list(&self, address: AddressWithType);
    /// Remove an address from the controller filter accept list
    fn remove_device_from_filter_accept_list(&self, address: AddressWithType);
    /// Clear the controller filter accept list
    fn clear_filter_accept_list(&self);

    /// Add an identity to the controller resolving list
    fn add_device_to_resolving_list(
        &self,
        address: AddressWithType,
        peer_irk: [u8; 16],
        local_irk: [u8; 16],
    );
    /// Remove an identity from the controller resolving list
    fn remove_device_from_resolving_list(&self, address: AddressWithType);
    /// Clear the controller resolving list
    fn clear_resolving_list(&self);

    /// Configure the initiator address policy
    fn set_privacy_policy(&self, parameters: PrivacyPolicyParameters);
}
