//! An address with type (public / random)

/// A raw 6-byte device address, stored in little-endian format
pub type Address = [u8; 6];

/// The all-zero address the controller reports when no peer is involved
pub const EMPTY_ADDRESS: Address = [0, 0, 0, 0, 0, 0];

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[repr(C)]
/// The type of an LE address (see: 5.3 Vol 6B 1.3 Device Address)
pub enum AddressType {
    /// A public address
    Public = 0x0,
    /// A random address (either random static or private)
    Random = 0x1,
}

/// The peer address type as reported in enhanced connection events,
/// which distinguishes identity addresses from device addresses
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum PeerAddressType {
    /// A public device address
    PublicDeviceAddress,
    /// A random device address
    RandomDeviceAddress,
    /// A public identity address (resolved by the controller)
    PublicIdentityAddress,
    /// A random static identity address (resolved by the controller)
    RandomIdentityAddress,
}

impl PeerAddressType {
    /// Collapse into the device address type used for connection records
    pub fn to_device_address_type(self) -> AddressType {
        match self {
            PeerAddressType::PublicDeviceAddress | PeerAddressType::PublicIdentityAddress => {
                AddressType::Public
            }
            PeerAddressType::RandomDeviceAddress | PeerAddressType::RandomIdentityAddress => {
                AddressType::Random
            }
        }
    }
}

/// An LE address
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[repr(C)]
pub struct AddressWithType {
    /// The 6 address bytes stored in little-endian format
    pub address: Address,
    /// The address type, either public or random
    pub address_type: AddressType,
}

impl AddressWithType {
    /// An empty/invalid address
    pub const EMPTY: Self = Self { address: EMPTY_ADDRESS, address_type: AddressType::Public };

    /// Whether the address bytes are all-zero, regardless of type
    pub fn is_empty(&self) -> bool {
        self.address == EMPTY_ADDRESS
    }
}
