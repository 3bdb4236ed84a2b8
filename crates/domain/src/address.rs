//! Addressing: devices, characteristics and subscription keys.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ParseError;

const ADDRESS_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// 48-bit Bluetooth device address.
///
/// On the wire the address travels as its decimal string form, the same form
/// native stacks expose as a numeric address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress(u64);

impl DeviceAddress {
    /// Wrap a raw numeric address. Bits above the low 48 are discarded.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw & ADDRESS_MASK)
    }

    /// The six MAC bytes, most significant first.
    #[must_use]
    pub fn to_mac_bytes(self) -> [u8; 6] {
        let raw = self.0.to_be_bytes();
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&raw[2..]);
        bytes
    }

    /// The numeric address.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s
            .parse()
            .map_err(|_| ParseError::InvalidDeviceId(s.to_string()))?;
        if raw > ADDRESS_MASK {
            return Err(ParseError::InvalidDeviceId(s.to_string()));
        }
        Ok(Self(raw))
    }
}

/// Identifies one characteristic within a device for subscription and cache
/// lookups.
///
/// The service is part of the key, so two services exposing the same
/// characteristic UUID never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    /// Owning service.
    pub service: Uuid,
    /// Characteristic within the service.
    pub characteristic: Uuid,
}

impl SubscriptionKey {
    #[must_use]
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.characteristic)
    }
}

/// Fully qualified characteristic: device, service and characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicAddress {
    pub device: DeviceAddress,
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl CharacteristicAddress {
    #[must_use]
    pub const fn new(device: DeviceAddress, service: Uuid, characteristic: Uuid) -> Self {
        Self {
            device,
            service,
            characteristic,
        }
    }

    /// Key used for the per-device characteristic cache and subscription table.
    #[must_use]
    pub const fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.service, self.characteristic)
    }
}

impl fmt::Display for CharacteristicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.device, self.service, self.characteristic)
    }
}
