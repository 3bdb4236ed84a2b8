//! GATT vocabulary: statuses, capability flags, client configuration values
//! and discovered topology.

use std::fmt;

use serde::Deserialize;
use uuid::Uuid;

use crate::address::DeviceAddress;

/// Outcome status of a native GATT call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GattStatus {
    Success,
    Unreachable,
    ProtocolError,
    AccessDenied,
    /// Any status code the stack reports outside the known set.
    Unknown(u8),
}

impl GattStatus {
    /// Interpret a raw native status code.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Unreachable,
            2 => Self::ProtocolError,
            3 => Self::AccessDenied,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Unreachable => f.write_str("unreachable"),
            Self::ProtocolError => f.write_str("protocol error"),
            Self::AccessDenied => f.write_str("access denied"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// Characteristic property bitmask as advertised in the GATT declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CharacteristicProperties(u8);

impl CharacteristicProperties {
    pub const BROADCAST: Self = Self(0x01);
    pub const READ: Self = Self(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);
    pub const AUTHENTICATED_SIGNED_WRITES: Self = Self(0x40);
    pub const EXTENDED_PROPERTIES: Self = Self(0x80);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if any flag of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CharacteristicProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Value written to the client characteristic configuration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CccdValue {
    None,
    Notify,
    Indicate,
}

/// Whether a write waits for the peripheral's acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    WithResponse,
    WithoutResponse,
}

impl WriteKind {
    #[must_use]
    pub const fn from_with_response(with_response: bool) -> Self {
        if with_response {
            Self::WithResponse
        } else {
            Self::WithoutResponse
        }
    }
}

/// Which configuration value to pick when a characteristic supports both
/// notifications and indications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    #[default]
    PreferIndicate,
    PreferNotify,
}

impl NotifyPolicy {
    /// Pick the configuration value enabling value updates, or `None` if the
    /// characteristic supports neither mode.
    #[must_use]
    pub fn select(self, properties: CharacteristicProperties) -> Option<CccdValue> {
        let indicate = properties.contains(CharacteristicProperties::INDICATE);
        let notify = properties.contains(CharacteristicProperties::NOTIFY);
        match (self, indicate, notify) {
            (Self::PreferIndicate, true, _) | (Self::PreferNotify, true, false) => {
                Some(CccdValue::Indicate)
            }
            (_, _, true) => Some(CccdValue::Notify),
            (_, false, false) => None,
        }
    }
}

/// Characteristic as reported by service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub uuid: Uuid,
    pub service: Uuid,
    pub is_readable: bool,
    pub is_writable_with_response: bool,
    pub is_writable_without_response: bool,
    pub is_notifiable: bool,
    pub is_indicatable: bool,
}

impl DiscoveredCharacteristic {
    /// Derive the capability booleans from the property bitmask.
    #[must_use]
    pub fn from_properties(uuid: Uuid, service: Uuid, properties: CharacteristicProperties) -> Self {
        Self {
            uuid,
            service,
            is_readable: properties.intersects(CharacteristicProperties::READ),
            is_writable_with_response: properties.intersects(CharacteristicProperties::WRITE),
            is_writable_without_response: properties
                .intersects(CharacteristicProperties::WRITE_WITHOUT_RESPONSE),
            is_notifiable: properties.intersects(CharacteristicProperties::NOTIFY),
            is_indicatable: properties.intersects(CharacteristicProperties::INDICATE),
        }
    }
}

/// Service with its included services and characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub uuid: Uuid,
    pub included_services: Vec<DiscoveredService>,
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

/// Snapshot of a device's GATT topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTopology {
    pub device: DeviceAddress,
    pub services: Vec<DiscoveredService>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_known_status_codes() {
        assert_eq!(GattStatus::from_code(0), GattStatus::Success);
        assert_eq!(GattStatus::from_code(1), GattStatus::Unreachable);
        assert_eq!(GattStatus::from_code(2), GattStatus::ProtocolError);
        assert_eq!(GattStatus::from_code(3), GattStatus::AccessDenied);
        assert_eq!(GattStatus::from_code(17), GattStatus::Unknown(17));
    }

    #[test]
    fn should_prefer_indicate_when_both_supported() {
        let both = CharacteristicProperties::NOTIFY | CharacteristicProperties::INDICATE;
        assert_eq!(NotifyPolicy::PreferIndicate.select(both), Some(CccdValue::Indicate));
        assert_eq!(NotifyPolicy::PreferNotify.select(both), Some(CccdValue::Notify));
    }

    #[test]
    fn should_fall_back_to_only_supported_mode() {
        let notify = CharacteristicProperties::NOTIFY;
        let indicate = CharacteristicProperties::INDICATE;
        assert_eq!(NotifyPolicy::PreferIndicate.select(notify), Some(CccdValue::Notify));
        assert_eq!(NotifyPolicy::PreferNotify.select(indicate), Some(CccdValue::Indicate));
    }

    #[test]
    fn should_select_nothing_without_notify_or_indicate() {
        let read_only = CharacteristicProperties::READ;
        assert_eq!(NotifyPolicy::PreferIndicate.select(read_only), None);
        assert_eq!(NotifyPolicy::PreferNotify.select(read_only), None);
    }

    #[test]
    fn should_derive_capabilities_from_bitmask() {
        let properties = CharacteristicProperties::READ
            | CharacteristicProperties::WRITE_WITHOUT_RESPONSE
            | CharacteristicProperties::INDICATE;
        let discovered =
            DiscoveredCharacteristic::from_properties(Uuid::from_u128(2), Uuid::from_u128(1), properties);
        assert!(discovered.is_readable);
        assert!(!discovered.is_writable_with_response);
        assert!(discovered.is_writable_without_response);
        assert!(!discovered.is_notifiable);
        assert!(discovered.is_indicatable);
    }

    #[test]
    fn should_deserialize_notify_policy_from_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            policy: NotifyPolicy,
        }
        let holder: Holder = toml::from_str("policy = 'prefer_notify'").unwrap();
        assert_eq!(holder.policy, NotifyPolicy::PreferNotify);
    }
}
