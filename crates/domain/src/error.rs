//! Error types shared across the workspace.
//!
//! [`BleError`] is the single taxonomy every operation reports through. Layers
//! that talk to native stacks or codecs define their own errors and convert
//! into it at their boundary.

use uuid::Uuid;

use crate::address::{DeviceAddress, SubscriptionKey};
use crate::gatt::GattStatus;

/// Failure of a BLE central operation.
///
/// Cloneable so a failure can travel inside published events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BleError {
    /// No agent exists for the address.
    #[error("device {0} is not connected")]
    NotConnected(DeviceAddress),

    /// Service or characteristic enumeration returned a non-success status.
    #[error("service discovery failed with status {0}")]
    ServiceDiscovery(GattStatus),

    /// The device does not expose the requested service.
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    /// The service does not expose the requested characteristic.
    #[error("characteristic {characteristic} not found in service {service}")]
    CharacteristicNotFound {
        /// Service that was searched.
        service: Uuid,
        /// Characteristic that was requested.
        characteristic: Uuid,
    },

    /// The peripheral could not be reached.
    #[error("device unreachable")]
    Unreachable,

    /// The peripheral answered with an ATT protocol error.
    #[error("GATT protocol error")]
    ProtocolError,

    /// The peripheral refused access to the attribute.
    #[error("access denied")]
    AccessDenied,

    /// The native stack reported a status outside the known set.
    #[error("unknown GATT error")]
    UnknownGatt,

    /// A write was rejected by the transport.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// No subscription is registered for the key.
    #[error("characteristic {0} is not subscribed")]
    NotSubscribed(SubscriptionKey),

    /// The characteristic supports neither notifications nor indications.
    #[error("characteristic {0} supports neither notify nor indicate")]
    NotNotifiable(SubscriptionKey),

    /// Opening the native device or the initial enumeration failed.
    #[error("failed to connect to {device}: {reason}")]
    ConnectionFailed {
        /// Address that was being connected.
        device: DeviceAddress,
        /// Native failure description.
        reason: String,
    },

    /// A pending connection was cancelled by a disconnect request.
    #[error("connection to {0} was cancelled")]
    ConnectionAborted(DeviceAddress),

    /// An outbound message could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// An inbound request could not be decoded.
    #[error("malformed request")]
    Parse(#[from] ParseError),
}

impl BleError {
    /// Map a non-success GATT status to the matching operation error.
    ///
    /// [`GattStatus::Success`] has no error counterpart and maps to
    /// [`BleError::UnknownGatt`].
    #[must_use]
    pub fn from_status(status: GattStatus) -> Self {
        match status {
            GattStatus::Unreachable => Self::Unreachable,
            GattStatus::ProtocolError => Self::ProtocolError,
            GattStatus::AccessDenied => Self::AccessDenied,
            GattStatus::Success | GattStatus::Unknown(_) => Self::UnknownGatt,
        }
    }
}

/// Failure to interpret an inbound value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Device id is not a decimal 48-bit address.
    #[error("invalid device id {0:?}")]
    InvalidDeviceId(String),

    /// UUID byte length is not 2, 4 or 16.
    #[error("invalid UUID length {0}, expected 2, 4 or 16 bytes")]
    InvalidUuidLength(usize),

    /// A required field is absent.
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// The bytes do not decode as the expected message.
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Fault reported by a native BLE stack.
///
/// Kept separate from [`BleError`] so adapters can report what the OS said
/// and let the executor decide how to normalize it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The native call completed with a non-success status.
    #[error("native call returned status {0}")]
    Status(GattStatus),

    /// The native call faulted before producing a status.
    #[error("native call rejected: {0}")]
    Rejected(String),

    /// The device could not be opened.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_statuses_to_errors() {
        assert_eq!(
            BleError::from_status(GattStatus::Unreachable),
            BleError::Unreachable
        );
        assert_eq!(
            BleError::from_status(GattStatus::ProtocolError),
            BleError::ProtocolError
        );
        assert_eq!(
            BleError::from_status(GattStatus::AccessDenied),
            BleError::AccessDenied
        );
        assert_eq!(
            BleError::from_status(GattStatus::Unknown(9)),
            BleError::UnknownGatt
        );
    }

    #[test]
    fn should_display_not_connected_with_decimal_address() {
        let err = BleError::NotConnected(DeviceAddress::new(42));
        assert_eq!(err.to_string(), "device 42 is not connected");
    }

    #[test]
    fn should_display_characteristic_not_found() {
        let err = BleError::CharacteristicNotFound {
            service: Uuid::from_u128(1),
            characteristic: Uuid::from_u128(2),
        };
        assert_eq!(
            err.to_string(),
            "characteristic 00000000-0000-0000-0000-000000000002 not found in service 00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn should_convert_parse_error() {
        let err: BleError = ParseError::MissingField("characteristic").into();
        assert!(matches!(err, BleError::Parse(ParseError::MissingField(_))));
    }

    #[test]
    fn should_display_invalid_uuid_length() {
        let err = ParseError::InvalidUuidLength(3);
        assert_eq!(
            err.to_string(),
            "invalid UUID length 3, expected 2, 4 or 16 bytes"
        );
    }
}
