//! btleplug adapter error types and status mapping.

use blecentral_domain::error::PlatformError;
use blecentral_domain::gatt::GattStatus;

/// Status reported for btleplug failures with no GATT counterpart.
const UNMAPPED_STATUS: u8 = 0xFF;

/// Errors raised while setting up the adapter.
#[derive(Debug, thiserror::Error)]
pub enum BtleplugError {
    /// The host has no adapter at the configured index.
    #[error("no BLE adapter at index {index}")]
    NotAvailable {
        /// Configured index.
        index: usize,
    },

    /// btleplug failed to enumerate adapters or open the event stream.
    #[error("BLE adapter error")]
    Btleplug(#[from] btleplug::Error),
}

/// Map a btleplug failure to the GATT status the core understands.
#[must_use]
pub fn gatt_status(err: &btleplug::Error) -> GattStatus {
    match err {
        btleplug::Error::NotConnected
        | btleplug::Error::DeviceNotFound
        | btleplug::Error::TimedOut(_) => GattStatus::Unreachable,
        btleplug::Error::PermissionDenied => GattStatus::AccessDenied,
        btleplug::Error::UnexpectedCallback
        | btleplug::Error::UnexpectedCharacteristic
        | btleplug::Error::NoSuchCharacteristic => GattStatus::ProtocolError,
        _ => GattStatus::Unknown(UNMAPPED_STATUS),
    }
}

/// Map a failed write. Transport level faults keep their message.
#[must_use]
pub fn write_error(err: &btleplug::Error) -> PlatformError {
    match gatt_status(err) {
        GattStatus::Unknown(_) => PlatformError::Rejected(err.to_string()),
        status => PlatformError::Status(status),
    }
}
