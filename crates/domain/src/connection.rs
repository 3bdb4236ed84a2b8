//! Connection lifecycle and adapter status.

use std::fmt;

/// Lifecycle state of a device connection as reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Link status pushed by the native stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Status of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BleStatus {
    #[default]
    Unknown,
    Unsupported,
    Unauthorized,
    PoweredOff,
    LocationServicesDisabled,
    Ready,
}

impl BleStatus {
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}
