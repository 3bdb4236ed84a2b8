//! Events published by the central stack.
//!
//! Each event carries either a result or the failure that replaced it, so
//! consumers see one message per outcome.

use crate::address::{CharacteristicAddress, DeviceAddress};
use crate::connection::ConnectionState;
use crate::error::BleError;

/// Connection state transition for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateEvent {
    pub device: DeviceAddress,
    pub state: ConnectionState,
    /// Set when the transition was caused by a failure.
    pub failure: Option<BleError>,
}

impl ConnectionStateEvent {
    #[must_use]
    pub const fn new(device: DeviceAddress, state: ConnectionState) -> Self {
        Self {
            device,
            state,
            failure: None,
        }
    }

    #[must_use]
    pub fn with_failure(mut self, failure: BleError) -> Self {
        self.failure = Some(failure);
        self
    }
}

/// Value update for a subscribed characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicValueEvent {
    pub characteristic: CharacteristicAddress,
    pub result: Result<Vec<u8>, BleError>,
}

/// Everything the stack publishes on its event sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    ConnectionState(ConnectionStateEvent),
    CharacteristicValue(CharacteristicValueEvent),
}

impl BleEvent {
    /// Address of the device the event concerns.
    #[must_use]
    pub const fn device(&self) -> DeviceAddress {
        match self {
            Self::ConnectionState(event) => event.device,
            Self::CharacteristicValue(event) => event.characteristic.device,
        }
    }
}
