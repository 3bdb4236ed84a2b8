//! Turns native value-changed callbacks into published events.

use std::sync::Arc;

use blecentral_domain::address::CharacteristicAddress;
use blecentral_domain::error::BleError;
use blecentral_domain::event::{BleEvent, CharacteristicValueEvent};

use crate::ports::{BlePlatform, EventSink, PlatformCharacteristic, PlatformDevice, ValueChangedHandler};
use crate::services::connection_manager::{ConnectionManager, WeakConnectionManager};

type CharacteristicOf<P> = <<P as BlePlatform>::Device as PlatformDevice>::Characteristic;

/// Publishes a [`CharacteristicValueEvent`] for every value change.
///
/// Runs on whatever thread the native stack calls back on. It never blocks,
/// never panics, and only holds a weak reference to the manager.
pub struct NotificationDispatcher<P: BlePlatform, E> {
    manager: WeakConnectionManager<P, E>,
}

impl<P: BlePlatform, E> Clone for NotificationDispatcher<P, E> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<P: BlePlatform, E: EventSink> NotificationDispatcher<P, E> {
    #[must_use]
    pub fn new(manager: &ConnectionManager<P, E>) -> Self {
        Self {
            manager: manager.downgrade(),
        }
    }

    /// Handler to register on a characteristic.
    #[must_use]
    pub fn handler(&self) -> ValueChangedHandler<CharacteristicOf<P>> {
        let dispatcher = self.clone();
        Arc::new(move |sender: &CharacteristicOf<P>, value: Vec<u8>| {
            dispatcher.dispatch(sender, value);
        })
    }

    /// Publish one value change.
    ///
    /// The address is rebuilt from the sender's own handles. If the device is
    /// no longer connected the event carries [`BleError::NotConnected`]
    /// instead of the value.
    pub fn dispatch(&self, sender: &CharacteristicOf<P>, value: Vec<u8>) {
        let Some(manager) = self.manager.upgrade() else {
            tracing::debug!("connection manager gone, value dropped");
            return;
        };
        let events = manager.events();
        if !events.has_listeners() {
            tracing::debug!(
                characteristic = %sender.uuid(),
                "no event listener, value dropped"
            );
            return;
        }

        let characteristic = CharacteristicAddress::new(
            sender.device_address(),
            sender.service_uuid(),
            sender.uuid(),
        );
        let result = if manager.is_connected(characteristic.device) {
            Ok(value)
        } else {
            tracing::warn!(%characteristic, "value received after disconnect");
            Err(BleError::NotConnected(characteristic.device))
        };
        events.emit(BleEvent::CharacteristicValue(CharacteristicValueEvent {
            characteristic,
            result,
        }));
    }
}
