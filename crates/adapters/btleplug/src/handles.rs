//! Device, service and characteristic handles over a btleplug peripheral.

use std::sync::{Arc, Mutex, PoisonError};

use btleplug::api::{Characteristic, Peripheral as _, Service, WriteType};
use btleplug::platform::Peripheral;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use blecentral_app::ports::{
    LinkStatusHandler, PlatformCharacteristic, PlatformDevice, PlatformService,
    ValueChangedHandler,
};
use blecentral_app::registration::Registration;
use blecentral_domain::address::DeviceAddress;
use blecentral_domain::error::PlatformError;
use blecentral_domain::gatt::{CccdValue, CharacteristicProperties, GattStatus, WriteKind};

use crate::error::{gatt_status, write_error};
use crate::link::LinkHandlers;

/// Connected peripheral.
pub struct BtleplugDevice {
    peripheral: Peripheral,
    address: DeviceAddress,
    link_handlers: Arc<Mutex<LinkHandlers>>,
}

impl BtleplugDevice {
    pub(crate) fn new(
        peripheral: Peripheral,
        address: DeviceAddress,
        link_handlers: Arc<Mutex<LinkHandlers>>,
    ) -> Self {
        Self {
            peripheral,
            address,
            link_handlers,
        }
    }
}

impl PlatformDevice for BtleplugDevice {
    type Service = BtleplugService;
    type Characteristic = BtleplugCharacteristic;

    fn address(&self) -> DeviceAddress {
        self.address
    }

    async fn services(&self) -> Result<Vec<BtleplugService>, GattStatus> {
        self.peripheral.discover_services().await.map_err(|err| {
            tracing::warn!(device = %self.address, %err, "service discovery failed");
            gatt_status(&err)
        })?;
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .map(|service| BtleplugService {
                peripheral: self.peripheral.clone(),
                address: self.address,
                service,
            })
            .collect())
    }

    fn on_link_status_changed(&self, handler: LinkStatusHandler) -> Registration {
        let id = self
            .link_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.peripheral.id(), self.address, handler);
        let handlers = Arc::downgrade(&self.link_handlers);
        Registration::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                handlers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(id);
            }
        })
    }

    async fn close(&self) {
        if let Err(err) = self.peripheral.disconnect().await {
            tracing::warn!(device = %self.address, %err, "failed to disconnect peripheral");
        }
    }
}

/// Primary service of a connected peripheral.
#[derive(Clone)]
pub struct BtleplugService {
    peripheral: Peripheral,
    address: DeviceAddress,
    service: Service,
}

impl PlatformService for BtleplugService {
    type Characteristic = BtleplugCharacteristic;

    fn uuid(&self) -> Uuid {
        self.service.uuid
    }

    // btleplug flattens included services into the primary list.
    async fn included_services(&self) -> Result<Vec<Self>, GattStatus> {
        Ok(Vec::new())
    }

    async fn characteristics(&self) -> Result<Vec<BtleplugCharacteristic>, GattStatus> {
        Ok(self
            .service
            .characteristics
            .iter()
            .map(|characteristic| BtleplugCharacteristic {
                peripheral: self.peripheral.clone(),
                address: self.address,
                characteristic: characteristic.clone(),
            })
            .collect())
    }
}

/// Characteristic of a connected peripheral.
#[derive(Clone)]
pub struct BtleplugCharacteristic {
    peripheral: Peripheral,
    address: DeviceAddress,
    characteristic: Characteristic,
}

impl PlatformCharacteristic for BtleplugCharacteristic {
    fn uuid(&self) -> Uuid {
        self.characteristic.uuid
    }

    fn service_uuid(&self) -> Uuid {
        self.characteristic.service_uuid
    }

    fn device_address(&self) -> DeviceAddress {
        self.address
    }

    fn properties(&self) -> CharacteristicProperties {
        CharacteristicProperties::from_bits(self.characteristic.properties.bits())
    }

    async fn read(&self) -> Result<Vec<u8>, GattStatus> {
        self.peripheral
            .read(&self.characteristic)
            .await
            .map_err(|err| gatt_status(&err))
    }

    async fn write(&self, value: &[u8], kind: WriteKind) -> Result<(), PlatformError> {
        let write_type = match kind {
            WriteKind::WithResponse => WriteType::WithResponse,
            WriteKind::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(&self.characteristic, value, write_type)
            .await
            .map_err(|err| write_error(&err))
    }

    /// btleplug picks notify or indicate itself when subscribing, so both
    /// non-empty values map to a subscription.
    async fn write_client_configuration(&self, value: CccdValue) -> Result<(), GattStatus> {
        let result = match value {
            CccdValue::None => self.peripheral.unsubscribe(&self.characteristic).await,
            CccdValue::Notify | CccdValue::Indicate => {
                self.peripheral.subscribe(&self.characteristic).await
            }
        };
        result.map_err(|err| gatt_status(&err))
    }

    fn on_value_changed(
        &self,
        handler: ValueChangedHandler<Self>,
    ) -> Result<Registration, PlatformError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PlatformError::Rejected("no tokio runtime to watch notifications".to_string())
        })?;
        let sender = self.clone();
        let task = runtime.spawn(async move {
            let mut notifications = match sender.peripheral.notifications().await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(device = %sender.address, %err, "unable to open notification stream");
                    return;
                }
            };
            // notifications carry the characteristic uuid only, not its service
            while let Some(notification) = notifications.next().await {
                if notification.uuid == sender.characteristic.uuid {
                    handler(&sender, notification.value);
                }
            }
        });
        Ok(Registration::new(move || task.abort()))
    }
}
