//! Platform port: the native BLE stack seen as a tree of handles.
//!
//! A [`BlePlatform`] opens [`PlatformDevice`]s. Devices enumerate
//! [`PlatformService`]s, which enumerate [`PlatformCharacteristic`]s. Every
//! callback registration hands back a [`Registration`] guard that unregisters
//! when released or dropped.

use std::future::Future;
use std::sync::Arc;

use blecentral_domain::address::DeviceAddress;
use blecentral_domain::connection::{BleStatus, LinkStatus};
use blecentral_domain::error::PlatformError;
use blecentral_domain::gatt::{CccdValue, CharacteristicProperties, GattStatus, WriteKind};
use uuid::Uuid;

use crate::registration::Registration;

/// Invoked on an arbitrary thread with the characteristic that changed and
/// its new value.
pub type ValueChangedHandler<C> = Arc<dyn Fn(&C, Vec<u8>) + Send + Sync>;

/// Invoked on an arbitrary thread when the native link status changes.
pub type LinkStatusHandler = Arc<dyn Fn(DeviceAddress, LinkStatus) + Send + Sync>;

/// Entry point into the native BLE stack.
pub trait BlePlatform: Send + Sync + 'static {
    type Device: PlatformDevice;

    /// Current status of the local adapter.
    fn adapter_status(&self) -> impl Future<Output = BleStatus> + Send;

    /// Resolve and open the device with the given address.
    fn open_device(
        &self,
        address: DeviceAddress,
    ) -> impl Future<Output = Result<Self::Device, PlatformError>> + Send;
}

/// Open native device handle.
pub trait PlatformDevice: Send + Sync + 'static {
    type Service: PlatformService<Characteristic = Self::Characteristic>;
    type Characteristic: PlatformCharacteristic;

    fn address(&self) -> DeviceAddress;

    /// Enumerate the primary services. Each call is a native round trip.
    fn services(&self) -> impl Future<Output = Result<Vec<Self::Service>, GattStatus>> + Send;

    /// Register for native link status changes.
    fn on_link_status_changed(&self, handler: LinkStatusHandler) -> Registration;

    /// Close the native handle. Called once, after every registration on the
    /// device has been released.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Native service handle.
pub trait PlatformService: Clone + Send + Sync + 'static {
    type Characteristic: PlatformCharacteristic;

    fn uuid(&self) -> Uuid;

    /// Enumerate the services included by this one.
    fn included_services(&self) -> impl Future<Output = Result<Vec<Self>, GattStatus>> + Send;

    /// Enumerate the characteristics of this service.
    fn characteristics(
        &self,
    ) -> impl Future<Output = Result<Vec<Self::Characteristic>, GattStatus>> + Send;
}

/// Native characteristic handle.
///
/// A handle knows its owning service and device, so value callbacks can be
/// attributed without any lookup.
pub trait PlatformCharacteristic: Clone + Send + Sync + 'static {
    fn uuid(&self) -> Uuid;

    fn service_uuid(&self) -> Uuid;

    fn device_address(&self) -> DeviceAddress;

    fn properties(&self) -> CharacteristicProperties;

    fn read(&self) -> impl Future<Output = Result<Vec<u8>, GattStatus>> + Send;

    fn write(
        &self,
        value: &[u8],
        kind: WriteKind,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Write the client characteristic configuration descriptor.
    fn write_client_configuration(
        &self,
        value: CccdValue,
    ) -> impl Future<Output = Result<(), GattStatus>> + Send;

    /// Register for value changes. The handler receives this handle back as
    /// the sender.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] if the native stack cannot deliver values.
    fn on_value_changed(
        &self,
        handler: ValueChangedHandler<Self>,
    ) -> Result<Registration, PlatformError>;
}
