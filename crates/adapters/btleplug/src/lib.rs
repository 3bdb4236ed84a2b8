//! # blecentral-adapter-btleplug
//!
//! Platform adapter backed by [`btleplug`]. Implements the platform port of
//! `blecentral-app` on top of the host Bluetooth stack (`BlueZ`, `CoreBluetooth`
//! or `WinRT`).
//!
//! ## How it works
//!
//! One adapter is selected by index. A background task watches the central
//! event stream and routes connect and disconnect events to the link
//! handlers registered by open devices. Opening a device looks the address up
//! among known peripherals, scanning briefly if the adapter has not seen it
//! yet, then connects.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `blecentral-app` and
//! `blecentral-domain`.

mod config;
mod error;
mod handles;
mod link;

pub use config::BtleplugConfig;
pub use error::BtleplugError;
pub use handles::{BtleplugCharacteristic, BtleplugDevice, BtleplugService};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use btleplug::api::{BDAddr, Central, CentralState, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::task::JoinHandle;

use blecentral_app::ports::BlePlatform;
use blecentral_domain::address::DeviceAddress;
use blecentral_domain::connection::BleStatus;
use blecentral_domain::error::PlatformError;

use crate::link::LinkHandlers;

/// Delay between peripheral list polls while scanning for an address.
const LOOKUP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Host Bluetooth stack as a [`BlePlatform`].
pub struct BtleplugPlatform {
    adapter: Adapter,
    lookup_timeout: Duration,
    link_handlers: Arc<Mutex<LinkHandlers>>,
    watcher: JoinHandle<()>,
}

impl BtleplugPlatform {
    /// Select the configured adapter and start watching its events.
    ///
    /// # Errors
    ///
    /// Returns [`BtleplugError::NotAvailable`] if there is no adapter at the
    /// configured index, or [`BtleplugError::Btleplug`] if the host stack
    /// cannot be queried.
    pub async fn new(config: &BtleplugConfig) -> Result<Self, BtleplugError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BtleplugError::NotAvailable {
                index: config.adapter_index,
            })?;

        let events = adapter.events().await?;
        let link_handlers = Arc::new(Mutex::new(LinkHandlers::default()));
        let watcher = tokio::spawn(link::watch_central(
            events,
            Arc::downgrade(&link_handlers),
        ));

        match adapter.adapter_info().await {
            Ok(info) => tracing::info!(adapter = %info, "BLE adapter selected"),
            Err(err) => tracing::warn!(%err, "BLE adapter selected, info unavailable"),
        }

        Ok(Self {
            adapter,
            lookup_timeout: config.lookup_timeout(),
            link_handlers,
            watcher,
        })
    }

    async fn known_peripheral(&self, address: BDAddr) -> Result<Option<Peripheral>, PlatformError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|err| PlatformError::DeviceUnavailable(err.to_string()))?;
        Ok(peripherals
            .into_iter()
            .find(|peripheral| peripheral.address() == address))
    }

    async fn find_peripheral(&self, address: DeviceAddress) -> Result<Peripheral, PlatformError> {
        let target = BDAddr::from(address.to_mac_bytes());
        if let Some(peripheral) = self.known_peripheral(target).await? {
            return Ok(peripheral);
        }

        tracing::debug!(device = %address, mac = %target, "address unknown, scanning");
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|err| PlatformError::DeviceUnavailable(err.to_string()))?;

        let deadline = tokio::time::Instant::now() + self.lookup_timeout;
        let found = loop {
            if let Some(peripheral) = self.known_peripheral(target).await? {
                break Some(peripheral);
            }
            if tokio::time::Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(LOOKUP_POLL_INTERVAL).await;
        };

        if let Err(err) = self.adapter.stop_scan().await {
            tracing::warn!(%err, "failed to stop lookup scan");
        }

        found.ok_or_else(|| PlatformError::DeviceUnavailable(format!("device {target} not found")))
    }
}

impl Drop for BtleplugPlatform {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

impl BlePlatform for BtleplugPlatform {
    type Device = BtleplugDevice;

    async fn adapter_status(&self) -> BleStatus {
        match self.adapter.adapter_state().await {
            Ok(CentralState::PoweredOn) => BleStatus::Ready,
            Ok(CentralState::PoweredOff) => BleStatus::PoweredOff,
            Ok(_) => BleStatus::Unknown,
            Err(btleplug::Error::PermissionDenied) => BleStatus::Unauthorized,
            Err(btleplug::Error::NotSupported(_)) => BleStatus::Unsupported,
            Err(err) => {
                tracing::warn!(%err, "unable to query adapter state");
                BleStatus::Unknown
            }
        }
    }

    #[tracing::instrument(skip(self), fields(device = %address))]
    async fn open_device(&self, address: DeviceAddress) -> Result<BtleplugDevice, PlatformError> {
        let peripheral = self.find_peripheral(address).await?;

        let connected = peripheral.is_connected().await.unwrap_or(false);
        if !connected {
            peripheral
                .connect()
                .await
                .map_err(|err| PlatformError::DeviceUnavailable(err.to_string()))?;
        }
        tracing::debug!("peripheral connected");

        Ok(BtleplugDevice::new(
            peripheral,
            address,
            Arc::clone(&self.link_handlers),
        ))
    }
}
