//! Per-device session state: handle caches and the subscription table.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use blecentral_domain::address::{DeviceAddress, SubscriptionKey};
use blecentral_domain::error::BleError;

use crate::ports::{PlatformCharacteristic, PlatformDevice, PlatformService};
use crate::registration::Registration;

/// One live value-changed registration and the characteristic it belongs to.
pub struct Subscription<C> {
    characteristic: C,
    registration: Registration,
}

impl<C> Subscription<C> {
    pub fn new(characteristic: C, registration: Registration) -> Self {
        Self {
            characteristic,
            registration,
        }
    }

    pub fn characteristic(&self) -> &C {
        &self.characteristic
    }

    /// Unregister the value-changed callback.
    pub fn release(self) {
        self.registration.release();
    }
}

/// Subscriptions of one device, keyed by `(service, characteristic)`.
///
/// Every entry owns exactly one live registration. Removing or replacing an
/// entry releases it.
pub struct SubscriptionTable<C> {
    entries: HashMap<SubscriptionKey, Subscription<C>>,
}

impl<C> SubscriptionTable<C> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record a subscription, releasing any previous one under the same key.
    pub fn add(&mut self, key: SubscriptionKey, subscription: Subscription<C>) {
        if let Some(previous) = self.entries.insert(key, subscription) {
            previous.release();
        }
    }

    /// Remove the subscription for `key` without releasing it.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotSubscribed`] if no subscription exists.
    pub fn remove(&mut self, key: &SubscriptionKey) -> Result<Subscription<C>, BleError> {
        self.entries
            .remove(key)
            .ok_or(BleError::NotSubscribed(*key))
    }

    #[must_use]
    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubscriptionKey> {
        self.entries.keys()
    }

    /// Release every subscription. Returns how many were released.
    fn release_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, subscription) in self.entries.drain() {
            subscription.release();
        }
        count
    }
}

struct GattCache<S, C> {
    /// `None` until the device's services have been enumerated.
    services: Option<HashMap<Uuid, S>>,
    characteristics: HashMap<SubscriptionKey, C>,
    /// Services whose characteristics have been enumerated.
    enumerated: HashSet<Uuid>,
}

impl<S, C> GattCache<S, C> {
    fn new() -> Self {
        Self {
            services: None,
            characteristics: HashMap::new(),
            enumerated: HashSet::new(),
        }
    }

    fn clear(&mut self) {
        self.services = None;
        self.characteristics.clear();
        self.enumerated.clear();
    }
}

/// Owns everything tied to one connected device.
///
/// The agent holds the native handle, the link-status registration, the
/// service and characteristic caches and the subscription table. Once
/// [`teardown`](Self::teardown) starts, every operation fails with
/// [`BleError::NotConnected`].
pub struct DeviceAgent<D: PlatformDevice> {
    device: D,
    closed: AtomicBool,
    link_registration: StdMutex<Option<Registration>>,
    cache: Mutex<GattCache<D::Service, D::Characteristic>>,
    subscriptions: Mutex<SubscriptionTable<D::Characteristic>>,
}

impl<D: PlatformDevice> DeviceAgent<D> {
    /// Take ownership of an open device and run the initial service
    /// enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::ServiceDiscovery`] if the enumeration fails. The
    /// device is closed before returning.
    pub async fn open(device: D) -> Result<Self, BleError> {
        let agent = Self {
            device,
            closed: AtomicBool::new(false),
            link_registration: StdMutex::new(None),
            cache: Mutex::new(GattCache::new()),
            subscriptions: Mutex::new(SubscriptionTable::new()),
        };
        let loaded = {
            let mut cache = agent.cache.lock().await;
            agent.load_services(&mut cache).await
        };
        if let Err(err) = loaded {
            agent.teardown().await;
            return Err(err);
        }
        Ok(agent)
    }

    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        self.device.address()
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns [`BleError::NotConnected`] once teardown has started.
    pub fn ensure_open(&self) -> Result<(), BleError> {
        if self.is_closed() {
            Err(BleError::NotConnected(self.address()))
        } else {
            Ok(())
        }
    }

    /// Attach the link-status registration. Released immediately if the
    /// agent is already torn down.
    pub fn set_link_registration(&self, registration: Registration) {
        if self.is_closed() {
            registration.release();
            return;
        }
        let previous = self
            .link_registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(registration);
        drop(previous);
        // teardown may have run between the check and the store
        if self.is_closed() {
            self.release_link_registration();
        }
    }

    /// Return the cached service handle, enumerating services on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::ServiceDiscovery`] if enumeration fails,
    /// [`BleError::ServiceNotFound`] if the device has no such service, or
    /// [`BleError::NotConnected`] after teardown.
    pub async fn get_service(&self, uuid: Uuid) -> Result<D::Service, BleError> {
        let mut cache = self.cache.lock().await;
        self.ensure_open()?;
        self.cached_service(&mut cache, uuid).await
    }

    /// Return the cached characteristic handle, enumerating the owning
    /// service's characteristics on first use.
    ///
    /// The cache lock is held across enumeration, so concurrent callers for
    /// the same unseen service share a single native enumeration.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get_service`](Self::get_service) plus
    /// [`BleError::CharacteristicNotFound`].
    pub async fn get_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<D::Characteristic, BleError> {
        let key = SubscriptionKey::new(service, characteristic);
        let mut cache = self.cache.lock().await;
        self.ensure_open()?;

        if let Some(found) = cache.characteristics.get(&key) {
            return Ok(found.clone());
        }

        if !cache.enumerated.contains(&service) {
            let handle = self.cached_service(&mut cache, service).await?;
            let characteristics = handle
                .characteristics()
                .await
                .map_err(BleError::ServiceDiscovery)?;
            tracing::debug!(
                device = %self.address(),
                %service,
                count = characteristics.len(),
                "characteristics enumerated"
            );
            for found in characteristics {
                cache
                    .characteristics
                    .insert(SubscriptionKey::new(service, found.uuid()), found);
            }
            cache.enumerated.insert(service);
        }

        cache
            .characteristics
            .get(&key)
            .cloned()
            .ok_or(BleError::CharacteristicNotFound {
                service,
                characteristic,
            })
    }

    /// Lock the subscription table.
    ///
    /// Holding the guard serializes subscription changes on this device.
    pub async fn subscriptions(&self) -> MutexGuard<'_, SubscriptionTable<D::Characteristic>> {
        self.subscriptions.lock().await
    }

    /// Release every registration, drop the caches and close the device.
    ///
    /// Idempotent: returns `false` if teardown already ran.
    pub async fn teardown(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.release_link_registration();

        let released = self.subscriptions.lock().await.release_all();
        self.cache.lock().await.clear();
        self.device.close().await;

        tracing::info!(device = %self.address(), released, "device agent torn down");
        true
    }

    fn release_link_registration(&self) {
        let registration = self
            .link_registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(registration) = registration {
            registration.release();
        }
    }

    async fn load_services(
        &self,
        cache: &mut GattCache<D::Service, D::Characteristic>,
    ) -> Result<(), BleError> {
        if cache.services.is_some() {
            return Ok(());
        }
        let services = self
            .device
            .services()
            .await
            .map_err(BleError::ServiceDiscovery)?;
        tracing::debug!(
            device = %self.address(),
            count = services.len(),
            "services enumerated"
        );
        cache.services = Some(
            services
                .into_iter()
                .map(|service| (service.uuid(), service))
                .collect(),
        );
        Ok(())
    }

    async fn cached_service(
        &self,
        cache: &mut GattCache<D::Service, D::Characteristic>,
        uuid: Uuid,
    ) -> Result<D::Service, BleError> {
        self.load_services(cache).await?;
        cache
            .services
            .as_ref()
            .and_then(|services| services.get(&uuid))
            .cloned()
            .ok_or(BleError::ServiceNotFound(uuid))
    }
}
