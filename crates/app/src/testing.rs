//! In-memory platform for tests.
//!
//! [`FakePlatform`] serves devices described by [`FakeDeviceSpec`]s, records
//! every native call, and lets tests inject failures, push value changes and
//! simulate link loss.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use blecentral_domain::address::{DeviceAddress, SubscriptionKey};
use blecentral_domain::connection::{BleStatus, LinkStatus};
use blecentral_domain::error::PlatformError;
use blecentral_domain::gatt::{CccdValue, CharacteristicProperties, GattStatus, WriteKind};

use crate::ports::{
    BlePlatform, LinkStatusHandler, PlatformCharacteristic, PlatformDevice, PlatformService,
    ValueChangedHandler,
};
use crate::registration::Registration;

/// Characteristic exposed by a fake service.
#[derive(Debug, Clone)]
pub struct FakeCharacteristicSpec {
    uuid: Uuid,
    properties: CharacteristicProperties,
    value: Vec<u8>,
}

impl FakeCharacteristicSpec {
    #[must_use]
    pub fn new(uuid: Uuid, properties: CharacteristicProperties) -> Self {
        Self {
            uuid,
            properties,
            value: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }
}

/// Service exposed by a fake device.
#[derive(Debug, Clone)]
pub struct FakeServiceSpec {
    uuid: Uuid,
    included: Vec<FakeServiceSpec>,
    characteristics: Vec<FakeCharacteristicSpec>,
}

impl FakeServiceSpec {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            included: Vec::new(),
            characteristics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_characteristic(mut self, characteristic: FakeCharacteristicSpec) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    #[must_use]
    pub fn with_included(mut self, service: FakeServiceSpec) -> Self {
        self.included.push(service);
        self
    }
}

/// Device served by the fake platform.
#[derive(Debug, Clone)]
pub struct FakeDeviceSpec {
    address: DeviceAddress,
    services: Vec<FakeServiceSpec>,
}

impl FakeDeviceSpec {
    #[must_use]
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            services: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: FakeServiceSpec) -> Self {
        self.services.push(service);
        self
    }
}

type ValueKey = (DeviceAddress, SubscriptionKey);

struct ValueHandlerEntry {
    key: ValueKey,
    sender: FakeCharacteristic,
    handler: ValueChangedHandler<FakeCharacteristic>,
}

#[derive(Default)]
struct FakeState {
    status: BleStatus,
    devices: HashMap<DeviceAddress, FakeDeviceSpec>,
    open_failures: HashSet<DeviceAddress>,
    open_delay: Option<Duration>,
    service_failures: HashMap<DeviceAddress, GattStatus>,
    characteristic_failures: HashMap<(DeviceAddress, Uuid), GattStatus>,
    read_failures: HashMap<ValueKey, GattStatus>,
    write_failures: HashMap<ValueKey, PlatformError>,
    cccd_failures: HashMap<ValueKey, GattStatus>,
    registration_failures: HashSet<ValueKey>,
    lose_link_on_register: HashSet<DeviceAddress>,
    values: HashMap<ValueKey, Vec<u8>>,
    value_handlers: HashMap<u64, ValueHandlerEntry>,
    link_handlers: HashMap<u64, (DeviceAddress, LinkStatusHandler)>,
    next_registration: u64,
    opened: usize,
    closed: usize,
    service_enumerations: HashMap<DeviceAddress, usize>,
    characteristic_enumerations: HashMap<(DeviceAddress, Uuid), usize>,
    reads: usize,
    writes: Vec<(ValueKey, Vec<u8>, WriteKind)>,
    cccd_writes: Vec<(ValueKey, CccdValue)>,
    unregistrations: usize,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_registration += 1;
        self.next_registration
    }

    fn seed_values(&mut self, address: DeviceAddress, services: &[FakeServiceSpec]) {
        for service in services {
            for characteristic in &service.characteristics {
                let key = SubscriptionKey::new(service.uuid, characteristic.uuid);
                self.values
                    .insert((address, key), characteristic.value.clone());
            }
            self.seed_values(address, &service.included);
        }
    }
}

type SharedState = Arc<Mutex<FakeState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`BlePlatform`].
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: SharedState,
}

impl FakePlatform {
    #[must_use]
    pub fn new() -> Self {
        let platform = Self::default();
        platform.set_status(BleStatus::Ready);
        platform
    }

    #[must_use]
    pub fn with_device(self, device: FakeDeviceSpec) -> Self {
        {
            let mut state = lock(&self.state);
            state.seed_values(device.address, &device.services);
            state.devices.insert(device.address, device);
        }
        self
    }

    pub fn set_status(&self, status: BleStatus) {
        lock(&self.state).status = status;
    }

    pub fn fail_open(&self, address: DeviceAddress) {
        lock(&self.state).open_failures.insert(address);
    }

    /// Delay every `open_device` call, leaving room for a concurrent disconnect.
    pub fn set_open_delay(&self, delay: Duration) {
        lock(&self.state).open_delay = Some(delay);
    }

    pub fn fail_service_enumeration(&self, address: DeviceAddress, status: GattStatus) {
        lock(&self.state).service_failures.insert(address, status);
    }

    pub fn fail_characteristic_enumeration(
        &self,
        address: DeviceAddress,
        service: Uuid,
        status: GattStatus,
    ) {
        lock(&self.state)
            .characteristic_failures
            .insert((address, service), status);
    }

    pub fn fail_read(&self, address: DeviceAddress, key: SubscriptionKey, status: GattStatus) {
        lock(&self.state).read_failures.insert((address, key), status);
    }

    pub fn fail_write(&self, address: DeviceAddress, key: SubscriptionKey, error: PlatformError) {
        lock(&self.state).write_failures.insert((address, key), error);
    }

    pub fn fail_client_configuration(
        &self,
        address: DeviceAddress,
        key: SubscriptionKey,
        status: GattStatus,
    ) {
        lock(&self.state).cccd_failures.insert((address, key), status);
    }

    pub fn fail_value_registration(&self, address: DeviceAddress, key: SubscriptionKey) {
        lock(&self.state)
            .registration_failures
            .insert((address, key));
    }

    /// Report link loss as soon as a link-status handler registers for the
    /// device, i.e. while a connect is still completing.
    pub fn lose_link_on_register(&self, address: DeviceAddress) {
        lock(&self.state).lose_link_on_register.insert(address);
    }

    /// Push a value change to every registered handler for the
    /// characteristic. Returns how many handlers ran.
    pub fn notify(&self, address: DeviceAddress, key: SubscriptionKey, value: &[u8]) -> usize {
        let targets: Vec<_> = lock(&self.state)
            .value_handlers
            .values()
            .filter(|entry| entry.key == (address, key))
            .map(|entry| (entry.sender.clone(), Arc::clone(&entry.handler)))
            .collect();
        for (sender, handler) in &targets {
            handler(sender, value.to_vec());
        }
        targets.len()
    }

    /// Report link loss to every link-status handler of the device.
    pub fn disconnect(&self, address: DeviceAddress) -> usize {
        let targets: Vec<_> = lock(&self.state)
            .link_handlers
            .values()
            .filter(|(registered, _)| *registered == address)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &targets {
            handler(address, LinkStatus::Disconnected);
        }
        targets.len()
    }

    #[must_use]
    pub fn opened_devices(&self) -> usize {
        lock(&self.state).opened
    }

    #[must_use]
    pub fn closed_devices(&self) -> usize {
        lock(&self.state).closed
    }

    #[must_use]
    pub fn service_enumerations(&self, address: DeviceAddress) -> usize {
        lock(&self.state)
            .service_enumerations
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn characteristic_enumerations(&self, address: DeviceAddress, service: Uuid) -> usize {
        lock(&self.state)
            .characteristic_enumerations
            .get(&(address, service))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }

    #[must_use]
    pub fn writes(&self) -> Vec<(DeviceAddress, SubscriptionKey, Vec<u8>, WriteKind)> {
        lock(&self.state)
            .writes
            .iter()
            .map(|((address, key), value, kind)| (*address, *key, value.clone(), *kind))
            .collect()
    }

    #[must_use]
    pub fn client_configuration_writes(&self) -> Vec<(DeviceAddress, SubscriptionKey, CccdValue)> {
        lock(&self.state)
            .cccd_writes
            .iter()
            .map(|((address, key), value)| (*address, *key, *value))
            .collect()
    }

    #[must_use]
    pub fn active_value_registrations(&self) -> usize {
        lock(&self.state).value_handlers.len()
    }

    #[must_use]
    pub fn active_link_registrations(&self) -> usize {
        lock(&self.state).link_handlers.len()
    }

    #[must_use]
    pub fn unregistrations(&self) -> usize {
        lock(&self.state).unregistrations
    }

    /// Total number of calls that reached the native layer after a device
    /// was opened.
    #[must_use]
    pub fn native_calls(&self) -> usize {
        let state = lock(&self.state);
        state.service_enumerations.values().sum::<usize>()
            + state.characteristic_enumerations.values().sum::<usize>()
            + state.reads
            + state.writes.len()
            + state.cccd_writes.len()
    }

    fn try_open(&self, address: DeviceAddress) -> Result<FakeDevice, PlatformError> {
        let mut state = lock(&self.state);
        if state.open_failures.contains(&address) {
            return Err(PlatformError::DeviceUnavailable(format!(
                "device {address} refused the connection"
            )));
        }
        let Some(spec) = state.devices.get(&address).cloned() else {
            return Err(PlatformError::DeviceUnavailable(format!(
                "device {address} not found"
            )));
        };
        state.opened += 1;
        Ok(FakeDevice {
            spec,
            state: Arc::clone(&self.state),
        })
    }
}

impl BlePlatform for FakePlatform {
    type Device = FakeDevice;

    async fn adapter_status(&self) -> BleStatus {
        lock(&self.state).status
    }

    async fn open_device(&self, address: DeviceAddress) -> Result<FakeDevice, PlatformError> {
        let delay = lock(&self.state).open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.try_open(address)
    }
}

fn register(state: &SharedState, insert: impl FnOnce(&mut FakeState, u64)) -> Registration {
    let id = {
        let mut guard = lock(state);
        let id = guard.next_id();
        insert(&mut guard, id);
        id
    };
    let state = Arc::clone(state);
    Registration::new(move || {
        let mut guard = lock(&state);
        let removed =
            guard.value_handlers.remove(&id).is_some() || guard.link_handlers.remove(&id).is_some();
        if removed {
            guard.unregistrations += 1;
        }
    })
}

/// Device handle of the fake platform.
pub struct FakeDevice {
    spec: FakeDeviceSpec,
    state: SharedState,
}

impl FakeDevice {
    fn service(&self, spec: &FakeServiceSpec) -> FakeService {
        FakeService {
            address: self.spec.address,
            spec: spec.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn enumerate_services(&self) -> Result<Vec<FakeService>, GattStatus> {
        let mut state = lock(&self.state);
        *state
            .service_enumerations
            .entry(self.spec.address)
            .or_default() += 1;
        if let Some(status) = state.service_failures.get(&self.spec.address) {
            return Err(*status);
        }
        drop(state);
        Ok(self.spec.services.iter().map(|s| self.service(s)).collect())
    }
}

impl PlatformDevice for FakeDevice {
    type Service = FakeService;
    type Characteristic = FakeCharacteristic;

    fn address(&self) -> DeviceAddress {
        self.spec.address
    }

    async fn services(&self) -> Result<Vec<FakeService>, GattStatus> {
        let result = self.enumerate_services();
        tokio::task::yield_now().await;
        result
    }

    fn on_link_status_changed(&self, handler: LinkStatusHandler) -> Registration {
        let address = self.spec.address;
        let registered = Arc::clone(&handler);
        let registration = register(&self.state, |state, id| {
            state.link_handlers.insert(id, (address, registered));
        });
        let lose_link = lock(&self.state).lose_link_on_register.contains(&address);
        if lose_link {
            handler(address, LinkStatus::Disconnected);
        }
        registration
    }

    async fn close(&self) {
        lock(&self.state).closed += 1;
    }
}

/// Service handle of the fake platform.
#[derive(Clone)]
pub struct FakeService {
    address: DeviceAddress,
    spec: FakeServiceSpec,
    state: SharedState,
}

impl FakeService {
    fn enumerate_characteristics(&self) -> Result<Vec<FakeCharacteristic>, GattStatus> {
        let mut state = lock(&self.state);
        *state
            .characteristic_enumerations
            .entry((self.address, self.spec.uuid))
            .or_default() += 1;
        if let Some(status) = state
            .characteristic_failures
            .get(&(self.address, self.spec.uuid))
        {
            return Err(*status);
        }
        drop(state);
        Ok(self
            .spec
            .characteristics
            .iter()
            .map(|c| FakeCharacteristic {
                address: self.address,
                key: SubscriptionKey::new(self.spec.uuid, c.uuid),
                properties: c.properties,
                state: Arc::clone(&self.state),
            })
            .collect())
    }
}

impl PlatformService for FakeService {
    type Characteristic = FakeCharacteristic;

    fn uuid(&self) -> Uuid {
        self.spec.uuid
    }

    async fn included_services(&self) -> Result<Vec<FakeService>, GattStatus> {
        Ok(self
            .spec
            .included
            .iter()
            .map(|spec| FakeService {
                address: self.address,
                spec: spec.clone(),
                state: Arc::clone(&self.state),
            })
            .collect())
    }

    async fn characteristics(&self) -> Result<Vec<FakeCharacteristic>, GattStatus> {
        let result = self.enumerate_characteristics();
        tokio::task::yield_now().await;
        result
    }
}

/// Characteristic handle of the fake platform.
#[derive(Clone)]
pub struct FakeCharacteristic {
    address: DeviceAddress,
    key: SubscriptionKey,
    properties: CharacteristicProperties,
    state: SharedState,
}

impl FakeCharacteristic {
    fn value_key(&self) -> ValueKey {
        (self.address, self.key)
    }

    fn read_now(&self) -> Result<Vec<u8>, GattStatus> {
        let mut state = lock(&self.state);
        state.reads += 1;
        if let Some(status) = state.read_failures.get(&self.value_key()) {
            return Err(*status);
        }
        Ok(state
            .values
            .get(&self.value_key())
            .cloned()
            .unwrap_or_default())
    }

    fn write_now(&self, value: &[u8], kind: WriteKind) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        state.writes.push((self.value_key(), value.to_vec(), kind));
        if let Some(error) = state.write_failures.get(&self.value_key()) {
            return Err(error.clone());
        }
        state.values.insert(self.value_key(), value.to_vec());
        Ok(())
    }

    fn configure_now(&self, value: CccdValue) -> Result<(), GattStatus> {
        let mut state = lock(&self.state);
        state.cccd_writes.push((self.value_key(), value));
        match state.cccd_failures.get(&self.value_key()) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }
}

impl PlatformCharacteristic for FakeCharacteristic {
    fn uuid(&self) -> Uuid {
        self.key.characteristic
    }

    fn service_uuid(&self) -> Uuid {
        self.key.service
    }

    fn device_address(&self) -> DeviceAddress {
        self.address
    }

    fn properties(&self) -> CharacteristicProperties {
        self.properties
    }

    async fn read(&self) -> Result<Vec<u8>, GattStatus> {
        self.read_now()
    }

    async fn write(&self, value: &[u8], kind: WriteKind) -> Result<(), PlatformError> {
        self.write_now(value, kind)
    }

    async fn write_client_configuration(&self, value: CccdValue) -> Result<(), GattStatus> {
        self.configure_now(value)
    }

    fn on_value_changed(
        &self,
        handler: ValueChangedHandler<Self>,
    ) -> Result<Registration, PlatformError> {
        if lock(&self.state)
            .registration_failures
            .contains(&self.value_key())
        {
            return Err(PlatformError::Rejected(
                "value notifications unavailable".to_string(),
            ));
        }
        let entry = ValueHandlerEntry {
            key: self.value_key(),
            sender: self.clone(),
            handler,
        };
        Ok(register(&self.state, move |state, id| {
            state.value_handlers.insert(id, entry);
        }))
    }
}
