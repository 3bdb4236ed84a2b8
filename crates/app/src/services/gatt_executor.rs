//! GATT operations against connected devices.

use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use blecentral_domain::address::{CharacteristicAddress, DeviceAddress};
use blecentral_domain::error::{BleError, PlatformError};
use blecentral_domain::gatt::{
    CccdValue, DiscoveredCharacteristic, DiscoveredService, DiscoveredTopology, NotifyPolicy,
    WriteKind,
};

use crate::ports::{BlePlatform, EventSink, PlatformCharacteristic, PlatformDevice, PlatformService};
use crate::services::connection_manager::ConnectionManager;
use crate::services::device_agent::Subscription;
use crate::services::notification_dispatcher::NotificationDispatcher;

/// Bound on included-service nesting; guards against cyclic includes.
const MAX_INCLUDE_DEPTH: usize = 8;

type ServiceFuture<'a> = Pin<Box<dyn Future<Output = Result<DiscoveredService, BleError>> + Send + 'a>>;

/// Executes read, write, subscribe and discovery requests.
///
/// Every operation resolves the device through the [`ConnectionManager`]
/// first and fails with [`BleError::NotConnected`] before touching the native
/// stack if there is no agent.
pub struct GattExecutor<P: BlePlatform, E> {
    manager: ConnectionManager<P, E>,
    dispatcher: NotificationDispatcher<P, E>,
    policy: NotifyPolicy,
}

impl<P: BlePlatform, E> Clone for GattExecutor<P, E> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            dispatcher: self.dispatcher.clone(),
            policy: self.policy,
        }
    }
}

impl<P: BlePlatform, E: EventSink> GattExecutor<P, E> {
    #[must_use]
    pub fn new(manager: ConnectionManager<P, E>, policy: NotifyPolicy) -> Self {
        let dispatcher = NotificationDispatcher::new(&manager);
        Self {
            manager,
            dispatcher,
            policy,
        }
    }

    #[must_use]
    pub fn manager(&self) -> &ConnectionManager<P, E> {
        &self.manager
    }

    /// Read the current value of a characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotConnected`], a lookup error from the agent, or
    /// the error matching the native read status.
    #[tracing::instrument(skip(self), fields(characteristic = %address))]
    pub async fn read(&self, address: &CharacteristicAddress) -> Result<Vec<u8>, BleError> {
        let agent = self.manager.agent(address.device)?;
        let characteristic = agent
            .get_characteristic(address.service, address.characteristic)
            .await?;
        let value = characteristic
            .read()
            .await
            .map_err(BleError::from_status)?;
        agent.ensure_open()?;
        tracing::debug!(len = value.len(), "characteristic read");
        Ok(value)
    }

    /// Write a value, returning the written address on success.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotConnected`], a lookup error, the error matching
    /// a non-success status, or [`BleError::WriteFailed`] if the transport
    /// rejected the write.
    #[tracing::instrument(skip(self, value), fields(characteristic = %address, len = value.len()))]
    pub async fn write(
        &self,
        address: &CharacteristicAddress,
        value: &[u8],
        with_response: bool,
    ) -> Result<CharacteristicAddress, BleError> {
        let agent = self.manager.agent(address.device)?;
        let characteristic = agent
            .get_characteristic(address.service, address.characteristic)
            .await?;
        characteristic
            .write(value, WriteKind::from_with_response(with_response))
            .await
            .map_err(|err| match err {
                PlatformError::Status(status) => BleError::from_status(status),
                PlatformError::Rejected(reason) | PlatformError::DeviceUnavailable(reason) => {
                    BleError::WriteFailed(reason)
                }
            })?;
        agent.ensure_open()?;
        tracing::debug!("characteristic written");
        Ok(*address)
    }

    /// Enable or disable value updates for a characteristic.
    ///
    /// The subscription lock of the device is held across the configuration
    /// write, so the subscription table always mirrors live registrations.
    /// Enabling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotNotifiable`] when enabling a characteristic with
    /// neither notify nor indicate, [`BleError::NotSubscribed`] when disabling
    /// an unknown subscription, [`BleError::UnknownGatt`] when the platform
    /// refuses the value callback, or the error matching a failed
    /// configuration write. Either failure leaves the subscription table
    /// unchanged.
    #[tracing::instrument(skip(self), fields(characteristic = %address))]
    pub async fn set_notify(
        &self,
        address: &CharacteristicAddress,
        enable: bool,
    ) -> Result<(), BleError> {
        let agent = self.manager.agent(address.device)?;
        let characteristic = agent
            .get_characteristic(address.service, address.characteristic)
            .await?;
        let key = address.key();

        let mut subscriptions = agent.subscriptions().await;
        agent.ensure_open()?;

        if enable {
            if subscriptions.contains(&key) {
                tracing::debug!("already subscribed");
                return Ok(());
            }
            let value = self
                .policy
                .select(characteristic.properties())
                .ok_or(BleError::NotNotifiable(key))?;
            let registration = characteristic
                .on_value_changed(self.dispatcher.handler())
                .map_err(|err| {
                    tracing::warn!(error = %err, "value registration refused");
                    BleError::UnknownGatt
                })?;
            // dropping the registration on a failed write unregisters it
            characteristic
                .write_client_configuration(value)
                .await
                .map_err(BleError::from_status)?;
            subscriptions.add(key, Subscription::new(characteristic, registration));
            tracing::info!(mode = ?value, "subscribed");
        } else {
            if !subscriptions.contains(&key) {
                return Err(BleError::NotSubscribed(key));
            }
            characteristic
                .write_client_configuration(CccdValue::None)
                .await
                .map_err(BleError::from_status)?;
            subscriptions.remove(&key)?.release();
            tracing::info!("unsubscribed");
        }
        Ok(())
    }

    /// Walk the device's GATT topology.
    ///
    /// Services are enumerated natively on every call; the result is a fresh
    /// snapshot and does not touch the agent's caches.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotConnected`] or [`BleError::ServiceDiscovery`] if
    /// any enumeration fails.
    #[tracing::instrument(skip(self), fields(device = %device))]
    pub async fn discover_services(
        &self,
        device: DeviceAddress,
    ) -> Result<DiscoveredTopology, BleError> {
        let agent = self.manager.agent(device)?;
        let services = agent
            .device()
            .services()
            .await
            .map_err(BleError::ServiceDiscovery)?;

        let mut discovered = Vec::with_capacity(services.len());
        for service in &services {
            discovered.push(describe_service(service, 0).await?);
        }
        agent.ensure_open()?;

        tracing::debug!(services = discovered.len(), "services discovered");
        Ok(DiscoveredTopology {
            device,
            services: discovered,
        })
    }
}

fn describe_service<S: PlatformService>(service: &S, depth: usize) -> ServiceFuture<'_> {
    Box::pin(async move {
        let uuid: Uuid = service.uuid();
        let included_services = if depth < MAX_INCLUDE_DEPTH {
            let included = service
                .included_services()
                .await
                .map_err(BleError::ServiceDiscovery)?;
            let mut described = Vec::with_capacity(included.len());
            for child in &included {
                described.push(describe_service(child, depth + 1).await?);
            }
            described
        } else {
            tracing::warn!(service = %uuid, "included service nesting too deep, truncated");
            Vec::new()
        };

        let characteristics = service
            .characteristics()
            .await
            .map_err(BleError::ServiceDiscovery)?
            .iter()
            .map(|characteristic| {
                DiscoveredCharacteristic::from_properties(
                    characteristic.uuid(),
                    uuid,
                    characteristic.properties(),
                )
            })
            .collect();

        Ok(DiscoveredService {
            uuid,
            included_services,
            characteristics,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::broadcast;

    use blecentral_domain::address::SubscriptionKey;
    use blecentral_domain::event::BleEvent;
    use blecentral_domain::gatt::{CharacteristicProperties, GattStatus};

    use crate::event_bus::InProcessEventBus;
    use crate::testing::{FakeCharacteristicSpec, FakeDeviceSpec, FakePlatform, FakeServiceSpec};

    const ADDRESS: DeviceAddress = DeviceAddress::new(0x00AA_BBCC_DDEE);
    const HEART_RATE: Uuid = Uuid::from_u128(0x0000_180D_0000_1000_8000_0080_5F9B_34FB);
    const MEASUREMENT: Uuid = Uuid::from_u128(0x0000_2A37_0000_1000_8000_0080_5F9B_34FB);
    const CONTROL_POINT: Uuid = Uuid::from_u128(0x0000_2A39_0000_1000_8000_0080_5F9B_34FB);
    const BATTERY: Uuid = Uuid::from_u128(0x0000_180F_0000_1000_8000_0080_5F9B_34FB);
    const LEVEL: Uuid = Uuid::from_u128(0x0000_2A19_0000_1000_8000_0080_5F9B_34FB);
    const INCLUDED: Uuid = Uuid::from_u128(0x0000_FEE0_0000_1000_8000_0080_5F9B_34FB);

    type Executor = GattExecutor<FakePlatform, InProcessEventBus>;

    fn platform() -> FakePlatform {
        FakePlatform::new().with_device(
            FakeDeviceSpec::new(ADDRESS)
                .with_service(
                    FakeServiceSpec::new(HEART_RATE)
                        .with_characteristic(FakeCharacteristicSpec::new(
                            MEASUREMENT,
                            CharacteristicProperties::NOTIFY | CharacteristicProperties::INDICATE,
                        ))
                        .with_characteristic(FakeCharacteristicSpec::new(
                            CONTROL_POINT,
                            CharacteristicProperties::WRITE,
                        ))
                        .with_included(FakeServiceSpec::new(INCLUDED).with_characteristic(
                            FakeCharacteristicSpec::new(LEVEL, CharacteristicProperties::READ),
                        )),
                )
                .with_service(FakeServiceSpec::new(BATTERY).with_characteristic(
                    FakeCharacteristicSpec::new(
                        LEVEL,
                        CharacteristicProperties::READ | CharacteristicProperties::NOTIFY,
                    )
                    .with_value([87]),
                )),
        )
    }

    async fn connected(
        policy: NotifyPolicy,
    ) -> (FakePlatform, Executor, broadcast::Receiver<BleEvent>) {
        let platform = platform();
        let bus = InProcessEventBus::new(64);
        let rx = bus.subscribe();
        let manager = ConnectionManager::new(platform.clone(), bus);
        manager.connect(ADDRESS).await.unwrap();
        (platform, GattExecutor::new(manager, policy), rx)
    }

    fn address(service: Uuid, characteristic: Uuid) -> CharacteristicAddress {
        CharacteristicAddress::new(ADDRESS, service, characteristic)
    }

    async fn next_value(rx: &mut broadcast::Receiver<BleEvent>) -> (CharacteristicAddress, Result<Vec<u8>, BleError>) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let BleEvent::CharacteristicValue(event) = event {
                return (event.characteristic, event.result);
            }
        }
    }

    #[tokio::test]
    async fn should_fail_fast_for_unknown_device() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let calls = platform.native_calls();
        let unknown = CharacteristicAddress::new(DeviceAddress::new(1), BATTERY, LEVEL);

        assert_eq!(
            executor.read(&unknown).await,
            Err(BleError::NotConnected(DeviceAddress::new(1)))
        );
        assert!(matches!(
            executor.write(&unknown, &[1], true).await,
            Err(BleError::NotConnected(_))
        ));
        assert!(matches!(
            executor.set_notify(&unknown, true).await,
            Err(BleError::NotConnected(_))
        ));
        assert!(matches!(
            executor.discover_services(DeviceAddress::new(1)).await,
            Err(BleError::NotConnected(_))
        ));
        assert_eq!(platform.native_calls(), calls);
    }

    #[tokio::test]
    async fn should_read_value() {
        let (_platform, executor, _rx) = connected(NotifyPolicy::default()).await;

        let value = executor.read(&address(BATTERY, LEVEL)).await.unwrap();

        assert_eq!(value, vec![87]);
    }

    #[tokio::test]
    async fn should_map_read_statuses() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let key = SubscriptionKey::new(BATTERY, LEVEL);
        let cases = [
            (GattStatus::Unreachable, BleError::Unreachable),
            (GattStatus::ProtocolError, BleError::ProtocolError),
            (GattStatus::AccessDenied, BleError::AccessDenied),
            (GattStatus::Unknown(42), BleError::UnknownGatt),
        ];

        for (status, expected) in cases {
            platform.fail_read(ADDRESS, key, status);
            assert_eq!(executor.read(&address(BATTERY, LEVEL)).await, Err(expected));
        }
    }

    #[tokio::test]
    async fn should_report_missing_characteristic() {
        let (_platform, executor, _rx) = connected(NotifyPolicy::default()).await;

        let result = executor.read(&address(BATTERY, MEASUREMENT)).await;

        assert_eq!(
            result,
            Err(BleError::CharacteristicNotFound {
                service: BATTERY,
                characteristic: MEASUREMENT,
            })
        );
    }

    #[tokio::test]
    async fn should_write_and_echo_address() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, CONTROL_POINT);

        let echoed = executor.write(&target, &[0x01], false).await.unwrap();

        assert_eq!(echoed, target);
        assert_eq!(
            platform.writes(),
            vec![(ADDRESS, target.key(), vec![0x01], WriteKind::WithoutResponse)]
        );
    }

    #[tokio::test]
    async fn should_normalize_rejected_write() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, CONTROL_POINT);
        platform.fail_write(
            ADDRESS,
            target.key(),
            PlatformError::Rejected("value too long".to_string()),
        );

        let result = executor.write(&target, &[0; 600], true).await;

        assert_eq!(result, Err(BleError::WriteFailed("value too long".to_string())));
    }

    #[tokio::test]
    async fn should_map_write_status() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, CONTROL_POINT);
        platform.fail_write(
            ADDRESS,
            target.key(),
            PlatformError::Status(GattStatus::AccessDenied),
        );

        let result = executor.write(&target, &[1], true).await;

        assert_eq!(result, Err(BleError::AccessDenied));
    }

    #[tokio::test]
    async fn should_subscribe_and_deliver_values() {
        let (platform, executor, mut rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);

        executor.set_notify(&target, true).await.unwrap();
        assert_eq!(platform.notify(ADDRESS, target.key(), &[0x06, 0x48]), 1);

        let (characteristic, result) = next_value(&mut rx).await;
        assert_eq!(characteristic, target);
        assert_eq!(result, Ok(vec![0x06, 0x48]));
    }

    #[tokio::test]
    async fn should_prefer_indicate_by_default() {
        let (platform, executor, _rx) = connected(NotifyPolicy::PreferIndicate).await;
        let target = address(HEART_RATE, MEASUREMENT);

        executor.set_notify(&target, true).await.unwrap();

        assert_eq!(
            platform.client_configuration_writes(),
            vec![(ADDRESS, target.key(), CccdValue::Indicate)]
        );
    }

    #[tokio::test]
    async fn should_honour_notify_policy() {
        let (platform, executor, _rx) = connected(NotifyPolicy::PreferNotify).await;
        let target = address(HEART_RATE, MEASUREMENT);

        executor.set_notify(&target, true).await.unwrap();

        assert_eq!(
            platform.client_configuration_writes(),
            vec![(ADDRESS, target.key(), CccdValue::Notify)]
        );
    }

    #[tokio::test]
    async fn should_not_register_twice_when_enabling_again() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);

        executor.set_notify(&target, true).await.unwrap();
        executor.set_notify(&target, true).await.unwrap();

        assert_eq!(platform.active_value_registrations(), 1);
        assert_eq!(platform.client_configuration_writes().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_subscription_without_notify_or_indicate() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, CONTROL_POINT);

        let result = executor.set_notify(&target, true).await;

        assert_eq!(result, Err(BleError::NotNotifiable(target.key())));
        assert!(platform.client_configuration_writes().is_empty());
        assert_eq!(platform.active_value_registrations(), 0);
    }

    #[tokio::test]
    async fn should_leave_table_untouched_when_configuration_write_fails() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);
        platform.fail_client_configuration(ADDRESS, target.key(), GattStatus::AccessDenied);

        let result = executor.set_notify(&target, true).await;

        assert_eq!(result, Err(BleError::AccessDenied));
        assert_eq!(platform.active_value_registrations(), 0);
        let agent = executor.manager().agent(ADDRESS).unwrap();
        assert!(agent.subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn should_leave_table_untouched_when_registration_fails() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);
        platform.fail_value_registration(ADDRESS, target.key());

        let result = executor.set_notify(&target, true).await;

        assert_eq!(result, Err(BleError::UnknownGatt));
        assert!(platform.client_configuration_writes().is_empty());
        assert_eq!(platform.active_value_registrations(), 0);
        let agent = executor.manager().agent(ADDRESS).unwrap();
        assert!(agent.subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn should_keep_subscription_when_disable_write_fails() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);
        executor.set_notify(&target, true).await.unwrap();
        platform.fail_client_configuration(ADDRESS, target.key(), GattStatus::Unreachable);

        let result = executor.set_notify(&target, false).await;

        assert_eq!(result, Err(BleError::Unreachable));
        assert_eq!(platform.active_value_registrations(), 1);
    }

    #[tokio::test]
    async fn should_unsubscribe_and_release_registration() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);
        executor.set_notify(&target, true).await.unwrap();

        executor.set_notify(&target, false).await.unwrap();

        assert_eq!(platform.active_value_registrations(), 0);
        assert_eq!(platform.unregistrations(), 1);
        let agent = executor.manager().agent(ADDRESS).unwrap();
        assert!(agent.subscriptions().await.is_empty());
        assert_eq!(
            platform.client_configuration_writes().last(),
            Some(&(ADDRESS, target.key(), CccdValue::None))
        );
    }

    #[tokio::test]
    async fn should_report_not_subscribed_when_disabling_unknown_key() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);

        let result = executor.set_notify(&target, false).await;

        assert_eq!(result, Err(BleError::NotSubscribed(target.key())));
        assert!(platform.client_configuration_writes().is_empty());
    }

    #[tokio::test]
    async fn should_keep_subscriptions_apart_across_services() {
        let (platform, executor, mut rx) = connected(NotifyPolicy::default()).await;
        let battery = address(BATTERY, LEVEL);

        executor.set_notify(&battery, true).await.unwrap();
        let included_level = SubscriptionKey::new(INCLUDED, LEVEL);

        assert_eq!(platform.notify(ADDRESS, included_level, &[1]), 0);
        assert_eq!(platform.notify(ADDRESS, battery.key(), &[2]), 1);
        let (characteristic, result) = next_value(&mut rx).await;
        assert_eq!(characteristic, battery);
        assert_eq!(result, Ok(vec![2]));
    }

    #[tokio::test]
    async fn should_discover_topology_with_included_services() {
        let (_platform, executor, _rx) = connected(NotifyPolicy::default()).await;

        let topology = executor.discover_services(ADDRESS).await.unwrap();

        assert_eq!(topology.device, ADDRESS);
        assert_eq!(topology.services.len(), 2);
        let heart_rate = &topology.services[0];
        assert_eq!(heart_rate.uuid, HEART_RATE);
        assert_eq!(heart_rate.included_services.len(), 1);
        assert_eq!(heart_rate.included_services[0].uuid, INCLUDED);
        let measurement = &heart_rate.characteristics[0];
        assert_eq!(measurement.uuid, MEASUREMENT);
        assert_eq!(measurement.service, HEART_RATE);
        assert!(measurement.is_notifiable);
        assert!(measurement.is_indicatable);
        assert!(!measurement.is_readable);
        let control_point = &heart_rate.characteristics[1];
        assert!(control_point.is_writable_with_response);
        assert!(!control_point.is_writable_without_response);
    }

    #[tokio::test]
    async fn should_enumerate_natively_on_every_discovery() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;

        executor.discover_services(ADDRESS).await.unwrap();
        executor.discover_services(ADDRESS).await.unwrap();

        assert_eq!(platform.service_enumerations(ADDRESS), 3);
    }

    #[tokio::test]
    async fn should_report_discovery_failure() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        platform.fail_characteristic_enumeration(ADDRESS, BATTERY, GattStatus::ProtocolError);

        let result = executor.discover_services(ADDRESS).await;

        assert_eq!(
            result,
            Err(BleError::ServiceDiscovery(GattStatus::ProtocolError))
        );
    }

    // After disconnect no registration survives to publish a late value.
    #[tokio::test]
    async fn should_release_subscriptions_on_disconnect() {
        let (platform, executor, mut rx) = connected(NotifyPolicy::default()).await;
        let target = address(HEART_RATE, MEASUREMENT);
        executor.set_notify(&target, true).await.unwrap();

        executor.manager().disconnect(ADDRESS).await.unwrap();

        assert_eq!(platform.active_value_registrations(), 0);
        assert_eq!(platform.active_link_registrations(), 0);
        assert_eq!(platform.notify(ADDRESS, target.key(), &[1]), 0);
        assert_eq!(
            executor.read(&target).await,
            Err(BleError::NotConnected(ADDRESS))
        );
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, BleEvent::CharacteristicValue(_)));
        }
    }

    // Losing the link releases every subscription of the device.
    #[tokio::test]
    async fn should_release_subscriptions_when_link_is_lost() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        executor
            .set_notify(&address(HEART_RATE, MEASUREMENT), true)
            .await
            .unwrap();
        executor.set_notify(&address(BATTERY, LEVEL), true).await.unwrap();

        platform.disconnect(ADDRESS);
        for _ in 0..200 {
            if platform.closed_devices() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(platform.active_value_registrations(), 0);
        assert_eq!(platform.unregistrations(), 3);
        assert!(!executor.manager().is_connected(ADDRESS));
    }

    // Concurrent reads of an uncached service share one enumeration.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_enumerate_once_for_concurrent_reads() {
        let (platform, executor, _rx) = connected(NotifyPolicy::default()).await;
        let target = address(BATTERY, LEVEL);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let executor = executor.clone();
                tokio::spawn(async move { executor.read(&target).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), vec![87]);
        }

        assert_eq!(platform.characteristic_enumerations(ADDRESS, BATTERY), 1);
    }
}
