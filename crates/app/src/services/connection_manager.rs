//! Connection manager: the single owner of the address → agent map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use blecentral_domain::address::DeviceAddress;
use blecentral_domain::connection::{ConnectionState, LinkStatus};
use blecentral_domain::error::BleError;
use blecentral_domain::event::{BleEvent, ConnectionStateEvent};

use crate::ports::{BlePlatform, EventSink, LinkStatusHandler, PlatformDevice};
use crate::services::device_agent::DeviceAgent;

type Agent<P> = DeviceAgent<<P as BlePlatform>::Device>;

enum Slot<D: PlatformDevice> {
    /// A connect call with this attempt number is in flight.
    Connecting(u64),
    Connected(Arc<DeviceAgent<D>>),
}

struct Inner<P: BlePlatform, E> {
    platform: P,
    events: E,
    slots: Mutex<HashMap<DeviceAddress, Slot<P::Device>>>,
    next_attempt: AtomicU64,
}

impl<P: BlePlatform, E: EventSink> Inner<P, E> {
    fn slots(&self) -> MutexGuard<'_, HashMap<DeviceAddress, Slot<P::Device>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_state(&self, device: DeviceAddress, state: ConnectionState, failure: Option<BleError>) {
        let mut event = ConnectionStateEvent::new(device, state);
        event.failure = failure;
        self.events.emit(BleEvent::ConnectionState(event));
    }

    /// Drop the pending slot of `attempt`, if it is still there.
    fn remove_pending(&self, address: DeviceAddress, attempt: u64) {
        let mut slots = self.slots();
        if matches!(slots.get(&address), Some(Slot::Connecting(pending)) if *pending == attempt) {
            slots.remove(&address);
        }
    }

    /// Promote the pending slot of `attempt` to connected and publish the
    /// transition while the map is still locked.
    ///
    /// Fails if the attempt was cancelled or the agent lost its link in the
    /// meantime.
    fn install(
        &self,
        address: DeviceAddress,
        attempt: u64,
        agent: &Arc<Agent<P>>,
    ) -> Result<(), BleError> {
        let mut slots = self.slots();
        match slots.get(&address) {
            Some(Slot::Connecting(pending)) if *pending == attempt => {}
            _ => return Err(BleError::ConnectionAborted(address)),
        }
        if agent.is_closed() {
            slots.remove(&address);
            return Err(BleError::ConnectionFailed {
                device: address,
                reason: "link lost while connecting".to_string(),
            });
        }
        slots.insert(address, Slot::Connected(Arc::clone(agent)));
        // a link loss racing this call finds the agent in the map
        self.emit_state(address, ConnectionState::Connected, None);
        Ok(())
    }
}

/// Owns every device agent and drives the connection lifecycle.
///
/// State machine per address:
/// `disconnected → connecting → connected → disconnecting → disconnected`.
/// Each transition is published on the event sink.
pub struct ConnectionManager<P: BlePlatform, E> {
    inner: Arc<Inner<P, E>>,
}

impl<P: BlePlatform, E> Clone for ConnectionManager<P, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle held by native callbacks.
pub struct WeakConnectionManager<P: BlePlatform, E> {
    inner: Weak<Inner<P, E>>,
}

impl<P: BlePlatform, E> Clone for WeakConnectionManager<P, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<P: BlePlatform, E> WeakConnectionManager<P, E> {
    #[must_use]
    pub fn upgrade(&self) -> Option<ConnectionManager<P, E>> {
        self.inner.upgrade().map(|inner| ConnectionManager { inner })
    }
}

impl<P: BlePlatform, E: EventSink> ConnectionManager<P, E> {
    /// Create a manager over the given platform, publishing on `events`.
    pub fn new(platform: P, events: E) -> Self {
        Self {
            inner: Arc::new(Inner {
                platform,
                events,
                slots: Mutex::new(HashMap::new()),
                next_attempt: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakConnectionManager<P, E> {
        WeakConnectionManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn platform(&self) -> &P {
        &self.inner.platform
    }

    #[must_use]
    pub fn events(&self) -> &E {
        &self.inner.events
    }

    /// Connect to `address`.
    ///
    /// A call for an address that is already connecting or connected succeeds
    /// without doing anything.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::ConnectionFailed`] if the device cannot be opened,
    /// [`BleError::ServiceDiscovery`] if the initial enumeration fails, or
    /// [`BleError::ConnectionAborted`] if a disconnect cancelled the attempt.
    /// A link lost before the connection completes also yields
    /// [`BleError::ConnectionFailed`].
    #[tracing::instrument(skip(self), fields(device = %address))]
    pub async fn connect(&self, address: DeviceAddress) -> Result<(), BleError> {
        let attempt = self.inner.next_attempt.fetch_add(1, Ordering::Relaxed);
        {
            let mut slots = self.inner.slots();
            if slots.contains_key(&address) {
                tracing::debug!("already connecting or connected");
                return Ok(());
            }
            slots.insert(address, Slot::Connecting(attempt));
        }
        self.inner
            .emit_state(address, ConnectionState::Connecting, None);

        let agent = match self.establish(address).await {
            Ok(agent) => Arc::new(agent),
            Err(err) => {
                self.inner.remove_pending(address, attempt);
                tracing::warn!(error = %err, "connection failed");
                self.inner
                    .emit_state(address, ConnectionState::Disconnected, Some(err.clone()));
                return Err(err);
            }
        };

        let handler = self.link_status_handler(&agent);
        agent.set_link_registration(agent.device().on_link_status_changed(handler));

        if let Err(err) = self.inner.install(address, attempt, &agent) {
            agent.teardown().await;
            tracing::info!(error = %err, "connection dropped before completion");
            self.inner
                .emit_state(address, ConnectionState::Disconnected, Some(err.clone()));
            return Err(err);
        }

        tracing::info!("device connected");
        Ok(())
    }

    /// Disconnect from `address`.
    ///
    /// The agent leaves the map before teardown starts, so concurrent
    /// operations fail with [`BleError::NotConnected`]. Disconnecting a device
    /// that is still connecting cancels the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotConnected`] if the address is unknown. The map is
    /// left untouched in that case.
    #[tracing::instrument(skip(self), fields(device = %address))]
    pub async fn disconnect(&self, address: DeviceAddress) -> Result<(), BleError> {
        let slot = self
            .inner
            .slots()
            .remove(&address)
            .ok_or(BleError::NotConnected(address))?;
        self.inner
            .emit_state(address, ConnectionState::Disconnecting, None);

        match slot {
            Slot::Connecting(_) => {
                tracing::info!("pending connection cancelled");
            }
            Slot::Connected(agent) => {
                agent.teardown().await;
                tracing::info!("device disconnected");
                self.inner
                    .emit_state(address, ConnectionState::Disconnected, None);
            }
        }
        Ok(())
    }

    /// Disconnect every known device.
    pub async fn disconnect_all(&self) {
        let addresses: Vec<_> = self.inner.slots().keys().copied().collect();
        for address in addresses {
            if let Err(err) = self.disconnect(address).await {
                tracing::debug!(device = %address, error = %err, "already gone during shutdown");
            }
        }
    }

    /// Agent of a connected device.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotConnected`] unless the device is fully connected.
    pub fn agent(&self, address: DeviceAddress) -> Result<Arc<Agent<P>>, BleError> {
        match self.inner.slots().get(&address) {
            Some(Slot::Connected(agent)) => Ok(Arc::clone(agent)),
            _ => Err(BleError::NotConnected(address)),
        }
    }

    #[must_use]
    pub fn is_connected(&self, address: DeviceAddress) -> bool {
        matches!(self.inner.slots().get(&address), Some(Slot::Connected(_)))
    }

    #[must_use]
    pub fn connection_state(&self, address: DeviceAddress) -> ConnectionState {
        match self.inner.slots().get(&address) {
            Some(Slot::Connecting(_)) => ConnectionState::Connecting,
            Some(Slot::Connected(_)) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    #[must_use]
    pub fn connected_devices(&self) -> Vec<DeviceAddress> {
        let mut addresses: Vec<_> = self
            .inner
            .slots()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Connected(_)))
            .map(|(address, _)| *address)
            .collect();
        addresses.sort_unstable();
        addresses
    }

    async fn establish(&self, address: DeviceAddress) -> Result<Agent<P>, BleError> {
        let device = self
            .inner
            .platform
            .open_device(address)
            .await
            .map_err(|err| BleError::ConnectionFailed {
                device: address,
                reason: err.to_string(),
            })?;
        DeviceAgent::open(device).await
    }

    fn link_status_handler(&self, agent: &Arc<Agent<P>>) -> LinkStatusHandler {
        let manager = self.downgrade();
        let agent = Arc::downgrade(agent);
        let runtime = tokio::runtime::Handle::try_current().ok();
        Arc::new(move |address: DeviceAddress, status: LinkStatus| {
            if status != LinkStatus::Disconnected {
                return;
            }
            let (Some(manager), Some(agent)) = (manager.upgrade(), agent.upgrade()) else {
                return;
            };
            let Some(runtime) = runtime.as_ref() else {
                tracing::warn!(device = %address, "link lost outside a runtime, teardown skipped");
                return;
            };
            runtime.spawn(async move {
                manager.handle_link_lost(address, agent).await;
            });
        })
    }

    /// Tear down after the OS reported link loss.
    ///
    /// Only the agent that registered the callback is removed from the map; a
    /// newer connection for the same address is left alone.
    async fn handle_link_lost(&self, address: DeviceAddress, agent: Arc<Agent<P>>) {
        // closing first makes a concurrent install refuse this agent
        agent.teardown().await;
        let removed = {
            let mut slots = self.inner.slots();
            let current = matches!(
                slots.get(&address),
                Some(Slot::Connected(installed)) if Arc::ptr_eq(installed, &agent)
            );
            if current {
                slots.remove(&address);
            }
            current
        };
        if !removed {
            tracing::debug!(device = %address, "stale link status callback ignored");
            return;
        }
        tracing::warn!(device = %address, "link lost");
        self.inner
            .emit_state(address, ConnectionState::Disconnecting, None);
        self.inner
            .emit_state(address, ConnectionState::Disconnected, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::broadcast;
    use uuid::Uuid;

    use blecentral_domain::gatt::{CharacteristicProperties, GattStatus};

    use crate::event_bus::InProcessEventBus;
    use crate::testing::{FakeCharacteristicSpec, FakeDeviceSpec, FakePlatform, FakeServiceSpec};

    const ADDRESS: DeviceAddress = DeviceAddress::new(0xA1B2_C3D4_E5F6);
    const OTHER: DeviceAddress = DeviceAddress::new(0x0102_0304_0506);

    fn device(address: DeviceAddress) -> FakeDeviceSpec {
        FakeDeviceSpec::new(address).with_service(
            FakeServiceSpec::new(Uuid::from_u128(0x180D)).with_characteristic(
                FakeCharacteristicSpec::new(Uuid::from_u128(0x2A37), CharacteristicProperties::NOTIFY),
            ),
        )
    }

    fn setup() -> (
        FakePlatform,
        ConnectionManager<FakePlatform, InProcessEventBus>,
        broadcast::Receiver<BleEvent>,
    ) {
        let platform = FakePlatform::new()
            .with_device(device(ADDRESS))
            .with_device(device(OTHER));
        let bus = InProcessEventBus::new(64);
        let rx = bus.subscribe();
        let manager = ConnectionManager::new(platform.clone(), bus);
        (platform, manager, rx)
    }

    fn states(rx: &mut broadcast::Receiver<BleEvent>) -> Vec<(DeviceAddress, ConnectionState)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let BleEvent::ConnectionState(event) = event {
                out.push((event.device, event.state));
            }
        }
        out
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn should_connect_and_emit_states() {
        let (platform, manager, mut rx) = setup();

        manager.connect(ADDRESS).await.unwrap();

        assert!(manager.is_connected(ADDRESS));
        assert_eq!(manager.connected_devices(), vec![ADDRESS]);
        assert_eq!(platform.active_link_registrations(), 1);
        assert_eq!(
            states(&mut rx),
            vec![
                (ADDRESS, ConnectionState::Connecting),
                (ADDRESS, ConnectionState::Connected),
            ]
        );
    }

    #[tokio::test]
    async fn should_ignore_second_connect_for_connected_device() {
        let (platform, manager, _rx) = setup();

        manager.connect(ADDRESS).await.unwrap();
        manager.connect(ADDRESS).await.unwrap();

        assert_eq!(platform.opened_devices(), 1);
        assert_eq!(manager.connected_devices(), vec![ADDRESS]);
    }

    #[tokio::test]
    async fn should_create_single_agent_for_concurrent_connects() {
        let (platform, manager, _rx) = setup();
        platform.set_open_delay(Duration::from_millis(20));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect(ADDRESS).await }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect(ADDRESS).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        wait_until(|| manager.is_connected(ADDRESS)).await;
        assert_eq!(platform.opened_devices(), 1);
    }

    #[tokio::test]
    async fn should_report_connection_failure_without_agent() {
        let (platform, manager, mut rx) = setup();
        platform.fail_open(ADDRESS);

        let result = manager.connect(ADDRESS).await;

        assert!(matches!(result, Err(BleError::ConnectionFailed { device, .. }) if device == ADDRESS));
        assert!(!manager.is_connected(ADDRESS));
        assert_eq!(manager.connection_state(ADDRESS), ConnectionState::Disconnected);
        assert_eq!(
            states(&mut rx),
            vec![
                (ADDRESS, ConnectionState::Connecting),
                (ADDRESS, ConnectionState::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn should_fail_connect_when_initial_enumeration_fails() {
        let (platform, manager, _rx) = setup();
        platform.fail_service_enumeration(ADDRESS, GattStatus::ProtocolError);

        let result = manager.connect(ADDRESS).await;

        assert!(matches!(
            result,
            Err(BleError::ServiceDiscovery(GattStatus::ProtocolError))
        ));
        assert!(manager.agent(ADDRESS).is_err());
        assert_eq!(platform.closed_devices(), 1);
        assert_eq!(platform.active_link_registrations(), 0);
    }

    #[tokio::test]
    async fn should_reject_disconnect_of_unknown_device() {
        let (_platform, manager, mut rx) = setup();
        manager.connect(OTHER).await.unwrap();
        states(&mut rx);

        let result = manager.disconnect(ADDRESS).await;

        assert!(matches!(result, Err(BleError::NotConnected(address)) if address == ADDRESS));
        assert_eq!(manager.connected_devices(), vec![OTHER]);
        assert!(states(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn should_disconnect_and_release_registrations() {
        let (platform, manager, mut rx) = setup();
        manager.connect(ADDRESS).await.unwrap();
        states(&mut rx);

        manager.disconnect(ADDRESS).await.unwrap();

        assert!(!manager.is_connected(ADDRESS));
        assert_eq!(platform.active_link_registrations(), 0);
        assert_eq!(platform.closed_devices(), 1);
        assert_eq!(
            states(&mut rx),
            vec![
                (ADDRESS, ConnectionState::Disconnecting),
                (ADDRESS, ConnectionState::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn should_tear_down_when_link_is_lost() {
        let (platform, manager, mut rx) = setup();
        manager.connect(ADDRESS).await.unwrap();
        states(&mut rx);

        assert_eq!(platform.disconnect(ADDRESS), 1);
        let mut seen = Vec::new();
        wait_until(|| {
            seen.extend(states(&mut rx));
            seen.len() == 2
        })
        .await;

        assert_eq!(
            seen,
            vec![
                (ADDRESS, ConnectionState::Disconnecting),
                (ADDRESS, ConnectionState::Disconnected),
            ]
        );
        assert!(manager.agent(ADDRESS).is_err());
        assert_eq!(manager.connection_state(ADDRESS), ConnectionState::Disconnected);
        assert_eq!(platform.closed_devices(), 1);
        assert_eq!(platform.active_link_registrations(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_not_keep_agent_when_link_drops_during_connect() {
        for _ in 0..20 {
            let (platform, manager, mut rx) = setup();
            platform.lose_link_on_register(ADDRESS);

            let result = manager.connect(ADDRESS).await;
            assert!(
                matches!(result, Ok(()) | Err(BleError::ConnectionFailed { .. })),
                "unexpected result {result:?}"
            );
            let mut seen = Vec::new();
            wait_until(|| {
                seen.extend(states(&mut rx));
                seen.last() == Some(&(ADDRESS, ConnectionState::Disconnected))
                    && platform.closed_devices() == 1
            })
            .await;

            assert!(manager.agent(ADDRESS).is_err());
            assert_eq!(manager.connection_state(ADDRESS), ConnectionState::Disconnected);
            assert_eq!(platform.active_link_registrations(), 0);
        }
    }

    #[tokio::test]
    async fn should_ignore_link_loss_from_stale_agent() {
        let (_platform, manager, _rx) = setup();
        manager.connect(ADDRESS).await.unwrap();
        let stale = manager.agent(ADDRESS).unwrap();
        manager.disconnect(ADDRESS).await.unwrap();
        manager.connect(ADDRESS).await.unwrap();

        manager.handle_link_lost(ADDRESS, stale).await;

        assert!(manager.is_connected(ADDRESS));
        assert!(!manager.agent(ADDRESS).unwrap().is_closed());
    }

    #[tokio::test]
    async fn should_cancel_pending_connection_on_disconnect() {
        let (platform, manager, mut rx) = setup();
        platform.set_open_delay(Duration::from_millis(50));

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect(ADDRESS).await }
        });
        wait_until(|| manager.connection_state(ADDRESS) == ConnectionState::Connecting).await;
        manager.disconnect(ADDRESS).await.unwrap();

        let result = pending.await.unwrap();

        assert!(matches!(result, Err(BleError::ConnectionAborted(address)) if address == ADDRESS));
        assert!(!manager.is_connected(ADDRESS));
        assert_eq!(platform.closed_devices(), 1);
        assert_eq!(platform.active_link_registrations(), 0);
        assert_eq!(
            states(&mut rx).last(),
            Some(&(ADDRESS, ConnectionState::Disconnected))
        );
    }

    #[tokio::test]
    async fn should_disconnect_everything_on_shutdown() {
        let (platform, manager, _rx) = setup();
        manager.connect(ADDRESS).await.unwrap();
        manager.connect(OTHER).await.unwrap();

        manager.disconnect_all().await;

        assert!(manager.connected_devices().is_empty());
        assert_eq!(platform.closed_devices(), 2);
    }
}
