//! Routing of central connection events to per-device link handlers.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError, Weak};

use btleplug::api::CentralEvent;
use btleplug::platform::PeripheralId;
use tokio_stream::{Stream, StreamExt as _};

use blecentral_app::ports::LinkStatusHandler;
use blecentral_domain::address::DeviceAddress;
use blecentral_domain::connection::LinkStatus;

/// Registered link handlers keyed by registration id.
pub struct LinkHandlers<K = PeripheralId> {
    next_id: u64,
    handlers: HashMap<u64, (K, DeviceAddress, LinkStatusHandler)>,
}

impl<K> Default for LinkHandlers<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: HashMap::new(),
        }
    }
}

impl<K: PartialEq + Clone> LinkHandlers<K> {
    pub fn insert(&mut self, peripheral: K, address: DeviceAddress, handler: LinkStatusHandler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.insert(id, (peripheral, address, handler));
        id
    }

    pub fn remove(&mut self, id: u64) {
        self.handlers.remove(&id);
    }

    /// Handlers registered for a peripheral, cloned so they can run unlocked.
    #[must_use]
    pub fn matching(&self, peripheral: &K) -> Vec<(DeviceAddress, LinkStatusHandler)> {
        self.handlers
            .values()
            .filter(|(key, _, _)| key == peripheral)
            .map(|(_, address, handler)| (*address, handler.clone()))
            .collect()
    }
}

/// Deliver `status` to every handler registered for `peripheral`.
pub fn notify<K: PartialEq + Clone>(
    handlers: &Mutex<LinkHandlers<K>>,
    peripheral: &K,
    status: LinkStatus,
) -> usize {
    let matching = handlers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .matching(peripheral);
    for (address, handler) in &matching {
        handler(*address, status);
    }
    matching.len()
}

pub type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Forward connect and disconnect events until the stream ends or the
/// platform is dropped.
pub async fn watch_central(mut events: CentralEvents, handlers: Weak<Mutex<LinkHandlers>>) {
    while let Some(event) = events.next().await {
        let (peripheral, status) = match event {
            CentralEvent::DeviceConnected(id) => (id, LinkStatus::Connected),
            CentralEvent::DeviceDisconnected(id) => (id, LinkStatus::Disconnected),
            _ => continue,
        };
        let Some(handlers) = handlers.upgrade() else {
            break;
        };
        let delivered = notify(&handlers, &peripheral, status);
        tracing::debug!(?peripheral, ?status, delivered, "link status changed");
    }
    tracing::debug!("central event stream ended");
}
