//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use blecentral_domain::event::BleEvent;

use crate::ports::EventSink;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Emitting with no active subscriber drops the event.
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<BleEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BleEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for InProcessEventBus {
    fn has_listeners(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    fn emit(&self, event: BleEvent) -> bool {
        match self.sender.send(event) {
            Ok(_) => true,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(device = %event.device(), "no event listener, event dropped");
                false
            }
        }
    }
}
