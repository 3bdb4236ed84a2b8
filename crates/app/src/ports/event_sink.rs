//! Event sink port: where connection and value events go.

use blecentral_domain::event::BleEvent;

/// Receives events published by the central stack.
///
/// Called from OS callback threads, so implementations must not block.
pub trait EventSink: Send + Sync + 'static {
    /// Whether anyone is currently listening.
    fn has_listeners(&self) -> bool;

    /// Publish an event. Returns `false` if it was dropped.
    fn emit(&self, event: BleEvent) -> bool;
}

impl<T: EventSink> EventSink for std::sync::Arc<T> {
    fn has_listeners(&self) -> bool {
        (**self).has_listeners()
    }

    fn emit(&self, event: BleEvent) -> bool {
        (**self).emit(event)
    }
}
