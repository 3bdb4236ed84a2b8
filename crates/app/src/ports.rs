//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod event_sink;
pub mod platform;

pub use event_sink::EventSink;
pub use platform::{
    BlePlatform, LinkStatusHandler, PlatformCharacteristic, PlatformDevice, PlatformService,
    ValueChangedHandler,
};
