//! # blecentral-app
//!
//! Application layer: connection/GATT session management and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `BlePlatform` and its device/service/characteristic handles: the OS BLE stack
//!   - `EventSink`: where connection and value events are published
//! - Define **driving/inbound** use-case structs:
//!   - `ConnectionManager`: connect, disconnect, OS-reported disconnection
//!   - `GattExecutor`: read, write, subscribe, discover services
//!   - `NotificationDispatcher`: turn OS value callbacks into events
//! - Provide **in-process infrastructure** (event bus, registration guards)
//!   that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `blecentral-domain` only (plus `tokio::sync` for locks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod registration;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
