//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod connection_manager;
pub mod device_agent;
pub mod gatt_executor;
pub mod notification_dispatcher;
