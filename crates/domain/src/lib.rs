//! # blecentral-domain
//!
//! Pure domain model for the blecentral BLE central stack.
//!
//! ## Responsibilities
//! - Identify things: device addresses, characteristic addresses, subscription keys
//! - Convert UUIDs between their wire, string and native forms
//! - Describe GATT topology (services, characteristics, capability flags)
//! - Describe connection lifecycle and adapter status
//! - Define the events published to the outside world
//! - Define the error taxonomy every layer reports through
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod address;
pub mod connection;
pub mod error;
pub mod event;
pub mod gatt;
pub mod uuid_codec;
