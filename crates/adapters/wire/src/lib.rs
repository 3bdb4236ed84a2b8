//! # blecentral-adapter-wire
//!
//! Host-facing side of the central stack: protobuf messages, length-prefixed
//! framing and the method dispatcher.
//!
//! ## Methods
//!
//! | Method | Argument | Success payload |
//! |--------|----------|-----------------|
//! | `initialize` | none | empty |
//! | `deinitialize` | none | empty |
//! | `connect` | `ConnectRequest` | empty |
//! | `disconnect` | `DisconnectRequest` | empty |
//! | `readCharacteristic` | `ReadRequest` | `CharacteristicValue` |
//! | `writeCharacteristic` | `WriteRequest` | `WriteAck` |
//! | `setNotify` | `NotifyRequest` | empty |
//! | `discoverServices` | `DiscoverServicesRequest` | `DiscoveredTopology` |
//! | `bleStatus` | none | `BleStatusInfo` |
//!
//! Events go out on two channels: `connectedDevice` carries
//! `ConnectionStateEvent`, `charUpdate` carries `CharacteristicValue`.
//!
//! ## Framing
//!
//! `[u32 length, big-endian][u8 protocol version][HostFrame]`, where a
//! `HostFrame` is a method call, a method result or a channel event.
//! [`bridge::serve`] runs the whole exchange over any byte stream.
//!
//! ## Dependency rule
//!
//! Depends on `blecentral-app` and `blecentral-domain`, never on a platform
//! adapter.

pub mod bridge;
pub mod codec;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod messages;

pub use codec::FrameCodec;
pub use dispatcher::{MethodOutcome, Request, RequestDispatcher};
pub use error::WireError;
