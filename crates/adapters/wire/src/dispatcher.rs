//! Method dispatch between host calls and the GATT executor.
//!
//! Arguments are decoded synchronously so malformed calls are answered
//! before any work is started. Events published on the bus are forwarded to
//! the host once `initialize` attached a listener.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use blecentral_app::event_bus::InProcessEventBus;
use blecentral_app::ports::BlePlatform;
use blecentral_app::services::gatt_executor::GattExecutor;
use blecentral_domain::address::{CharacteristicAddress, DeviceAddress};
use blecentral_domain::error::BleError;
use blecentral_domain::event::BleEvent;

use crate::codec::{self, FrameCodec};
use crate::convert;
use crate::error::WireError;
use crate::messages::{self, ChannelEvent, GenericFailure, MethodResult, Outcome};

pub const CONNECTED_DEVICE_CHANNEL: &str = "connectedDevice";
pub const CHAR_UPDATE_CHANNEL: &str = "charUpdate";

/// Decoded host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Initialize,
    Deinitialize,
    Connect(DeviceAddress),
    Disconnect(DeviceAddress),
    Read(CharacteristicAddress),
    Write {
        address: CharacteristicAddress,
        value: Vec<u8>,
        with_response: bool,
    },
    SetNotify {
        address: CharacteristicAddress,
        enable: bool,
    },
    DiscoverServices(DeviceAddress),
    BleStatus,
}

impl Request {
    /// Decode the arguments of a call. Unknown methods yield `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if the arguments are oversized, do not decode,
    /// or carry invalid ids.
    pub fn decode(method: &str, arguments: &[u8]) -> Result<Option<Self>, WireError> {
        let request = match method {
            "initialize" => Self::Initialize,
            "deinitialize" => Self::Deinitialize,
            "bleStatus" => Self::BleStatus,
            "connect" => {
                let message: messages::ConnectRequest = codec::decode(arguments)?;
                Self::Connect(convert::device_id_from_wire(&message.device_id)?)
            }
            "disconnect" => {
                let message: messages::DisconnectRequest = codec::decode(arguments)?;
                Self::Disconnect(convert::device_id_from_wire(&message.device_id)?)
            }
            "readCharacteristic" => {
                let message: messages::ReadRequest = codec::decode(arguments)?;
                Self::Read(convert::address_from_wire(message.characteristic.as_ref())?)
            }
            "writeCharacteristic" => {
                let message: messages::WriteRequest = codec::decode(arguments)?;
                Self::Write {
                    address: convert::address_from_wire(message.characteristic.as_ref())?,
                    value: message.value,
                    with_response: message.with_response,
                }
            }
            "setNotify" => {
                let message: messages::NotifyRequest = codec::decode(arguments)?;
                Self::SetNotify {
                    address: convert::address_from_wire(message.characteristic.as_ref())?,
                    enable: message.enable,
                }
            }
            "discoverServices" => {
                let message: messages::DiscoverServicesRequest = codec::decode(arguments)?;
                Self::DiscoverServices(convert::device_id_from_wire(&message.device_id)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(request))
    }
}

/// Result of a host call before it is tied to a call id.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    Success(Vec<u8>),
    Failure(GenericFailure),
    NotImplemented,
}

impl MethodOutcome {
    #[must_use]
    pub fn empty() -> Self {
        Self::Success(Vec::new())
    }

    #[must_use]
    pub fn failure(error: &BleError) -> Self {
        Self::Failure(convert::failure_to_wire(error))
    }

    fn encoded<M: prost::Message>(message: &M, limit: usize) -> Self {
        match codec::encode_with_limit(message, limit) {
            Ok(bytes) => Self::Success(bytes),
            Err(err) => {
                tracing::warn!(error = %err, "unable to encode reply");
                Self::failure(&err.into_serialization())
            }
        }
    }

    fn from_result(result: Result<(), BleError>) -> Self {
        match result {
            Ok(()) => Self::empty(),
            Err(err) => Self::failure(&err),
        }
    }

    #[must_use]
    pub fn into_result(self, call_id: u32) -> MethodResult {
        let outcome = match self {
            Self::Success(bytes) => Outcome::Success(bytes),
            Self::Failure(failure) => Outcome::Failure(failure),
            Self::NotImplemented => Outcome::NotImplemented(true),
        };
        MethodResult {
            call_id,
            outcome: Some(outcome),
        }
    }
}

/// Encode a published event for its host channel.
///
/// A value whose payload exceeds `limit` is replaced by a serialization
/// failure for the same characteristic, so the host still learns about the
/// update.
///
/// # Errors
///
/// Returns [`WireError`] if even the replacement cannot be encoded.
pub fn encode_event(event: &BleEvent, limit: usize) -> Result<ChannelEvent, WireError> {
    match event {
        BleEvent::ConnectionState(event) => Ok(ChannelEvent {
            channel: CONNECTED_DEVICE_CHANNEL.to_string(),
            payload: codec::encode_with_limit(&convert::connection_event_to_wire(event), limit)?,
        }),
        BleEvent::CharacteristicValue(event) => {
            let value = convert::value_event_to_wire(event);
            let payload = match codec::encode_with_limit(&value, limit) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(characteristic = %event.characteristic, error = %err, "value too large for the wire");
                    let failure = Err(err.into_serialization());
                    let replacement = convert::value_to_wire(&event.characteristic, &failure);
                    codec::encode_with_limit(&replacement, limit)?
                }
            };
            Ok(ChannelEvent {
                channel: CHAR_UPDATE_CHANNEL.to_string(),
                payload,
            })
        }
    }
}

/// Routes decoded host calls to the executor and forwards events back.
pub struct RequestDispatcher<P: BlePlatform> {
    executor: GattExecutor<P, InProcessEventBus>,
    bus: InProcessEventBus,
    outbound: mpsc::Sender<ChannelEvent>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    payload_limit: usize,
}

impl<P: BlePlatform> RequestDispatcher<P> {
    /// `outbound` receives every forwarded event in publication order.
    #[must_use]
    pub fn new(
        executor: GattExecutor<P, InProcessEventBus>,
        bus: InProcessEventBus,
        outbound: mpsc::Sender<ChannelEvent>,
    ) -> Self {
        Self {
            executor,
            bus,
            outbound,
            forwarder: Mutex::new(None),
            payload_limit: FrameCodec::default().payload_limit(),
        }
    }

    /// Cap encoded reply and event payloads, usually at
    /// [`FrameCodec::payload_limit`] of the codec serving the host.
    #[must_use]
    pub fn with_payload_limit(mut self, limit: usize) -> Self {
        self.payload_limit = limit;
        self
    }

    #[must_use]
    pub fn executor(&self) -> &GattExecutor<P, InProcessEventBus> {
        &self.executor
    }

    /// Whether events are currently forwarded to the host.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start forwarding events. Attaching twice keeps the first forwarder.
    ///
    /// The bus subscription is taken before returning, so every event
    /// published afterwards reaches the host.
    pub fn attach(&self) {
        let mut forwarder = self.forwarder.lock().unwrap_or_else(PoisonError::into_inner);
        if forwarder.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let receiver = self.bus.subscribe();
        let outbound = self.outbound.clone();
        *forwarder = Some(tokio::spawn(forward_events(
            receiver,
            outbound,
            self.payload_limit,
        )));
        tracing::debug!("event forwarder attached");
    }

    /// Stop forwarding events. Events published afterwards are dropped.
    pub fn detach(&self) {
        let handle = self
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("event forwarder detached");
        }
    }

    /// Decode and run a host call.
    pub async fn call(&self, method: &str, arguments: &[u8]) -> MethodOutcome {
        match Request::decode(method, arguments) {
            Ok(Some(request)) => self.handle(request).await,
            Ok(None) => {
                tracing::debug!(method, "method not implemented");
                MethodOutcome::NotImplemented
            }
            Err(err) => {
                tracing::debug!(method, error = %err, "rejecting malformed call");
                MethodOutcome::failure(&err.into_parse())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, request: Request) -> MethodOutcome {
        match request {
            Request::Initialize => {
                self.attach();
                MethodOutcome::empty()
            }
            Request::Deinitialize => {
                self.detach();
                MethodOutcome::empty()
            }
            Request::Connect(device) => {
                MethodOutcome::from_result(self.executor.manager().connect(device).await)
            }
            Request::Disconnect(device) => {
                MethodOutcome::from_result(self.executor.manager().disconnect(device).await)
            }
            Request::Read(address) => {
                let result = self.executor.read(&address).await;
                MethodOutcome::encoded(&convert::value_to_wire(&address, &result), self.payload_limit)
            }
            Request::Write {
                address,
                value,
                with_response,
            } => {
                let failure = self
                    .executor
                    .write(&address, &value, with_response)
                    .await
                    .err();
                let ack = convert::write_ack_to_wire(&address, failure.as_ref());
                MethodOutcome::encoded(&ack, self.payload_limit)
            }
            Request::SetNotify { address, enable } => {
                MethodOutcome::from_result(self.executor.set_notify(&address, enable).await)
            }
            Request::DiscoverServices(device) => {
                match self.executor.discover_services(device).await {
                    Ok(topology) => MethodOutcome::encoded(
                        &convert::topology_to_wire(&topology),
                        self.payload_limit,
                    ),
                    Err(err) => MethodOutcome::failure(&err),
                }
            }
            Request::BleStatus => {
                let status = self.executor.manager().platform().adapter_status().await;
                MethodOutcome::encoded(&convert::ble_status_to_wire(status), self.payload_limit)
            }
        }
    }
}

impl<P: BlePlatform> Drop for RequestDispatcher<P> {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn forward_events(
    mut receiver: broadcast::Receiver<BleEvent>,
    outbound: mpsc::Sender<ChannelEvent>,
    limit: usize,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => match encode_event(&event, limit) {
                Ok(message) => {
                    if outbound.send(message).await.is_err() {
                        tracing::debug!("host channel closed, stopping forwarder");
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(device = %event.device(), error = %err, "unable to encode event");
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event forwarder lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
