//! Protobuf messages exchanged with the host.
//!
//! Field numbers are part of the wire contract; never renumber.

use prost::{Enumeration, Message, Oneof};

#[derive(Clone, PartialEq, Message)]
pub struct Uuid {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CharacteristicAddress {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(message, optional, tag = "2")]
    pub service_uuid: Option<Uuid>,
    #[prost(message, optional, tag = "3")]
    pub characteristic_uuid: Option<Uuid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum FailureCode {
    Unknown = 0,
    NotConnected = 1,
    ServiceDiscovery = 2,
    ServiceNotFound = 3,
    CharacteristicNotFound = 4,
    Unreachable = 5,
    ProtocolError = 6,
    AccessDenied = 7,
    UnknownGatt = 8,
    WriteFailed = 9,
    NotSubscribed = 10,
    NotNotifiable = 11,
    ConnectionFailed = 12,
    ConnectionAborted = 13,
    Serialization = 14,
    Parse = 15,
}

#[derive(Clone, PartialEq, Message)]
pub struct GenericFailure {
    #[prost(enumeration = "FailureCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ConnectRequest {
    #[prost(string, tag = "1")]
    pub device_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DisconnectRequest {
    #[prost(string, tag = "1")]
    pub device_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ConnectionStateCode {
    Connecting = 0,
    Connected = 1,
    Disconnecting = 2,
    Disconnected = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct ConnectionStateEvent {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(enumeration = "ConnectionStateCode", tag = "2")]
    pub state: i32,
    #[prost(message, optional, tag = "3")]
    pub failure: Option<GenericFailure>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReadRequest {
    #[prost(message, optional, tag = "1")]
    pub characteristic: Option<CharacteristicAddress>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CharacteristicValue {
    #[prost(message, optional, tag = "1")]
    pub characteristic: Option<CharacteristicAddress>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub failure: Option<GenericFailure>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, optional, tag = "1")]
    pub characteristic: Option<CharacteristicAddress>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub with_response: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct WriteAck {
    #[prost(message, optional, tag = "1")]
    pub characteristic: Option<CharacteristicAddress>,
    #[prost(message, optional, tag = "3")]
    pub failure: Option<GenericFailure>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NotifyRequest {
    #[prost(message, optional, tag = "1")]
    pub characteristic: Option<CharacteristicAddress>,
    #[prost(bool, tag = "2")]
    pub enable: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct DiscoverServicesRequest {
    #[prost(string, tag = "1")]
    pub device_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DiscoveredCharacteristic {
    #[prost(message, optional, tag = "1")]
    pub characteristic_uuid: Option<Uuid>,
    #[prost(message, optional, tag = "2")]
    pub service_uuid: Option<Uuid>,
    #[prost(bool, tag = "3")]
    pub is_readable: bool,
    #[prost(bool, tag = "4")]
    pub is_writable_with_response: bool,
    #[prost(bool, tag = "5")]
    pub is_writable_without_response: bool,
    #[prost(bool, tag = "6")]
    pub is_notifiable: bool,
    #[prost(bool, tag = "7")]
    pub is_indicatable: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct DiscoveredService {
    #[prost(message, optional, tag = "1")]
    pub service_uuid: Option<Uuid>,
    #[prost(message, repeated, tag = "2")]
    pub characteristic_uuids: Vec<Uuid>,
    #[prost(message, repeated, tag = "3")]
    pub included_services: Vec<DiscoveredService>,
    #[prost(message, repeated, tag = "4")]
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DiscoveredTopology {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(message, repeated, tag = "2")]
    pub services: Vec<DiscoveredService>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum BleStatusCode {
    Unknown = 0,
    Unsupported = 1,
    Unauthorized = 2,
    PoweredOff = 3,
    LocationServicesDisabled = 4,
    Ready = 5,
}

#[derive(Clone, PartialEq, Message)]
pub struct BleStatusInfo {
    #[prost(enumeration = "BleStatusCode", tag = "1")]
    pub status: i32,
}

// Host framing

#[derive(Clone, PartialEq, Message)]
pub struct MethodCall {
    #[prost(uint32, tag = "1")]
    pub call_id: u32,
    #[prost(string, tag = "2")]
    pub method: String,
    #[prost(bytes = "vec", tag = "3")]
    pub arguments: Vec<u8>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum Outcome {
    #[prost(bytes = "vec", tag = "2")]
    Success(Vec<u8>),
    #[prost(message, tag = "3")]
    Failure(GenericFailure),
    #[prost(bool, tag = "4")]
    NotImplemented(bool),
}

#[derive(Clone, PartialEq, Message)]
pub struct MethodResult {
    #[prost(uint32, tag = "1")]
    pub call_id: u32,
    #[prost(oneof = "Outcome", tags = "2, 3, 4")]
    pub outcome: Option<Outcome>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelEvent {
    #[prost(string, tag = "1")]
    pub channel: String,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum Frame {
    #[prost(message, tag = "1")]
    Call(MethodCall),
    #[prost(message, tag = "2")]
    Reply(MethodResult),
    #[prost(message, tag = "3")]
    Event(ChannelEvent),
}

#[derive(Clone, PartialEq, Message)]
pub struct HostFrame {
    #[prost(oneof = "Frame", tags = "1, 2, 3")]
    pub frame: Option<Frame>,
}
