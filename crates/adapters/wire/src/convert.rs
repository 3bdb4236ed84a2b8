//! Conversions between domain types and protobuf messages.

use blecentral_domain::address::{self, DeviceAddress};
use blecentral_domain::connection::{BleStatus, ConnectionState};
use blecentral_domain::error::{BleError, ParseError};
use blecentral_domain::event::{CharacteristicValueEvent, ConnectionStateEvent};
use blecentral_domain::gatt;
use blecentral_domain::uuid_codec;

use crate::messages;

pub fn uuid_to_wire(uuid: uuid::Uuid) -> messages::Uuid {
    messages::Uuid {
        data: uuid_codec::to_wire_bytes(uuid).to_vec(),
    }
}

/// Decode an optional UUID field.
///
/// # Errors
///
/// Returns [`ParseError::MissingField`] if absent or
/// [`ParseError::InvalidUuidLength`] for a bad length.
pub fn uuid_from_wire(
    uuid: Option<&messages::Uuid>,
    field: &'static str,
) -> Result<uuid::Uuid, ParseError> {
    let uuid = uuid.ok_or(ParseError::MissingField(field))?;
    uuid_codec::from_wire_bytes(&uuid.data)
}

#[must_use]
pub fn device_id_to_wire(device: DeviceAddress) -> String {
    device.to_string()
}

/// # Errors
///
/// Returns [`ParseError::InvalidDeviceId`] if the id is not a decimal address.
pub fn device_id_from_wire(device_id: &str) -> Result<DeviceAddress, ParseError> {
    device_id.parse()
}

#[must_use]
pub fn address_to_wire(address: &address::CharacteristicAddress) -> messages::CharacteristicAddress {
    messages::CharacteristicAddress {
        device_id: device_id_to_wire(address.device),
        service_uuid: Some(uuid_to_wire(address.service)),
        characteristic_uuid: Some(uuid_to_wire(address.characteristic)),
    }
}

/// Decode a characteristic address; every part is required.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first invalid part.
pub fn address_from_wire(
    address: Option<&messages::CharacteristicAddress>,
) -> Result<address::CharacteristicAddress, ParseError> {
    let address = address.ok_or(ParseError::MissingField("characteristic"))?;
    Ok(address::CharacteristicAddress::new(
        device_id_from_wire(&address.device_id)?,
        uuid_from_wire(address.service_uuid.as_ref(), "service_uuid")?,
        uuid_from_wire(address.characteristic_uuid.as_ref(), "characteristic_uuid")?,
    ))
}

#[must_use]
pub const fn failure_code(error: &BleError) -> messages::FailureCode {
    use messages::FailureCode;

    match error {
        BleError::NotConnected(_) => FailureCode::NotConnected,
        BleError::ServiceDiscovery(_) => FailureCode::ServiceDiscovery,
        BleError::ServiceNotFound(_) => FailureCode::ServiceNotFound,
        BleError::CharacteristicNotFound { .. } => FailureCode::CharacteristicNotFound,
        BleError::Unreachable => FailureCode::Unreachable,
        BleError::ProtocolError => FailureCode::ProtocolError,
        BleError::AccessDenied => FailureCode::AccessDenied,
        BleError::UnknownGatt => FailureCode::UnknownGatt,
        BleError::WriteFailed(_) => FailureCode::WriteFailed,
        BleError::NotSubscribed(_) => FailureCode::NotSubscribed,
        BleError::NotNotifiable(_) => FailureCode::NotNotifiable,
        BleError::ConnectionFailed { .. } => FailureCode::ConnectionFailed,
        BleError::ConnectionAborted(_) => FailureCode::ConnectionAborted,
        BleError::Serialization(_) => FailureCode::Serialization,
        BleError::Parse(_) => FailureCode::Parse,
    }
}

#[must_use]
pub fn failure_to_wire(error: &BleError) -> messages::GenericFailure {
    let message = match error {
        BleError::Parse(inner) => format!("{error}: {inner}"),
        other => other.to_string(),
    };
    messages::GenericFailure {
        code: failure_code(error) as i32,
        message,
    }
}

#[must_use]
pub const fn connection_state_to_wire(state: ConnectionState) -> messages::ConnectionStateCode {
    match state {
        ConnectionState::Connecting => messages::ConnectionStateCode::Connecting,
        ConnectionState::Connected => messages::ConnectionStateCode::Connected,
        ConnectionState::Disconnecting => messages::ConnectionStateCode::Disconnecting,
        ConnectionState::Disconnected => messages::ConnectionStateCode::Disconnected,
    }
}

#[must_use]
pub fn connection_event_to_wire(event: &ConnectionStateEvent) -> messages::ConnectionStateEvent {
    messages::ConnectionStateEvent {
        device_id: device_id_to_wire(event.device),
        state: connection_state_to_wire(event.state) as i32,
        failure: event.failure.as_ref().map(failure_to_wire),
    }
}

/// A value carries either bytes or a failure, never both.
#[must_use]
pub fn value_to_wire(
    address: &address::CharacteristicAddress,
    result: &Result<Vec<u8>, BleError>,
) -> messages::CharacteristicValue {
    let (value, failure) = match result {
        Ok(value) => (value.clone(), None),
        Err(err) => (Vec::new(), Some(failure_to_wire(err))),
    };
    messages::CharacteristicValue {
        characteristic: Some(address_to_wire(address)),
        value,
        failure,
    }
}

#[must_use]
pub fn value_event_to_wire(event: &CharacteristicValueEvent) -> messages::CharacteristicValue {
    value_to_wire(&event.characteristic, &event.result)
}

#[must_use]
pub fn write_ack_to_wire(
    address: &address::CharacteristicAddress,
    failure: Option<&BleError>,
) -> messages::WriteAck {
    messages::WriteAck {
        characteristic: Some(address_to_wire(address)),
        failure: failure.map(failure_to_wire),
    }
}

fn characteristic_to_wire(
    characteristic: &gatt::DiscoveredCharacteristic,
) -> messages::DiscoveredCharacteristic {
    messages::DiscoveredCharacteristic {
        characteristic_uuid: Some(uuid_to_wire(characteristic.uuid)),
        service_uuid: Some(uuid_to_wire(characteristic.service)),
        is_readable: characteristic.is_readable,
        is_writable_with_response: characteristic.is_writable_with_response,
        is_writable_without_response: characteristic.is_writable_without_response,
        is_notifiable: characteristic.is_notifiable,
        is_indicatable: characteristic.is_indicatable,
    }
}

fn service_to_wire(service: &gatt::DiscoveredService) -> messages::DiscoveredService {
    messages::DiscoveredService {
        service_uuid: Some(uuid_to_wire(service.uuid)),
        characteristic_uuids: service
            .characteristics
            .iter()
            .map(|characteristic| uuid_to_wire(characteristic.uuid))
            .collect(),
        included_services: service.included_services.iter().map(service_to_wire).collect(),
        characteristics: service
            .characteristics
            .iter()
            .map(characteristic_to_wire)
            .collect(),
    }
}

#[must_use]
pub fn topology_to_wire(topology: &gatt::DiscoveredTopology) -> messages::DiscoveredTopology {
    messages::DiscoveredTopology {
        device_id: device_id_to_wire(topology.device),
        services: topology.services.iter().map(service_to_wire).collect(),
    }
}

#[must_use]
pub fn ble_status_to_wire(status: BleStatus) -> messages::BleStatusInfo {
    let code = match status {
        BleStatus::Unknown => messages::BleStatusCode::Unknown,
        BleStatus::Unsupported => messages::BleStatusCode::Unsupported,
        BleStatus::Unauthorized => messages::BleStatusCode::Unauthorized,
        BleStatus::PoweredOff => messages::BleStatusCode::PoweredOff,
        BleStatus::LocationServicesDisabled => messages::BleStatusCode::LocationServicesDisabled,
        BleStatus::Ready => messages::BleStatusCode::Ready,
    };
    messages::BleStatusInfo {
        status: code as i32,
    }
}
