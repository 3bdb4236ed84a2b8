//! UUID conversions to and from wire bytes.
//!
//! The wire form is the 16-byte RFC 4122 order (most significant byte
//! first). Peers may also send the 2- and 4-byte Bluetooth short forms.

use uuid::Uuid;

use crate::error::ParseError;

/// Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`.
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(0x0000_0000_0000_1000_8000_0080_5F9B_34FB);

/// Encode a UUID as its 16 wire bytes.
#[must_use]
pub fn to_wire_bytes(uuid: Uuid) -> [u8; 16] {
    *uuid.as_bytes()
}

/// Decode wire bytes into a UUID.
///
/// Accepts the full 16-byte form as well as 2- and 4-byte short forms,
/// which are expanded against [`BLUETOOTH_BASE_UUID`].
///
/// # Errors
///
/// Returns [`ParseError::InvalidUuidLength`] for any other length.
pub fn from_wire_bytes(bytes: &[u8]) -> Result<Uuid, ParseError> {
    match *bytes {
        [hi, lo] => Ok(from_short(u32::from(u16::from_be_bytes([hi, lo])))),
        [a, b, c, d] => Ok(from_short(u32::from_be_bytes([a, b, c, d]))),
        _ => Uuid::from_slice(bytes).map_err(|_| ParseError::InvalidUuidLength(bytes.len())),
    }
}

/// Expand a 16- or 32-bit assigned number against the Bluetooth base UUID.
#[must_use]
pub fn from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID.as_u128() | (u128::from(short) << 96))
}
