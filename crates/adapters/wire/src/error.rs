//! Wire adapter error types.

use blecentral_domain::error::{BleError, ParseError};

/// Errors raised while encoding, decoding or framing messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Message exceeds the configured size limit.
    #[error("message of {len} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Actual size.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// Bytes do not decode as the expected message.
    #[error("failed to decode message")]
    Decode(#[from] prost::DecodeError),

    /// Message could not be encoded.
    #[error("failed to encode message")]
    Encode(#[from] prost::EncodeError),

    /// Message decoded but its content is invalid.
    #[error("invalid message content")]
    Invalid(#[from] ParseError),

    /// Frame carries a protocol version this build does not speak.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Frame has no payload.
    #[error("empty frame")]
    EmptyFrame,

    /// Reading or writing a frame failed.
    #[error("frame I/O failed")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// Convert an inbound failure into the operation error reported to the host.
    #[must_use]
    pub fn into_parse(self) -> BleError {
        match self {
            Self::Invalid(err) => BleError::Parse(err),
            other => BleError::Parse(ParseError::Malformed(other.describe())),
        }
    }

    /// Convert an outbound failure into the operation error reported to the host.
    #[must_use]
    pub fn into_serialization(self) -> BleError {
        BleError::Serialization(self.describe())
    }

    fn describe(&self) -> String {
        match self {
            Self::Decode(err) => format!("{self}: {err}"),
            Self::Encode(err) => format!("{self}: {err}"),
            Self::Io(err) => format!("{self}: {err}"),
            other => other.to_string(),
        }
    }
}
