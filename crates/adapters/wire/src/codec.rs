//! Message encoding and host framing.
//!
//! Frame layout: `[u32 length, big-endian][u8 protocol version][HostFrame]`.
//! The length covers the version byte and the payload. Sizes are checked
//! before any buffer is allocated.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;
use crate::messages::HostFrame;

pub const PROTOCOL_VERSION: u8 = 1;

/// Default upper bound for a single encoded message.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// Upper bound of what a reply or event envelope adds around its payload.
pub const ENVELOPE_OVERHEAD: usize = 32;

/// Encode a message with an explicit size limit.
///
/// # Errors
///
/// Returns [`WireError::Oversized`] if the encoding would exceed `max`.
pub fn encode_with_limit<M: Message>(message: &M, max: usize) -> Result<Vec<u8>, WireError> {
    let len = message.encoded_len();
    if len > max {
        return Err(WireError::Oversized { len, max });
    }
    Ok(message.encode_to_vec())
}

/// Decode a message, rejecting anything above [`MAX_MESSAGE_LEN`].
///
/// # Errors
///
/// Returns [`WireError::Oversized`] or [`WireError::Decode`].
pub fn decode<M: Message + Default>(bytes: &[u8]) -> Result<M, WireError> {
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(WireError::Oversized {
            len: bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(M::decode(bytes)?)
}

/// Reads and writes [`HostFrame`]s on a byte stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_LEN)
    }
}

impl FrameCodec {
    #[must_use]
    pub const fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Largest reply or event payload that still fits a frame once wrapped.
    #[must_use]
    pub const fn payload_limit(&self) -> usize {
        self.max_len.saturating_sub(ENVELOPE_OVERHEAD)
    }

    /// Read the next frame. Returns `None` when the stream ends between frames.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Oversized`] before allocating for a frame above
    /// the limit, [`WireError::UnsupportedVersion`], [`WireError::Decode`] or
    /// [`WireError::Io`].
    pub async fn read<R: AsyncRead + Unpin>(
        &self,
        reader: &mut R,
    ) -> Result<Option<HostFrame>, WireError> {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if len == 0 {
            return Err(WireError::EmptyFrame);
        }
        let payload_len = len - 1;
        if payload_len > self.max_len {
            return Err(WireError::Oversized {
                len: payload_len,
                max: self.max_len,
            });
        }
        let version = reader.read_u8().await?;
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload).await?;
        if version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        Ok(Some(HostFrame::decode(payload.as_slice())?))
    }

    /// Write one frame and flush.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Oversized`] if the frame exceeds the limit, or
    /// [`WireError::Io`].
    pub async fn write<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        frame: &HostFrame,
    ) -> Result<(), WireError> {
        let payload = encode_with_limit(frame, self.max_len)?;
        let len = u32::try_from(payload.len() + 1).map_err(|_| WireError::Oversized {
            len: payload.len(),
            max: self.max_len,
        })?;
        let mut buf = Vec::with_capacity(payload.len() + 5);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(PROTOCOL_VERSION);
        buf.extend_from_slice(&payload);
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ChannelEvent, ConnectRequest, Frame, MethodCall, MethodResult, Outcome};

    fn call_frame(arguments: Vec<u8>) -> HostFrame {
        HostFrame {
            frame: Some(Frame::Call(MethodCall {
                call_id: 7,
                method: "connect".to_string(),
                arguments,
            })),
        }
    }

    #[test]
    fn should_reject_oversized_encoding() {
        let message = ChannelEvent {
            channel: "charUpdate".to_string(),
            payload: vec![0; 32],
        };
        let result = encode_with_limit(&message, 16);
        assert!(matches!(result, Err(WireError::Oversized { max: 16, .. })));
    }

    #[test]
    fn should_reject_oversized_decoding() {
        let bytes = vec![0u8; MAX_MESSAGE_LEN + 1];
        let result = decode::<ConnectRequest>(&bytes);
        assert!(matches!(result, Err(WireError::Oversized { .. })));
    }

    #[test]
    fn should_report_malformed_bytes() {
        // field 1, length-delimited, claims 10 bytes but only has 1
        let result = decode::<ConnectRequest>(&[0x0A, 0x0A, 0x31]);
        assert!(matches!(result, Err(WireError::Decode(_))));
    }

    #[tokio::test]
    async fn should_write_then_read_frame() {
        let codec = FrameCodec::default();
        let (mut client, mut server) = tokio::io::duplex(1024);
        let frame = call_frame(vec![1, 2, 3]);

        codec.write(&mut client, &frame).await.unwrap();
        let read = codec.read(&mut server).await.unwrap();

        assert_eq!(read, Some(frame));
    }

    #[tokio::test]
    async fn should_fit_payload_limit_in_reply_and_event_envelopes() {
        let codec = FrameCodec::new(1024);
        let payload = vec![0xAB; codec.payload_limit()];
        let frames = [
            HostFrame {
                frame: Some(Frame::Event(ChannelEvent {
                    channel: "connectedDevice".to_string(),
                    payload: payload.clone(),
                })),
            },
            HostFrame {
                frame: Some(Frame::Reply(MethodResult {
                    call_id: u32::MAX,
                    outcome: Some(Outcome::Success(payload)),
                })),
            },
        ];

        for frame in frames {
            let mut buffer = Vec::new();
            codec.write(&mut buffer, &frame).await.unwrap();
        }
    }

    #[tokio::test]
    async fn should_return_none_at_end_of_stream() {
        let codec = FrameCodec::default();
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        assert_eq!(codec.read(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_reject_frame_above_limit_before_reading_payload() {
        let codec = FrameCodec::new(8);
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&1000u32.to_be_bytes()).await.unwrap();

        let result = codec.read(&mut server).await;

        assert!(matches!(result, Err(WireError::Oversized { len: 999, max: 8 })));
    }

    #[tokio::test]
    async fn should_reject_unknown_version() {
        let codec = FrameCodec::default();
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 1, 9]).await.unwrap();

        let result = codec.read(&mut server).await;

        assert!(matches!(result, Err(WireError::UnsupportedVersion(9))));
    }

    #[tokio::test]
    async fn should_reject_empty_frame() {
        let codec = FrameCodec::default();
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 0]).await.unwrap();

        assert!(matches!(
            codec.read(&mut server).await,
            Err(WireError::EmptyFrame)
        ));
    }
}
