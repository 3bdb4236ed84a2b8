//! Serves host frames over a byte stream.
//!
//! Every call runs in its own task so a slow GATT operation never blocks the
//! reader. Calls that fail to decode are answered from the reader loop before
//! anything is spawned. Replies and events share one writer task, so frames
//! never interleave. A reply too large for the codec is answered with a
//! serialization failure instead.

use std::sync::Arc;

use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use blecentral_app::ports::BlePlatform;

use crate::codec::FrameCodec;
use crate::dispatcher::{MethodOutcome, Request, RequestDispatcher};
use crate::error::WireError;
use crate::messages::{ChannelEvent, Frame, HostFrame, MethodCall};

/// Frames queued for the writer before callers wait.
const OUTBOUND_QUEUE: usize = 64;

/// Read calls from `reader` until end of stream, writing replies and
/// forwarded events to `writer`.
///
/// Returns once the reader reached end of stream and every in-flight call has
/// been answered. If the writer stops first, pending calls are cancelled and
/// both halves of the stream are dropped.
///
/// # Errors
///
/// Returns a [`WireError`] if the stream cannot be read or written, or if an
/// inbound frame exceeds the codec limit. Frames that decode badly or carry
/// another protocol version are skipped.
pub async fn serve<P, R, W>(
    dispatcher: Arc<RequestDispatcher<P>>,
    mut events: mpsc::Receiver<ChannelEvent>,
    mut reader: R,
    writer: W,
    codec: FrameCodec,
) -> Result<(), WireError>
where
    P: BlePlatform,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (frames, outbound) = mpsc::channel::<HostFrame>(OUTBOUND_QUEUE);
    let mut writer_task = tokio::spawn(write_frames(writer, outbound, codec));

    let event_frames = frames.clone();
    let event_pump = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = HostFrame {
                frame: Some(Frame::Event(event)),
            };
            if event_frames.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut calls = JoinSet::new();
    let mut writer_stopped = false;
    let read_result = loop {
        let next = tokio::select! {
            next = codec.read(&mut reader) => next,
            written = &mut writer_task => {
                writer_stopped = true;
                break Err(writer_failure(written));
            }
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(err @ (WireError::Decode(_) | WireError::UnsupportedVersion(_))) => {
                tracing::warn!(error = %err, "skipping unreadable frame");
                continue;
            }
            Err(err) => break Err(err),
        };
        match frame.frame {
            Some(Frame::Call(call)) => {
                if let Some(reply) = accept_call(&dispatcher, &mut calls, call, &frames) {
                    if frames.send(reply).await.is_err() {
                        tracing::debug!("writer stopped, dropping reply");
                    }
                }
            }
            Some(Frame::Reply(_) | Frame::Event(_)) | None => {
                tracing::warn!("ignoring frame that is not a method call");
            }
        }
    };

    if writer_stopped {
        tracing::warn!("writer stopped, closing the stream");
        calls.shutdown().await;
        event_pump.abort();
        return read_result;
    }

    while let Some(joined) = calls.join_next().await {
        if let Err(err) = joined {
            tracing::warn!(error = %err, "call task failed");
        }
    }
    event_pump.abort();
    drop(frames);

    let write_result = writer_task
        .await
        .unwrap_or_else(|err| Err(WireError::Io(std::io::Error::other(err))));
    read_result.and(write_result)
}

/// Why the writer ended while the reader still expected it to run.
fn writer_failure(joined: Result<Result<(), WireError>, JoinError>) -> WireError {
    match joined {
        Ok(Err(err)) => err,
        Ok(Ok(())) => WireError::Io(std::io::ErrorKind::BrokenPipe.into()),
        Err(err) => WireError::Io(std::io::Error::other(err)),
    }
}

/// Decode a call and spawn it, or return the immediate reply.
fn accept_call<P: BlePlatform>(
    dispatcher: &Arc<RequestDispatcher<P>>,
    calls: &mut JoinSet<()>,
    call: MethodCall,
    frames: &mpsc::Sender<HostFrame>,
) -> Option<HostFrame> {
    let call_id = call.call_id;
    let outcome = match Request::decode(&call.method, &call.arguments) {
        Ok(Some(request)) => {
            let dispatcher = Arc::clone(dispatcher);
            let frames = frames.clone();
            calls.spawn(async move {
                let outcome = dispatcher.handle(request).await;
                if frames.send(reply(call_id, outcome)).await.is_err() {
                    tracing::debug!(call_id, "writer stopped, dropping reply");
                }
            });
            return None;
        }
        Ok(None) => {
            tracing::debug!(call_id, method = %call.method, "method not implemented");
            MethodOutcome::NotImplemented
        }
        Err(err) => {
            tracing::debug!(call_id, method = %call.method, error = %err, "rejecting malformed call");
            MethodOutcome::failure(&err.into_parse())
        }
    };
    Some(reply(call_id, outcome))
}

fn reply(call_id: u32, outcome: MethodOutcome) -> HostFrame {
    HostFrame {
        frame: Some(Frame::Reply(outcome.into_result(call_id))),
    }
}

async fn write_frames<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut frames: mpsc::Receiver<HostFrame>,
    codec: FrameCodec,
) -> Result<(), WireError> {
    while let Some(frame) = frames.recv().await {
        if let Some(frame) = fit_frame(frame, &codec) {
            codec.write(&mut writer, &frame).await?;
        }
    }
    Ok(())
}

/// Keep a frame within the codec limit. An oversized reply becomes a
/// serialization failure for the same call; an oversized event is dropped.
fn fit_frame(frame: HostFrame, codec: &FrameCodec) -> Option<HostFrame> {
    let len = frame.encoded_len();
    if len <= codec.max_len() {
        return Some(frame);
    }
    let err = WireError::Oversized {
        len,
        max: codec.max_len(),
    };
    match frame.frame {
        Some(Frame::Reply(result)) => {
            tracing::warn!(call_id = result.call_id, error = %err, "reply too large, answering with a failure");
            Some(reply(
                result.call_id,
                MethodOutcome::failure(&err.into_serialization()),
            ))
        }
        _ => {
            tracing::warn!(error = %err, "dropping oversized frame");
            None
        }
    }
}
