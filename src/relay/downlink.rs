//! Downlink pump: live session chunks into client frames.
//!
//! Forwarding policy:
//! - text: `"TEXT: " + text`, dropped when blank after trimming
//! - audio: binary frame, always forwarded (empty included)
//! - error: one `"Error: " + message` text frame, then the pump stops

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{ConnectionStatus, FrameSink};
use super::error::RelayError;
use super::{PumpExit, PumpResult};
use crate::frame::Frame;
use crate::live::{LiveSession, ResponseChunk};

/// Forward chunks from `session` to `sink` until the session ends, the
/// remote reports an error, the connection closes, or `cancel` fires.
pub async fn run<W: FrameSink + ?Sized>(
    sink: &mut W,
    status: &ConnectionStatus,
    session: &dyn LiveSession,
    cancel: &CancellationToken,
) -> PumpResult {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RelayError::Cancelled),
            () = status.closed() => return Ok(PumpExit::ConnectionClosed),
            next = session.next_response() => next,
        };

        let Some(chunk) = next else {
            return Ok(PumpExit::SessionEnded);
        };
        let chunk = chunk.map_err(|e| RelayError::Receive(e.to_string()))?;

        if status.is_closed() {
            debug!("downlink: connection closed, dropping remaining output");
            return Ok(PumpExit::ConnectionClosed);
        }

        match chunk {
            ResponseChunk::Error(message) => {
                warn!(%message, "downlink: remote service reported an error");
                sink.send(Frame::error_notice(&message)).await?;
                return Ok(PumpExit::RemoteError(message));
            }
            ResponseChunk::Text(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                info!(%text, "downlink: text to client");
                sink.send(Frame::model_text(&text)).await?;
            }
            ResponseChunk::Audio(pcm) => {
                debug!(bytes = pcm.len(), "downlink: audio to client");
                sink.send(Frame::Binary(pcm)).await?;
            }
        }
    }
}

#[cfg(test)]
#[path = "downlink_test.rs"]
mod tests;
