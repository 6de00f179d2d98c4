//! Uplink pump: client frames into live session requests.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::connection::FrameSource;
use super::error::RelayError;
use super::{PumpExit, PumpResult};
use crate::frame::{Frame, preview};
use crate::live::{LiveRequest, LiveSession};

const TEXT_PREVIEW_CHARS: usize = 60;

impl From<Frame> for LiveRequest {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::Text(text),
            Frame::Binary(pcm) => Self::Audio(pcm),
        }
    }
}

/// Forward frames from `source` to `session` until the client goes away
/// or `cancel` fires. After a failed send the pump stops forwarding but
/// keeps draining `source` until the client leaves, then reports the send
/// error.
pub async fn run<R: FrameSource + ?Sized>(source: &mut R, session: &dyn LiveSession, cancel: &CancellationToken) -> PumpResult {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RelayError::Cancelled),
            next = source.receive() => next,
        };

        let Some(frame) = next else {
            return Ok(PumpExit::PeerClosed);
        };
        let frame = frame?;

        debug!(kind = frame.kind(), bytes = frame.payload_len(), "uplink: frame received");
        if let Frame::Text(text) = &frame {
            info!(preview = %preview(text, TEXT_PREVIEW_CHARS), "uplink: text to session");
        }

        if let Err(e) = session.send(LiveRequest::from(frame)).await {
            let error = RelayError::Send(e.to_string());
            debug!(%error, "uplink: session rejected request, discarding client input");
            discard_until_closed(source, cancel).await;
            return Err(error);
        }
    }
}

/// Keep reading after a failed send so the source still observes the client
/// leaving. Frames are dropped.
async fn discard_until_closed<R: FrameSource + ?Sized>(source: &mut R, cancel: &CancellationToken) {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = source.receive() => next,
        };
        match next {
            Some(Ok(frame)) => debug!(kind = frame.kind(), "uplink: discarded frame"),
            Some(Err(_)) | None => return,
        }
    }
}

#[cfg(test)]
#[path = "uplink_test.rs"]
mod tests;
