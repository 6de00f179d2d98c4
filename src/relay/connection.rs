//! Client-facing connection abstraction.
//!
//! DESIGN
//! ======
//! A connection is split into a [`FrameSource`] (read half, owned by the
//! uplink pump) and a [`FrameSink`] (write half, owned by the downlink pump
//! and handed back to the coordinator for teardown). The only state both
//! sides see is [`ConnectionStatus`], a shared closed flag.
//!
//! The flag only means "no more writes from the pumps". Finishing the close
//! handshake is the sink's job: the coordinator closes the sink exactly once
//! in teardown even when the peer started the close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use super::error::RelayError;
use crate::frame::Frame;

// =============================================================================
// STATUS
// =============================================================================

/// Shared open/closed flag. Safe to read from any task; setting it is
/// idempotent and wakes everything waiting in [`ConnectionStatus::closed`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus {
    closed: Arc<AtomicBool>,
    signal: CancellationToken,
}

impl ConnectionStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the connection closed. Returns `true` only for the call that
    /// performed the open → closed transition.
    pub fn mark_closed(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::AcqRel);
        self.signal.cancel();
        was_open
    }

    /// Resolves once the connection is marked closed.
    pub async fn closed(&self) {
        self.signal.cancelled().await;
    }
}

// =============================================================================
// HALVES
// =============================================================================

/// Read half of a client connection.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Next inbound frame. `None` means the peer closed or the stream ended.
    async fn receive(&mut self) -> Option<Result<Frame, RelayError>>;
}

/// Write half of a client connection.
#[async_trait::async_trait]
pub trait FrameSink: Send + 'static {
    /// Send one frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Send`] if the write fails.
    async fn send(&mut self, frame: Frame) -> Result<(), RelayError>;

    /// Close the connection, or answer a close the peer already started.
    /// Repeated calls must be no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Send`] if the close handshake cannot be written.
    async fn close(&mut self) -> Result<(), RelayError>;
}

// =============================================================================
// CONNECTION
// =============================================================================

/// One accepted client connection.
pub struct Connection<R, W> {
    remote: String,
    source: R,
    sink: W,
    status: ConnectionStatus,
}

impl<R: FrameSource, W: FrameSink> Connection<R, W> {
    pub fn new(remote: impl Into<String>, source: R, sink: W, status: ConnectionStatus) -> Self {
        Self { remote: remote.into(), source, sink, status }
    }

    /// Opaque peer identity, used in log fields.
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub(crate) fn into_parts(self) -> (String, R, W, ConnectionStatus) {
        (self.remote, self.source, self.sink, self.status)
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
