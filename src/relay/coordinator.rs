//! Relay coordinator: per-connection lifecycle.
//!
//! LIFECYCLE
//! =========
//! `Accepting → SessionOpening → Relaying → Draining → Closed`
//!
//! 1. Open the live session. On failure go straight to `Draining`; no pump
//!    ever starts.
//! 2. Spawn uplink and downlink as separate tasks and wait for both. One
//!    pump finishing, for any reason, never stops the other.
//! 3. Close the session, then the connection. Both closes are idempotent
//!    and their failures are logged, not returned.
//!
//! Cancellation (server shutdown) reaches the pumps through a child token;
//! a cancelled pump reports [`RelayError::Cancelled`] and teardown runs as
//! usual.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{Connection, ConnectionStatus, FrameSink, FrameSource};
use super::error::RelayError;
use super::{PumpExit, PumpResult, downlink, uplink};
use crate::error::ErrorCode;
use crate::live::{LiveConnect, LiveSession, SessionOptions};

// =============================================================================
// PHASES AND REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Accepting,
    SessionOpening,
    Relaying,
    Draining,
    Closed,
}

impl fmt::Display for RelayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepting => "accepting",
            Self::SessionOpening => "session_opening",
            Self::Relaying => "relaying",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything that happened to one connection, for logging and tests.
#[derive(Debug, Default)]
pub struct RelayReport {
    /// Phases in the order they were entered.
    pub phases: Vec<RelayPhase>,
    /// Set when the session could not be opened.
    pub cause: Option<RelayError>,
    /// `None` when the pump never started.
    pub uplink: Option<PumpResult>,
    pub downlink: Option<PumpResult>,
}

impl RelayReport {
    fn enter(&mut self, phase: RelayPhase, remote: &str) {
        debug!(%remote, %phase, "relay: phase");
        self.phases.push(phase);
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Drives one relay per accepted connection. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    connector: Arc<dyn LiveConnect>,
    options: SessionOptions,
    cancel: CancellationToken,
}

impl Coordinator {
    #[must_use]
    pub fn new(connector: Arc<dyn LiveConnect>, options: SessionOptions, cancel: CancellationToken) -> Self {
        Self { connector, options, cancel }
    }

    /// Relay `connection` until both directions finish. Never fails; every
    /// terminal cause is absorbed and logged here.
    pub async fn handle<R: FrameSource, W: FrameSink>(&self, connection: Connection<R, W>) {
        let remote = connection.remote().to_owned();
        let report = self.run(connection).await;
        log_report(&remote, &report);
    }

    pub(crate) async fn run<R: FrameSource, W: FrameSink>(&self, connection: Connection<R, W>) -> RelayReport {
        let (remote, source, sink, status) = connection.into_parts();
        let mut report = RelayReport::default();
        report.enter(RelayPhase::Accepting, &remote);

        report.enter(RelayPhase::SessionOpening, &remote);
        let session = match self.open_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(%remote, code = e.error_code(), retryable = e.retryable(), error = %e, "relay: session not opened");
                report.cause = Some(e);
                None
            }
        };

        let mut sink = match &session {
            Some(session) => {
                report.enter(RelayPhase::Relaying, &remote);
                info!(%remote, model = %self.options.model, "relay: session opened, pumps starting");
                let (sink, uplink, downlink) = self.relay(source, sink, &status, session).await;
                report.uplink = Some(uplink);
                report.downlink = Some(downlink);
                sink
            }
            None => Some(sink),
        };

        report.enter(RelayPhase::Draining, &remote);
        if let Some(session) = session {
            close_session(session.as_ref(), &remote).await;
        }
        // The status may already be closed by the peer; the sink still owes
        // the close handshake, and its close is idempotent.
        status.mark_closed();
        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.close().await {
                warn!(%remote, code = e.error_code(), error = %e, "relay: connection close failed");
            }
        }

        report.enter(RelayPhase::Closed, &remote);
        report
    }

    /// Run both pumps to completion. The sink comes back from the downlink
    /// task unless that task panicked.
    async fn relay<R: FrameSource, W: FrameSink>(
        &self,
        mut source: R,
        mut sink: W,
        status: &ConnectionStatus,
        session: &Arc<dyn LiveSession>,
    ) -> (Option<W>, PumpResult, PumpResult) {
        let token = self.cancel.child_token();

        let up_session = Arc::clone(session);
        let up_token = token.clone();
        let uplink_task = tokio::spawn(async move { uplink::run(&mut source, up_session.as_ref(), &up_token).await });

        let down_session = Arc::clone(session);
        let down_status = status.clone();
        let downlink_task = tokio::spawn(async move {
            let result = downlink::run(&mut sink, &down_status, down_session.as_ref(), &token).await;
            (sink, result)
        });

        let (uplink_joined, downlink_joined) = tokio::join!(uplink_task, downlink_task);
        let uplink = uplink_joined.unwrap_or_else(|e| Err(RelayError::Panicked(e.to_string())));
        match downlink_joined {
            Ok((sink, downlink)) => (Some(sink), uplink, downlink),
            Err(e) => (None, uplink, Err(RelayError::Panicked(e.to_string()))),
        }
    }

    async fn open_session(&self) -> Result<Arc<dyn LiveSession>, RelayError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RelayError::Cancelled),
            result = self.connector.connect(&self.options) => result.map_err(|e| RelayError::Connect(e.to_string())),
        }
    }
}

async fn close_session(session: &dyn LiveSession, remote: &str) {
    session.close().await;
    debug!(%remote, "relay: session closed");
}

fn log_report(remote: &str, report: &RelayReport) {
    for (direction, result) in [("uplink", &report.uplink), ("downlink", &report.downlink)] {
        match result {
            None => {}
            Some(Ok(PumpExit::RemoteError(message))) => {
                info!(%remote, direction, %message, "relay: pump stopped after remote error");
            }
            Some(Ok(exit)) => info!(%remote, direction, ?exit, "relay: pump finished"),
            Some(Err(RelayError::Cancelled)) => info!(%remote, direction, "relay: pump cancelled"),
            Some(Err(e)) => warn!(%remote, direction, code = e.error_code(), error = %e, "relay: pump failed"),
        }
    }
    info!(%remote, "ws: connection closed");
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
