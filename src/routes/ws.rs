//! WebSocket handler: client side of the relay.
//!
//! DESIGN
//! ======
//! The upgraded socket is split once. The read half becomes a
//! [`FrameSource`] for the uplink pump, the write half a [`FrameSink`] for
//! the downlink pump, and the coordinator owns everything after that. The
//! read adapter is the only place that notices the peer going away, so it
//! marks the shared [`ConnectionStatus`] closed on close frame, EOF, or
//! transport error.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → wrap halves → hand the connection to a fresh coordinator
//! 2. Coordinator opens the live session and runs both pumps
//! 3. Coordinator closes session then socket; the tracked task ends

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::frame::{Frame, Inbound};
use crate::relay::{Connection, ConnectionStatus, FrameSink, FrameSource, RelayError};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response {
    let relays = state.relays.clone();
    ws.on_upgrade(move |socket| relays.track_future(run_ws(socket, state, remote)))
}

async fn run_ws(socket: WebSocket, state: AppState, remote: SocketAddr) {
    info!(%remote, "ws: client connected");

    let (sink, stream) = socket.split();
    let status = ConnectionStatus::new();
    let connection = Connection::new(
        remote.to_string(),
        SocketSource { stream, status: status.clone() },
        SocketSink { sink, closed: false },
        status,
    );

    state.coordinator().handle(connection).await;
}

// =============================================================================
// ADAPTERS
// =============================================================================

/// Read half of an upgraded socket.
struct SocketSource {
    stream: SplitStream<WebSocket>,
    status: ConnectionStatus,
}

#[async_trait::async_trait]
impl FrameSource for SocketSource {
    async fn receive(&mut self) -> Option<Result<Frame, RelayError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => match Frame::from_message(message) {
                    Inbound::Frame(frame) => return Some(Ok(frame)),
                    Inbound::Close => {
                        debug!("ws: close frame from client");
                        self.status.mark_closed();
                        return None;
                    }
                    Inbound::Ignored => {}
                },
                Some(Err(e)) => {
                    self.status.mark_closed();
                    return Some(Err(RelayError::Receive(e.to_string())));
                }
                None => {
                    self.status.mark_closed();
                    return None;
                }
            }
        }
    }
}

/// Write half of an upgraded socket.
struct SocketSink {
    sink: SplitSink<WebSocket, Message>,
    closed: bool,
}

#[async_trait::async_trait]
impl FrameSink for SocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), RelayError> {
        self.sink.send(frame.into_message()).await.map_err(|e| RelayError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Closing the sink starts the close handshake with a close frame.
        self.sink.close().await.map_err(|e| RelayError::Send(e.to_string()))
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
