//! Relay: bidirectional pumping between a client socket and a live session.
//!
//! ARCHITECTURE
//! ============
//! ```text
//!   client ──frames──▶ uplink ──requests──▶ ┐
//!                                           │ live session
//!   client ◀──frames── downlink ◀──chunks── ┘
//! ```
//! The [`Coordinator`] opens the session, runs both pumps as separate tasks,
//! waits for both, then closes the session and the connection in that order.

pub mod connection;
pub mod coordinator;
pub mod downlink;
pub mod error;
pub mod uplink;

#[cfg(test)]
pub mod test_helpers;

pub use connection::{Connection, ConnectionStatus, FrameSink, FrameSource};
pub use coordinator::Coordinator;
pub use error::RelayError;

/// How a pump ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// The client closed its side or the inbound stream ended.
    PeerClosed,
    /// The session's response stream ended.
    SessionEnded,
    /// The connection was already closed when there was something to forward.
    ConnectionClosed,
    /// The remote service reported an error; it was relayed to the client.
    RemoteError(String),
}

/// Terminal result of one pump.
pub type PumpResult = Result<PumpExit, RelayError>;
