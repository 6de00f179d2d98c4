//! Relay error taxonomy.

use crate::error::ErrorCode;

/// Terminal cause of a pump or of a whole relay.
///
/// None of these ever escape the coordinator; they are logged and folded
/// into the relay report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The live session could not be opened.
    #[error("session connect failed: {0}")]
    Connect(String),

    /// A write to the session or to the client failed.
    #[error("send failed: {0}")]
    Send(String),

    /// A read from the client or from the session failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The pump was asked to stop.
    #[error("cancelled")]
    Cancelled,

    /// The pump task panicked.
    #[error("pump task panicked: {0}")]
    Panicked(String),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "E_CONNECT",
            Self::Send(_) => "E_SEND",
            Self::Receive(_) => "E_RECEIVE",
            Self::Cancelled => "E_CANCELLED",
            Self::Panicked(_) => "E_PANICKED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}
