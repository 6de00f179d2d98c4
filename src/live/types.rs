//! Live session types: provider-neutral requests, response chunks, errors,
//! and the traits the relay consumes.

use std::sync::Arc;

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by live session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveError {
    /// The credential environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The transport connection to the remote service failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The session setup exchange did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Writing a request to the remote service failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the remote service failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The remote service sent something that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session has already been closed.
    #[error("session closed")]
    Closed,
}

impl ErrorCode for LiveError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::Connect(_) => "E_LIVE_CONNECT",
            Self::Handshake(_) => "E_LIVE_HANDSHAKE",
            Self::Send(_) => "E_LIVE_SEND",
            Self::Receive(_) => "E_LIVE_RECEIVE",
            Self::Protocol(_) => "E_LIVE_PROTOCOL",
            Self::Closed => "E_LIVE_CLOSED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Handshake(_))
    }
}

// =============================================================================
// REQUESTS AND RESPONSES
// =============================================================================

/// One request sent into a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveRequest {
    /// A user text turn, forwarded verbatim.
    Text(String),
    /// Raw PCM audio at the session's input rate.
    Audio(Vec<u8>),
}

/// One unit of a live session's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseChunk {
    Text(String),
    /// Raw PCM audio at the session's output rate.
    Audio(Vec<u8>),
    /// Application-level failure reported by the remote service. Ends the stream.
    Error(String),
}

// =============================================================================
// SESSION OPTIONS
// =============================================================================

/// Which modality the model answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModality {
    Audio,
    Text,
}

impl ResponseModality {
    /// Wire name expected by the remote service.
    #[must_use]
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Text => "TEXT",
        }
    }
}

/// Parameters for opening one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub model: String,
    /// Input PCM sample rate in Hz.
    pub input_rate: u32,
    /// Expected output PCM sample rate in Hz.
    pub output_rate: u32,
    pub modality: ResponseModality,
}

// =============================================================================
// TRAITS
// =============================================================================

/// An open duplex session with the remote service.
///
/// `send` and `next_response` may be called concurrently from different
/// tasks. Implementations must make `close` idempotent.
#[async_trait::async_trait]
pub trait LiveSession: Send + Sync {
    /// Deliver one request.
    ///
    /// # Errors
    ///
    /// Returns a [`LiveError`] if the session is closed or the write fails.
    async fn send(&self, request: LiveRequest) -> Result<(), LiveError>;

    /// Next response chunk, or `None` once the stream has ended.
    async fn next_response(&self) -> Option<Result<ResponseChunk, LiveError>>;

    /// Close the session. Never fails; repeated calls are no-ops.
    async fn close(&self);
}

/// Opens live sessions. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LiveConnect: Send + Sync {
    /// Open a new session.
    ///
    /// # Errors
    ///
    /// Returns a [`LiveError`] if the transport or the setup exchange fails.
    async fn connect(&self, options: &SessionOptions) -> Result<Arc<dyn LiveSession>, LiveError>;
}
