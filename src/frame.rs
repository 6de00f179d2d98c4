//! Frame: one discrete message on the client-facing WebSocket.
//!
//! DESIGN
//! ======
//! The relay only distinguishes two payload kinds: UTF-8 text and raw
//! binary. Everything else the transport produces (ping, pong) is dropped
//! before it reaches a pump, and a close message is treated as end of
//! stream. Outbound text uses two fixed prefixes so the browser can tell a
//! model reply from a relay error notice.

use axum::extract::ws::Message;

// =============================================================================
// PREFIXES
// =============================================================================

/// Prefix for text the model produced.
pub const TEXT_PREFIX: &str = "TEXT: ";

/// Prefix for error notices generated by the relay.
pub const ERROR_PREFIX: &str = "Error: ";

// =============================================================================
// TYPES
// =============================================================================

/// A client-facing frame. No other kinds are relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Classification of one inbound transport message.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A relayable text or binary frame.
    Frame(Frame),
    /// The peer asked to close the socket.
    Close,
    /// Control traffic with no payload for the relay.
    Ignored,
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Text frame carrying a model reply, `"TEXT: " + text`.
    #[must_use]
    pub fn model_text(text: &str) -> Self {
        Self::Text(format!("{TEXT_PREFIX}{text}"))
    }

    /// Text frame carrying a relay error notice, `"Error: " + message`.
    #[must_use]
    pub fn error_notice(message: &str) -> Self {
        Self::Text(format!("{ERROR_PREFIX}{message}"))
    }

    /// Short kind label for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Classify an axum WebSocket message.
    #[must_use]
    pub fn from_message(message: Message) -> Inbound {
        match message {
            Message::Text(text) => Inbound::Frame(Self::Text(text.as_str().to_owned())),
            Message::Binary(bytes) => Inbound::Frame(Self::Binary(bytes.to_vec())),
            Message::Close(_) => Inbound::Close,
            Message::Ping(_) | Message::Pong(_) => Inbound::Ignored,
        }
    }

    /// Convert into an axum WebSocket message for sending.
    #[must_use]
    pub fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text.into()),
            Self::Binary(bytes) => Message::Binary(bytes.into()),
        }
    }
}

/// First `max_chars` characters of `text`, for log previews.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
