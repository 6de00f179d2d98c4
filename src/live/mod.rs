//! Live: duplex streaming sessions with a remote inference service.
//!
//! DESIGN
//! ======
//! The relay talks to the remote service only through the [`LiveConnect`]
//! and [`LiveSession`] traits. [`gemini::GeminiLiveClient`] is the one
//! production implementation; tests substitute scripted sessions.

pub mod gemini;
pub mod types;

pub use types::{LiveConnect, LiveError, LiveRequest, LiveSession, ResponseChunk, ResponseModality, SessionOptions};
