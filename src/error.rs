//! Grepable error codes shared by every error enum in the crate.
//!
//! Relay failures are never surfaced to callers as `Result`s past the
//! coordinator; they end up in log lines. The code gives each one a stable
//! `E_*` token to search for.

/// Grepable error code and retryable flag for structured log fields.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
