//! Process configuration parsed once from environment variables.
//!
//! Every variable is read and validated at startup. A missing credential or
//! an unparsable number is fatal before the listener binds; nothing in the
//! relay reads the environment afterwards.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::live::gemini::DEFAULT_LIVE_BASE_URL;
use crate::live::{LiveError, ResponseModality, SessionOptions};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-pro-latest";
pub const DEFAULT_AUDIO_INPUT_RATE: u32 = 16_000;
pub const DEFAULT_AUDIO_OUTPUT_RATE: u32 = 24_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
pub const DEFAULT_INDEX_HTML: &str = "./index.html";

/// Name of the credential variable.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

// =============================================================================
// CONFIG
// =============================================================================

/// Immutable process configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    pub session: SessionOptions,
    pub live_base_url: String,
    pub connect_timeout: Duration,
    pub index_html: PathBuf,
    pub shutdown_grace: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("session", &self.session)
            .field("live_base_url", &self.live_base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("index_html", &self.index_html)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `GEMINI_API_KEY`
    ///
    /// Optional:
    /// - `PORT`: default 8080
    /// - `LIVE_MODEL`: default `models/gemini-1.5-pro-latest`
    /// - `LIVE_AUDIO_INPUT_RATE` / `LIVE_AUDIO_OUTPUT_RATE`: default 16000 / 24000
    /// - `LIVE_RESPONSE_MODALITY`: `audio` (default) or `text`
    /// - `LIVE_BASE_URL`: Gemini Live WebSocket endpoint
    /// - `LIVE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `INDEX_HTML`: default `./index.html`
    /// - `SHUTDOWN_GRACE_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::MissingApiKey`] if the credential is unset or
    /// blank, and [`LiveError::ConfigParse`] if a value does not parse.
    pub fn from_env() -> Result<Self, LiveError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LiveError::MissingApiKey { var: API_KEY_VAR.to_string() })?;

        let session = SessionOptions {
            model: std::env::var("LIVE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            input_rate: env_parse("LIVE_AUDIO_INPUT_RATE", DEFAULT_AUDIO_INPUT_RATE)?,
            output_rate: env_parse("LIVE_AUDIO_OUTPUT_RATE", DEFAULT_AUDIO_OUTPUT_RATE)?,
            modality: parse_modality(std::env::var("LIVE_RESPONSE_MODALITY").ok().as_deref())?,
        };
        if session.input_rate == 0 || session.output_rate == 0 {
            return Err(LiveError::ConfigParse("audio sample rates must be non-zero".into()));
        }

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT)?,
            api_key,
            session,
            live_base_url: std::env::var("LIVE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LIVE_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            connect_timeout: Duration::from_secs(env_parse("LIVE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?),
            index_html: std::env::var("INDEX_HTML")
                .map_or_else(|_| PathBuf::from(DEFAULT_INDEX_HTML), PathBuf::from),
            shutdown_grace: Duration::from_secs(env_parse("SHUTDOWN_GRACE_SECS", DEFAULT_SHUTDOWN_GRACE_SECS)?),
        })
    }
}

/// Parse `var` if set, otherwise use `default`. A set but unparsable value
/// is an error, not a silent fallback.
fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, LiveError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| LiveError::ConfigParse(format!("{var}={raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn parse_modality(raw: Option<&str>) -> Result<ResponseModality, LiveError> {
    match raw.map(str::to_ascii_lowercase).as_deref().unwrap_or("audio") {
        "audio" => Ok(ResponseModality::Audio),
        "text" => Ok(ResponseModality::Text),
        other => Err(LiveError::ConfigParse(format!("LIVE_RESPONSE_MODALITY={other:?}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
