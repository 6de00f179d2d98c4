//! Gemini Live client: `BidiGenerateContent` over a WebSocket.
//!
//! PROTOCOL
//! ========
//! 1. Connect to the endpoint with the API key as a query parameter.
//! 2. Send `setup` (model + response modality), wait for `setupComplete`.
//! 3. Text goes out as a complete user turn in `clientContent`; audio goes
//!    out as base64 PCM in `realtimeInput.audio`.
//! 4. `serverContent.modelTurn.parts` come back as text or base64
//!    `inlineData`, one chunk per part, in order. A JSON `error` object or an
//!    abnormal close frame becomes a single terminal error chunk.
//!
//! The server may send its JSON in either text or binary frames.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::types::{LiveConnect, LiveError, LiveRequest, LiveSession, ResponseChunk, SessionOptions};

pub const DEFAULT_LIVE_BASE_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Upper bound on the close handshake with the remote service.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// CLIENT
// =============================================================================

/// Opens Gemini Live sessions with a fixed credential and endpoint.
pub struct GeminiLiveClient {
    api_key: String,
    base_url: String,
    connect_timeout: Duration,
}

impl GeminiLiveClient {
    #[must_use]
    pub fn new(api_key: String, base_url: String, connect_timeout: Duration) -> Self {
        Self { api_key, base_url, connect_timeout }
    }

    fn endpoint(&self) -> String {
        format!("{}?key={}", self.base_url, self.api_key)
    }
}

#[async_trait::async_trait]
impl LiveConnect for GeminiLiveClient {
    async fn connect(&self, options: &SessionOptions) -> Result<Arc<dyn LiveSession>, LiveError> {
        Ok(Arc::new(self.open(options).await?))
    }
}

impl GeminiLiveClient {
    /// Connect and complete setup, bounded by the connect timeout.
    async fn open(&self, options: &SessionOptions) -> Result<GeminiLiveSession, LiveError> {
        let handshake = async {
            let (stream, _) = connect_async(self.endpoint())
                .await
                .map_err(|e| LiveError::Connect(e.to_string()))?;
            let (mut sink, mut source) = stream.split();

            let setup = encode_setup(options)?;
            sink.send(Message::Text(setup.into()))
                .await
                .map_err(|e| LiveError::Handshake(e.to_string()))?;
            await_setup_complete(&mut source).await?;
            Ok::<_, LiveError>((sink, source))
        };

        let (sink, source) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| LiveError::Connect(format!("timed out after {}s", self.connect_timeout.as_secs())))??;

        info!(model = %options.model, input_rate = options.input_rate, "live: session established");
        Ok(GeminiLiveSession::new(sink, source, options))
    }
}

async fn await_setup_complete(source: &mut SplitStream<WsStream>) -> Result<(), LiveError> {
    loop {
        let Some(message) = source.next().await else {
            return Err(LiveError::Handshake("stream ended before setupComplete".into()));
        };
        let message = message.map_err(|e| LiveError::Handshake(e.to_string()))?;
        let payload: &[u8] = match &message {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(bytes) => &bytes[..],
            Message::Close(frame) => {
                let reason = close_error(frame.as_ref()).unwrap_or_else(|| "closed during setup".into());
                return Err(LiveError::Handshake(reason));
            }
            _ => continue,
        };
        let event = decode_server_message(payload, 0)?;
        for chunk in event.chunks {
            if let ResponseChunk::Error(reason) = chunk {
                return Err(LiveError::Handshake(reason));
            }
        }
        if event.setup_complete {
            return Ok(());
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One open Gemini Live session.
///
/// The write half and the read half sit behind separate locks so the uplink
/// and downlink never wait on each other.
pub struct GeminiLiveSession {
    sink: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<ResponseReader>,
    input_rate: u32,
    closed: AtomicBool,
    close_timeout: Duration,
}

struct ResponseReader {
    source: SplitStream<WsStream>,
    pending: VecDeque<ResponseChunk>,
    output_rate: u32,
    finished: bool,
}

impl GeminiLiveSession {
    fn new(sink: SplitSink<WsStream, Message>, source: SplitStream<WsStream>, options: &SessionOptions) -> Self {
        Self {
            sink: Mutex::new(sink),
            reader: Mutex::new(ResponseReader {
                source,
                pending: VecDeque::new(),
                output_rate: options.output_rate,
                finished: false,
            }),
            input_rate: options.input_rate,
            closed: AtomicBool::new(false),
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

#[async_trait::async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send(&self, request: LiveRequest) -> Result<(), LiveError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LiveError::Closed);
        }
        let payload = encode_request(&request, self.input_rate)?;
        self.sink
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| LiveError::Send(e.to_string()))
    }

    async fn next_response(&self) -> Option<Result<ResponseChunk, LiveError>> {
        let mut guard = self.reader.lock().await;
        let reader = &mut *guard;
        loop {
            if let Some(chunk) = reader.pending.pop_front() {
                if matches!(chunk, ResponseChunk::Error(_)) {
                    reader.finished = true;
                    reader.pending.clear();
                }
                return Some(Ok(chunk));
            }
            if reader.finished {
                return None;
            }

            let message = match reader.source.next().await {
                None => {
                    reader.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    reader.finished = true;
                    return Some(Err(LiveError::Receive(e.to_string())));
                }
                Some(Ok(message)) => message,
            };

            let payload: &[u8] = match &message {
                Message::Text(text) => text.as_str().as_bytes(),
                Message::Binary(bytes) => &bytes[..],
                Message::Close(frame) => {
                    reader.finished = true;
                    return close_error(frame.as_ref()).map(|reason| Ok(ResponseChunk::Error(reason)));
                }
                _ => continue,
            };

            match decode_server_message(payload, reader.output_rate) {
                Ok(event) => reader.pending.extend(event.chunks),
                Err(e) => warn!(error = %e, "live: skipping undecodable server message"),
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let closing = async {
            let mut sink = self.sink.lock().await;
            let frame = CloseFrame { code: CloseCode::Normal, reason: String::new().into() };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!(error = %e, "live: close frame not delivered");
            }
            if let Err(e) = sink.close().await {
                debug!(error = %e, "live: sink close failed");
            }
        };
        if tokio::time::timeout(self.close_timeout, closing).await.is_err() {
            warn!(timeout = ?self.close_timeout, "live: close handshake timed out, dropping connection");
        }
    }
}

/// Error text for an abnormal close, `None` for a clean one.
fn close_error(frame: Option<&CloseFrame>) -> Option<String> {
    let frame = frame?;
    if matches!(frame.code, CloseCode::Normal | CloseCode::Away) {
        return None;
    }
    let reason = frame.reason.as_str();
    if reason.is_empty() {
        Some(format!("connection closed with code {}", u16::from(frame.code)))
    } else {
        Some(reason.to_owned())
    }
}

// =============================================================================
// OUTBOUND WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct SetupMessage<'a> {
    setup: Setup<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup<'a> {
    model: &'a str,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContentMessage<'a> {
    client_content: ClientContent<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContent<'a> {
    turns: [Turn<'a>; 1],
    turn_complete: bool,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputMessage {
    realtime_input: RealtimeInput,
}

#[derive(Serialize)]
struct RealtimeInput {
    audio: Blob,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

pub(crate) fn encode_setup(options: &SessionOptions) -> Result<String, LiveError> {
    let message = SetupMessage {
        setup: Setup {
            model: &options.model,
            generation_config: GenerationConfig { response_modalities: [options.modality.as_api_str()] },
        },
    };
    serde_json::to_string(&message).map_err(|e| LiveError::Protocol(e.to_string()))
}

pub(crate) fn encode_request(request: &LiveRequest, input_rate: u32) -> Result<String, LiveError> {
    let encoded = match request {
        LiveRequest::Text(text) => serde_json::to_string(&ClientContentMessage {
            client_content: ClientContent {
                turns: [Turn { role: "user", parts: [TextPart { text }] }],
                turn_complete: true,
            },
        }),
        LiveRequest::Audio(pcm) => serde_json::to_string(&RealtimeInputMessage {
            realtime_input: RealtimeInput {
                audio: Blob { mime_type: format!("audio/pcm;rate={input_rate}"), data: STANDARD.encode(pcm) },
            },
        }),
    };
    encoded.map_err(|e| LiveError::Protocol(e.to_string()))
}

// =============================================================================
// INBOUND WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    error: Option<ServerError>,
    go_away: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize)]
struct ServerError {
    #[serde(default)]
    message: String,
    code: Option<i64>,
}

/// What one server message contributed to the session.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ServerEvent {
    pub setup_complete: bool,
    pub chunks: Vec<ResponseChunk>,
}

/// Decode one server JSON message. `output_rate` of `0` skips the rate check.
/// A part that fails to decode is dropped; the rest of the message is kept.
pub(crate) fn decode_server_message(payload: &[u8], output_rate: u32) -> Result<ServerEvent, LiveError> {
    let message: ServerMessage = serde_json::from_slice(payload).map_err(|e| LiveError::Protocol(e.to_string()))?;
    let mut event = ServerEvent { setup_complete: message.setup_complete.is_some(), chunks: Vec::new() };

    if let Some(error) = message.error {
        let text = match error.code {
            Some(code) if error.message.is_empty() => format!("remote error code {code}"),
            _ => error.message,
        };
        event.chunks.push(ResponseChunk::Error(text));
        return Ok(event);
    }

    if message.go_away.is_some() {
        debug!("live: server sent goAway");
    }

    let Some(content) = message.server_content else {
        return Ok(event);
    };
    for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            event.chunks.push(ResponseChunk::Text(text));
        }
        if let Some(inline) = part.inline_data {
            match decode_inline_audio(inline, output_rate) {
                Ok(Some(chunk)) => event.chunks.push(chunk),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "live: skipping undecodable audio part"),
            }
        }
    }
    if content.turn_complete {
        debug!("live: turn complete");
    }
    Ok(event)
}

fn decode_inline_audio(inline: InlineData, output_rate: u32) -> Result<Option<ResponseChunk>, LiveError> {
    let mime = inline.mime_type.unwrap_or_default();
    if !mime.is_empty() && !mime.starts_with("audio/") {
        debug!(%mime, "live: skipping non-audio inline data");
        return Ok(None);
    }
    if output_rate > 0 {
        if let Some(rate) = mime_rate(&mime) {
            if rate != output_rate {
                debug!(rate, expected = output_rate, "live: output audio rate differs from configured rate");
            }
        }
    }
    let pcm = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| LiveError::Protocol(format!("invalid base64 audio: {e}")))?;
    Ok(Some(ResponseChunk::Audio(pcm)))
}

fn mime_rate(mime: &str) -> Option<u32> {
    mime.split(';')
        .find_map(|param| param.trim().strip_prefix("rate="))
        .and_then(|rate| rate.parse().ok())
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
