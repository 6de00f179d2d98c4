//! Scripted connection halves and live sessions for relay tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::connection::{ConnectionStatus, FrameSink, FrameSource};
use super::error::RelayError;
use crate::frame::Frame;
use crate::live::{LiveConnect, LiveError, LiveRequest, LiveSession, ResponseChunk, SessionOptions};

// =============================================================================
// FRAME SOURCE
// =============================================================================

/// One scripted step of a [`MockSource`].
pub enum Step {
    Frame(Frame),
    Fail(&'static str),
    Eof,
    /// Block until the pump is cancelled.
    Hang,
}

/// Frame source that replays a script. Reaching the end of the script
/// behaves like [`Step::Eof`].
pub struct MockSource {
    steps: VecDeque<Step>,
    receives: Arc<AtomicUsize>,
    status: Option<ConnectionStatus>,
}

impl MockSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps: steps.into(), receives: Arc::new(AtomicUsize::new(0)), status: None }
    }

    /// Mark `status` closed on EOF or failure, like the socket adapter.
    pub fn closing(mut self, status: ConnectionStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn peer_gone(&self) {
        if let Some(status) = &self.status {
            status.mark_closed();
        }
    }

    /// Counter of `receive` calls, readable after the source is moved.
    pub fn receive_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.receives)
    }
}

#[async_trait::async_trait]
impl FrameSource for MockSource {
    async fn receive(&mut self) -> Option<Result<Frame, RelayError>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front().unwrap_or(Step::Eof) {
            Step::Frame(frame) => Some(Ok(frame)),
            Step::Fail(reason) => {
                self.peer_gone();
                Some(Err(RelayError::Receive(reason.into())))
            }
            Step::Eof => {
                self.peer_gone();
                None
            }
            Step::Hang => std::future::pending().await,
        }
    }
}

// =============================================================================
// FRAME SINK
// =============================================================================

/// Shared view of everything a [`MockSink`] saw.
#[derive(Clone, Default)]
pub struct SinkRecorder {
    sent: Arc<Mutex<Vec<Frame>>>,
    closes: Arc<AtomicUsize>,
}

impl SinkRecorder {
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().expect("recorder mutex should lock").clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Frame sink that records frames. Optionally fails every send.
pub struct MockSink {
    recorder: SinkRecorder,
    fail_sends: bool,
    closed: bool,
}

impl MockSink {
    pub fn new() -> (Self, SinkRecorder) {
        let recorder = SinkRecorder::default();
        (Self { recorder: recorder.clone(), fail_sends: false, closed: false }, recorder)
    }

    pub fn failing() -> (Self, SinkRecorder) {
        let (mut sink, recorder) = Self::new();
        sink.fail_sends = true;
        (sink, recorder)
    }
}

#[async_trait::async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, frame: Frame) -> Result<(), RelayError> {
        if self.fail_sends {
            return Err(RelayError::Send("broken pipe".into()));
        }
        self.recorder.sent.lock().expect("recorder mutex should lock").push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        if !self.closed {
            self.closed = true;
            self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// =============================================================================
// LIVE SESSION
// =============================================================================

type Responder = Box<dyn Fn(&LiveRequest) -> Vec<ResponseChunk> + Send + Sync>;

/// Scripted live session.
///
/// Responses come from an unbounded channel: preloaded with [`push`],
/// produced by the responder on each `send`, or pushed later by a test.
/// The stream ends once [`finish`] (or `close`) drops the sender and the
/// queue drains.
///
/// [`push`]: MockSession::push
/// [`finish`]: MockSession::finish
pub struct MockSession {
    requests: Mutex<Vec<LiveRequest>>,
    responses_tx: Mutex<Option<mpsc::UnboundedSender<Result<ResponseChunk, LiveError>>>>,
    responses_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<ResponseChunk, LiveError>>>,
    responder: Option<Responder>,
    finish_after_reply: bool,
    fail_sends: bool,
    closes: AtomicUsize,
}

impl MockSession {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            requests: Mutex::new(Vec::new()),
            responses_tx: Mutex::new(Some(tx)),
            responses_rx: tokio::sync::Mutex::new(rx),
            responder: None,
            finish_after_reply: false,
            fail_sends: false,
            closes: AtomicUsize::new(0),
        }
    }

    /// Echo text requests back as text chunks, then end the stream.
    pub fn echo_once() -> Self {
        Self::new().with_responder(
            |request| match request {
                LiveRequest::Text(text) => vec![ResponseChunk::Text(text.clone())],
                LiveRequest::Audio(_) => Vec::new(),
            },
            true,
        )
    }

    pub fn with_responder(
        mut self,
        responder: impl Fn(&LiveRequest) -> Vec<ResponseChunk> + Send + Sync + 'static,
        finish_after_reply: bool,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self.finish_after_reply = finish_after_reply;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn push(&self, chunk: ResponseChunk) {
        self.push_result(Ok(chunk));
    }

    pub fn push_result(&self, result: Result<ResponseChunk, LiveError>) {
        if let Some(tx) = self.responses_tx.lock().expect("session mutex should lock").as_ref() {
            let _ = tx.send(result);
        }
    }

    /// End the response stream after whatever is already queued.
    pub fn finish(&self) {
        self.responses_tx.lock().expect("session mutex should lock").take();
    }

    pub fn requests(&self) -> Vec<LiveRequest> {
        self.requests.lock().expect("session mutex should lock").clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LiveSession for MockSession {
    async fn send(&self, request: LiveRequest) -> Result<(), LiveError> {
        if self.fail_sends {
            return Err(LiveError::Send("session rejected request".into()));
        }
        if let Some(responder) = &self.responder {
            for chunk in responder(&request) {
                self.push(chunk);
            }
            if self.finish_after_reply {
                self.finish();
            }
        }
        self.requests.lock().expect("session mutex should lock").push(request);
        Ok(())
    }

    async fn next_response(&self) -> Option<Result<ResponseChunk, LiveError>> {
        self.responses_rx.lock().await.recv().await
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.finish();
    }
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Connector that hands out one prepared session, or fails.
pub struct MockConnector {
    session: Option<Arc<MockSession>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn with_session(session: Arc<MockSession>) -> Self {
        Self { session: Some(session), connects: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { session: None, connects: AtomicUsize::new(0) }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LiveConnect for MockConnector {
    async fn connect(&self, _options: &SessionOptions) -> Result<Arc<dyn LiveSession>, LiveError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.session {
            Some(session) => Ok(Arc::clone(session) as Arc<dyn LiveSession>),
            None => Err(LiveError::Connect("connection refused".into())),
        }
    }
}
