use super::*;
use crate::relay::test_helpers::{MockSession, MockSource, Step};
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn text_frames_become_verbatim_text_requests() {
    let session = MockSession::new();
    let mut source = MockSource::new(vec![
        Step::Frame(Frame::Text("hello".into())),
        Step::Frame(Frame::Text(String::new())),
        Step::Frame(Frame::Text("  padded  ".into())),
    ]);

    let result = run(&mut source, &session, &CancellationToken::new()).await;

    assert_eq!(result, Ok(PumpExit::PeerClosed));
    assert_eq!(
        session.requests(),
        vec![
            LiveRequest::Text("hello".into()),
            LiveRequest::Text(String::new()),
            LiveRequest::Text("  padded  ".into()),
        ]
    );
}

#[tokio::test]
async fn binary_frames_become_audio_requests_byte_for_byte() {
    let session = MockSession::new();
    let pcm: Vec<u8> = (0..320_u16).map(|i| (i % 251) as u8).collect();
    let mut source = MockSource::new(vec![Step::Frame(Frame::Binary(pcm.clone())), Step::Frame(Frame::Binary(Vec::new()))]);

    let result = run(&mut source, &session, &CancellationToken::new()).await;

    assert_eq!(result, Ok(PumpExit::PeerClosed));
    assert_eq!(session.requests(), vec![LiveRequest::Audio(pcm), LiveRequest::Audio(Vec::new())]);
}

#[tokio::test]
async fn mixed_frames_keep_order() {
    let session = MockSession::new();
    let mut source = MockSource::new(vec![
        Step::Frame(Frame::Binary(vec![1])),
        Step::Frame(Frame::Text("a".into())),
        Step::Frame(Frame::Binary(vec![2])),
    ]);

    run(&mut source, &session, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        session.requests(),
        vec![LiveRequest::Audio(vec![1]), LiveRequest::Text("a".into()), LiveRequest::Audio(vec![2])]
    );
}

#[tokio::test]
async fn read_failure_ends_pump_with_receive_error() {
    let session = MockSession::new();
    let mut source = MockSource::new(vec![Step::Frame(Frame::Text("one".into())), Step::Fail("connection reset")]);

    let result = run(&mut source, &session, &CancellationToken::new()).await;

    assert_eq!(result, Err(RelayError::Receive("connection reset".into())));
    assert_eq!(session.requests().len(), 1);
}

#[tokio::test]
async fn session_rejection_drains_client_then_reports_send_error() {
    let session = MockSession::new().failing_sends();
    let mut source = MockSource::new(vec![
        Step::Frame(Frame::Text("one".into())),
        Step::Frame(Frame::Text("two".into())),
        Step::Frame(Frame::Binary(vec![1, 2])),
    ]);
    let receives = source.receive_counter();

    let result = timeout(Duration::from_secs(1), run(&mut source, &session, &CancellationToken::new()))
        .await
        .expect("pump should return once the client leaves");

    assert!(matches!(result, Err(RelayError::Send(_))), "unexpected result: {result:?}");
    // Three frames plus the end of stream; nothing after the first reached the session.
    assert_eq!(receives.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert!(session.requests().is_empty());
}

#[tokio::test]
async fn session_rejection_stops_draining_on_read_failure() {
    let session = MockSession::new().failing_sends();
    let mut source = MockSource::new(vec![
        Step::Frame(Frame::Text("one".into())),
        Step::Fail("connection reset"),
        Step::Hang,
    ]);

    let result = timeout(Duration::from_secs(1), run(&mut source, &session, &CancellationToken::new()))
        .await
        .expect("read failure should end the drain");

    assert!(matches!(result, Err(RelayError::Send(_))), "unexpected result: {result:?}");
}

#[tokio::test]
async fn cancellation_interrupts_drain_after_rejection() {
    let session = MockSession::new().failing_sends();
    let mut source = MockSource::new(vec![Step::Frame(Frame::Text("one".into())), Step::Hang]);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = timeout(Duration::from_secs(1), run(&mut source, &session, &cancel))
        .await
        .expect("cancelled drain should return");
    assert!(matches!(result, Err(RelayError::Send(_))), "unexpected result: {result:?}");
}

#[tokio::test]
async fn cancellation_interrupts_blocked_receive() {
    let session = MockSession::new();
    let mut source = MockSource::new(vec![Step::Hang]);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = timeout(Duration::from_secs(1), run(&mut source, &session, &cancel))
        .await
        .expect("cancelled pump should return");
    assert_eq!(result, Err(RelayError::Cancelled));
}

#[test]
fn frame_converts_to_request() {
    assert_eq!(LiveRequest::from(Frame::Text("x".into())), LiveRequest::Text("x".into()));
    assert_eq!(LiveRequest::from(Frame::Binary(vec![3, 4])), LiveRequest::Audio(vec![3, 4]));
}
