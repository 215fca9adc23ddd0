//! Utterance session lifecycle against in-process backends.

mod common;

use std::sync::atomic::Ordering;

use bytes::Bytes;
use serde_json::json;

use common::{Gate, MockMetadata, MockProcessing, MockRecognition, Mocks, SessionHarness, eventually, reply};
use uniproxy_gateway::core::backends::{AudioFormat, Metadata};
use uniproxy_gateway::core::session::{SessionNotification, SessionState};

fn chunk(i: usize) -> Bytes {
    Bytes::from(format!("chunk-{i}"))
}

fn metadata(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_audio_order_preserved_across_backend_readiness() {
    for (buffered, live) in [(0, 3), (1, 1), (4, 0), (7, 5)] {
        let gate = Gate::closed();
        let mocks = Mocks::new(
            MockRecognition::gated(gate.clone()),
            MockMetadata::default(),
            MockProcessing::default(),
        );
        let mut h = SessionHarness::new(mocks.backends(), None);

        let started = h.session.start_voice_input(AudioFormat::Opus);
        assert_eq!(started, vec![SessionNotification::Started]);

        for i in 0..buffered {
            h.session.handle_audio(chunk(i));
        }
        assert_eq!(h.session.pending_chunks(), buffered);
        assert!(mocks.recognition.chunks().is_empty());

        gate.open();
        assert!(h.pump().await.is_empty());
        assert_eq!(h.session.pending_chunks(), 0);

        for i in buffered..buffered + live {
            h.session.handle_audio(chunk(i));
        }

        let expected: Vec<Bytes> = (0..buffered + live).map(chunk).collect();
        assert_eq!(mocks.recognition.chunks(), expected);
        assert_eq!(*mocks.metadata.chunks.lock(), expected);
    }
}

#[tokio::test]
async fn test_empty_recognition_finishes_without_processing() {
    let mocks = Mocks::default();
    let mut h = SessionHarness::new(mocks.backends(), None);

    h.session.start_voice_input(AudioFormat::Opus);
    h.pump().await;
    h.session.handle_audio(chunk(0));

    mocks.recognition.emit("", true);
    let notifications = h.pump().await;
    assert_eq!(
        notifications,
        vec![
            SessionNotification::Transcribed {
                text: String::new()
            },
            SessionNotification::FullyTranscribed {
                text: String::new(),
                will_process: false
            },
            SessionNotification::Finished,
        ]
    );
    assert_eq!(h.session.state(), SessionState::Finished);

    tokio::task::yield_now().await;
    assert_eq!(mocks.processing.calls(), 0);
    assert_eq!(mocks.synthesis.calls(), 0);
    assert_eq!(mocks.recognition.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_cycle_merges_metadata_and_continues_dialogue() {
    let mocks = Mocks::new(
        MockRecognition::default(),
        MockMetadata::returning(metadata(json!({"age": "child", "emotion": "neutral"}))),
        MockProcessing::replying(vec![reply("Громкость пять", true, "S1")]),
    );
    let mut h = SessionHarness::new(mocks.backends(), Some("S0"));

    let started = h.session.start_voice_input(AudioFormat::Opus);
    h.record(started);
    h.pump().await;
    h.session
        .handle_side_channel(metadata(json!({"age": "adult", "gender": "female"})));

    mocks.recognition.emit("сделай", false);
    mocks.recognition.emit("сделай громче", true);
    h.pump_until(|n| *n == SessionNotification::Finished).await;

    assert_eq!(
        h.notifications,
        vec![
            SessionNotification::Started,
            SessionNotification::Transcribed {
                text: "сделай".to_string()
            },
            SessionNotification::Transcribed {
                text: "сделай громче".to_string()
            },
            SessionNotification::FullyTranscribed {
                text: "сделай громче".to_string(),
                will_process: true
            },
            SessionNotification::Processed(reply("Громкость пять", true, "S1")),
            SessionNotification::Synthesized(uniproxy_gateway::SynthesisResponse {
                audio: mocks.synthesis.audio.clone(),
                format: AudioFormat::Opus,
            }),
            SessionNotification::Finished,
        ]
    );

    let requests = mocks.processing.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "сделай громче");
    assert_eq!(requests[0].session_id.as_deref(), Some("S0"));
    // Captured audio metadata wins over the side channel on key conflicts
    assert_eq!(
        requests[0].metadata,
        metadata(json!({"age": "child", "gender": "female", "emotion": "neutral"}))
    );
}

#[tokio::test]
async fn test_cancel_while_processing_suppresses_results() {
    let gate = Gate::closed();
    let mocks = Mocks::new(
        MockRecognition::default(),
        MockMetadata::default(),
        MockProcessing::gated(gate.clone()),
    );
    let mut h = SessionHarness::new(mocks.backends(), None);

    h.session.start_voice_input(AudioFormat::Opus);
    h.pump().await;
    mocks.recognition.emit("сколько времени", true);
    h.pump().await;
    assert_eq!(h.session.state(), SessionState::Finalizing);

    // Metadata finished, processing issued
    h.pump().await;
    assert_eq!(h.session.state(), SessionState::Processing);
    eventually(|| mocks.processing.calls() == 1).await;

    assert_eq!(h.session.cancel(), vec![SessionNotification::Cancelled]);
    gate.open();

    assert!(h.pump().await.is_empty());
    assert_eq!(h.session.state(), SessionState::Cancelled);
    assert!(!h.notifications.iter().any(|n| matches!(
        n,
        SessionNotification::Processed(_) | SessionNotification::Synthesized(_)
    )));
    assert_eq!(mocks.synthesis.calls(), 0);
}

#[tokio::test]
async fn test_cancel_and_finish_are_reported_once() {
    let mocks = Mocks::default();
    let mut h = SessionHarness::new(mocks.backends(), None);
    h.session.start_voice_input(AudioFormat::Opus);
    h.pump().await;

    assert_eq!(h.session.cancel(), vec![SessionNotification::Cancelled]);
    assert!(h.session.cancel().is_empty());
    assert!(h.session.finish().is_empty());
    assert!(h.session.end_of_utterance().is_empty());
    assert_eq!(h.session.state(), SessionState::Cancelled);
    assert_eq!(mocks.recognition.closed.load(Ordering::SeqCst), 1);

    let mut other = SessionHarness::new(mocks.backends(), None);
    assert_eq!(other.session.finish(), vec![SessionNotification::Finished]);
    assert!(other.session.finish().is_empty());
    assert!(other.session.cancel().is_empty());
}

#[tokio::test]
async fn test_device_end_of_utterance_without_result() {
    let mocks = Mocks::default();
    let mut h = SessionHarness::new(mocks.backends(), None);
    h.session.start_voice_input(AudioFormat::Opus);
    h.pump().await;

    let notifications = h.session.end_of_utterance();
    assert_eq!(
        notifications,
        vec![
            SessionNotification::FullyTranscribed {
                text: String::new(),
                will_process: false
            },
            SessionNotification::Finished,
        ]
    );
    assert!(h.session.end_of_utterance().is_empty());
}

#[tokio::test]
async fn test_capture_failure_leaves_session_stalled() {
    let mocks = Mocks::new(
        MockRecognition::failing(),
        MockMetadata::default(),
        MockProcessing::default(),
    );
    let mut h = SessionHarness::new(mocks.backends(), None);
    h.session.start_voice_input(AudioFormat::Opus);
    h.session.handle_audio(chunk(0));

    assert!(h.pump().await.is_empty());
    assert_eq!(h.session.state(), SessionState::Capturing);

    h.session.handle_audio(chunk(1));
    assert_eq!(h.session.pending_chunks(), 0);
    assert!(mocks.metadata.chunks.lock().is_empty());
    assert!(!h.session.is_closed());

    // A later cancel still recovers the session
    assert_eq!(h.session.cancel(), vec![SessionNotification::Cancelled]);
}

#[tokio::test]
async fn test_metadata_failure_closes_started_recognition() {
    let mocks = Mocks::new(
        MockRecognition::default(),
        MockMetadata {
            fail: true,
            ..Default::default()
        },
        MockProcessing::default(),
    );
    let mut h = SessionHarness::new(mocks.backends(), None);
    h.session.start_voice_input(AudioFormat::Opus);

    assert!(h.pump().await.is_empty());
    assert_eq!(mocks.recognition.started.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.recognition.closed.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.state(), SessionState::Capturing);
}

#[tokio::test]
async fn test_capture_ready_after_cancel_is_released() {
    let gate = Gate::closed();
    let mocks = Mocks::new(
        MockRecognition::gated(gate.clone()),
        MockMetadata::default(),
        MockProcessing::default(),
    );
    let mut h = SessionHarness::new(mocks.backends(), None);
    h.session.start_voice_input(AudioFormat::Opus);
    h.session.handle_audio(chunk(0));
    h.session.cancel();

    gate.open();
    assert!(h.pump().await.is_empty());
    assert!(mocks.recognition.chunks().is_empty());
    assert_eq!(mocks.recognition.closed.load(Ordering::SeqCst), 1);
}
