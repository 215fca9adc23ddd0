//! In-process backends and drivers shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::timeout;

use uniproxy_gateway::core::backends::{
    AudioFormat, AudioMetadataBackend, BackendError, BackendResult, Backends, Metadata,
    MetadataSession, ProcessingBackend, ProcessingRequest, ProcessingResponse,
    RecognitionBackend, RecognitionResult, RecognitionSession, RecognitionStream,
    SynthesisBackend, SynthesisRequest, SynthesisResponse,
};
use uniproxy_gateway::core::codec::{
    CodecResult, DecoderFactory, FrameDecoder, OggPage, OpusHead,
};
use uniproxy_gateway::core::session::{SessionEnvelope, SessionNotification, UtteranceSession};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Holds backend calls until opened. Stays open once opened.
pub struct Gate(Semaphore);

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self(Semaphore::new(0)))
    }

    pub fn open(&self) {
        self.0.add_permits(1 << 20);
    }

    pub async fn wait(&self) {
        let _permit = self.0.acquire().await;
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Packets pass through as PCM unchanged.
pub struct PassThroughDecoders;

struct PassThroughDecoder;

impl FrameDecoder for PassThroughDecoder {
    fn decode(&mut self, packet: &[u8]) -> CodecResult<Bytes> {
        Ok(Bytes::copy_from_slice(packet))
    }
}

impl DecoderFactory for PassThroughDecoders {
    fn create(&self, _head: &OpusHead) -> CodecResult<Box<dyn FrameDecoder>> {
        Ok(Box::new(PassThroughDecoder))
    }
}

/// Header page, tags page and one audio page carrying `packets`.
pub fn opus_stream(sample_rate: u32, packets: &[&'static [u8]]) -> Vec<Bytes> {
    let head = OpusHead {
        sample_rate,
        ..Default::default()
    };
    let pages = [
        OggPage::new(0, vec![Bytes::from(head.to_bytes())]),
        OggPage::new(1, vec![Bytes::from_static(b"OpusTags\x00\x00\x00\x00")]),
        OggPage::new(2, packets.iter().map(|p| Bytes::from_static(*p)).collect()),
    ];
    pages.iter().map(|page| page.to_bytes().unwrap()).collect()
}

// =============================================================================
// Recognition
// =============================================================================

#[derive(Default)]
pub struct MockRecognition {
    pub gate: Option<Arc<Gate>>,
    pub fail: bool,
    /// Chunks seen by every session, in order
    pub chunks: Arc<Mutex<Vec<Bytes>>>,
    pub closed: Arc<AtomicUsize>,
    pub started: AtomicUsize,
    results: Mutex<Option<mpsc::UnboundedSender<RecognitionResult>>>,
}

impl MockRecognition {
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Push a result to the most recently started session.
    pub fn emit(&self, text: &str, end_of_utterance: bool) {
        let guard = self.results.lock();
        let tx = guard.as_ref().expect("recognition session not started");
        tx.send(RecognitionResult {
            text: text.to_string(),
            end_of_utterance,
        })
        .expect("recognition results dropped");
    }

    pub fn chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().clone()
    }
}

struct MockRecognitionSession {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    closed: Arc<AtomicUsize>,
}

impl RecognitionSession for MockRecognitionSession {
    fn transcribe_chunk(&mut self, chunk: Bytes) -> BackendResult<()> {
        self.chunks.lock().push(chunk);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecognitionBackend for MockRecognition {
    async fn start_transcribing(&self, _format: AudioFormat) -> BackendResult<RecognitionStream> {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if self.fail {
            return Err(BackendError::ConnectionFailed("recognizer offline".to_string()));
        }

        self.started.fetch_add(1, Ordering::SeqCst);
        let (tx, results) = mpsc::unbounded_channel();
        *self.results.lock() = Some(tx);
        Ok(RecognitionStream {
            session: Box::new(MockRecognitionSession {
                chunks: self.chunks.clone(),
                closed: self.closed.clone(),
            }),
            results,
        })
    }
}

// =============================================================================
// Audio metadata
// =============================================================================

#[derive(Default)]
pub struct MockMetadata {
    pub fail: bool,
    /// Returned by every finished session
    pub result: Metadata,
    pub chunks: Arc<Mutex<Vec<Bytes>>>,
}

impl MockMetadata {
    pub fn returning(result: Metadata) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }
}

struct MockMetadataSession {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    result: Metadata,
}

#[async_trait]
impl MetadataSession for MockMetadataSession {
    fn process_chunk(&mut self, chunk: Bytes) -> BackendResult<()> {
        self.chunks.lock().push(chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> BackendResult<Metadata> {
        Ok(self.result)
    }
}

#[async_trait]
impl AudioMetadataBackend for MockMetadata {
    async fn start_capturing(&self, _format: AudioFormat) -> BackendResult<Box<dyn MetadataSession>> {
        if self.fail {
            return Err(BackendError::ConnectionFailed("classifier offline".to_string()));
        }
        Ok(Box::new(MockMetadataSession {
            chunks: self.chunks.clone(),
            result: self.result.clone(),
        }))
    }
}

// =============================================================================
// Processing
// =============================================================================

#[derive(Default)]
pub struct MockProcessing {
    pub gate: Option<Arc<Gate>>,
    pub requests: Mutex<Vec<ProcessingRequest>>,
    /// Replies in call order; once exhausted a plain answer is given
    pub replies: Mutex<VecDeque<ProcessingResponse>>,
}

impl MockProcessing {
    pub fn replying(replies: Vec<ProcessingResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ProcessingRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

pub fn reply(text: &str, require_more_input: bool, session_id: &str) -> ProcessingResponse {
    ProcessingResponse {
        text: text.to_string(),
        require_more_input,
        session_id: session_id.to_string(),
        directives: Vec::new(),
    }
}

#[async_trait]
impl ProcessingBackend for MockProcessing {
    async fn process(&self, request: ProcessingRequest) -> BackendResult<ProcessingResponse> {
        let session_id = request.session_id.clone();
        self.requests.lock().push(request);
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }

        let next = self.replies.lock().pop_front();
        Ok(next.unwrap_or_else(|| {
            reply("Четыре", false, session_id.as_deref().unwrap_or("fresh"))
        }))
    }
}

// =============================================================================
// Synthesis
// =============================================================================

pub struct MockSynthesis {
    pub audio: Bytes,
    pub calls: AtomicUsize,
}

impl Default for MockSynthesis {
    fn default() -> Self {
        Self {
            audio: Bytes::from_static(b"OggS-reply"),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockSynthesis {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisBackend for MockSynthesis {
    async fn synthesize(&self, _request: SynthesisRequest) -> BackendResult<SynthesisResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SynthesisResponse {
            audio: self.audio.clone(),
            format: AudioFormat::Opus,
        })
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub struct Mocks {
    pub recognition: Arc<MockRecognition>,
    pub metadata: Arc<MockMetadata>,
    pub processing: Arc<MockProcessing>,
    pub synthesis: Arc<MockSynthesis>,
}

impl Default for Mocks {
    fn default() -> Self {
        Self::new(
            MockRecognition::default(),
            MockMetadata::default(),
            MockProcessing::default(),
        )
    }
}

impl Mocks {
    pub fn new(
        recognition: MockRecognition,
        metadata: MockMetadata,
        processing: MockProcessing,
    ) -> Self {
        Self {
            recognition: Arc::new(recognition),
            metadata: Arc::new(metadata),
            processing: Arc::new(processing),
            synthesis: Arc::new(MockSynthesis::default()),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            recognition: self.recognition.clone(),
            audio_metadata: self.metadata.clone(),
            processing: self.processing.clone(),
            synthesis: self.synthesis.clone(),
        }
    }
}

/// Wait until `condition` holds, yielding to spawned tasks in between.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(STEP_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Drives one [`UtteranceSession`] the way a connection does.
pub struct SessionHarness {
    pub session: UtteranceSession,
    pub events: mpsc::UnboundedReceiver<SessionEnvelope>,
    /// Every notification reported so far, in order
    pub notifications: Vec<SessionNotification>,
}

impl SessionHarness {
    pub fn new(backends: Backends, processing_session_id: Option<&str>) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let session = UtteranceSession::new(
            1,
            backends,
            processing_session_id.map(str::to_string),
            events_tx,
        );
        Self {
            session,
            events,
            notifications: Vec::new(),
        }
    }

    pub fn record(&mut self, notifications: Vec<SessionNotification>) -> Vec<SessionNotification> {
        self.notifications.extend(notifications.iter().cloned());
        notifications
    }

    /// Handle the next background event.
    pub async fn pump(&mut self) -> Vec<SessionNotification> {
        let envelope = timeout(STEP_TIMEOUT, self.events.recv())
            .await
            .expect("no session event in time")
            .expect("event channel closed");
        assert_eq!(envelope.utterance, self.session.id());
        let notifications = self.session.handle_event(envelope.event);
        self.record(notifications)
    }

    /// Pump until a notification matching `predicate` was reported.
    pub async fn pump_until(&mut self, predicate: impl Fn(&SessionNotification) -> bool) {
        while !self.notifications.iter().any(&predicate) {
            self.pump().await;
        }
    }
}
