use std::collections::VecDeque;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{
    SessionEnvelope, SessionEvent, SessionNotification, SessionState, UtteranceId,
};
use crate::core::backends::{
    AudioFormat, Backends, BackendResult, Metadata, MetadataSession, ProcessingRequest,
    ProcessingResponse, RecognitionResult, RecognitionSession, RecognitionStream,
    SynthesisRequest, SynthesisResponse, merge_metadata,
};

/// Where device audio goes while capturing.
enum CaptureState {
    /// Backends are starting; audio is queued in arrival order
    NotReady { pending: VecDeque<Bytes> },
    Ready {
        recognition: Box<dyn RecognitionSession>,
        metadata: Box<dyn MetadataSession>,
    },
    /// Backend startup failed; audio is dropped
    Unavailable,
    Closed,
}

/// One utterance's lifecycle. See the module docs for the state diagram.
pub struct UtteranceSession {
    id: UtteranceId,
    backends: Backends,
    events_tx: mpsc::UnboundedSender<SessionEnvelope>,
    state: SessionState,
    capture: CaptureState,
    final_result: Option<RecognitionResult>,
    request_text: String,
    metadata: Metadata,
    processing_session_id: Option<String>,
}

impl UtteranceSession {
    /// `processing_session_id` continues a multi-turn dialogue when set.
    pub fn new(
        id: UtteranceId,
        backends: Backends,
        processing_session_id: Option<String>,
        events_tx: mpsc::UnboundedSender<SessionEnvelope>,
    ) -> Self {
        Self {
            id,
            backends,
            events_tx,
            state: SessionState::Idle,
            capture: CaptureState::NotReady {
                pending: VecDeque::new(),
            },
            final_result: None,
            request_text: String::new(),
            metadata: Metadata::new(),
            processing_session_id,
        }
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Number of chunks waiting for the capture backends.
    pub fn pending_chunks(&self) -> usize {
        match &self.capture {
            CaptureState::NotReady { pending } => pending.len(),
            _ => 0,
        }
    }

    /// Accumulated side-channel metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Start capturing. Backend startup runs in the background; `Started` is
    /// reported right away.
    pub fn start_voice_input(&mut self, format: AudioFormat) -> Vec<SessionNotification> {
        if self.state != SessionState::Idle {
            debug!(utterance = self.id, state = %self.state, "Voice input already started");
            return Vec::new();
        }
        self.state = SessionState::Capturing;

        let recognition = self.backends.recognition.clone();
        let audio_metadata = self.backends.audio_metadata.clone();
        self.spawn(async move {
            let (recognition, metadata) = tokio::join!(
                recognition.start_transcribing(format),
                audio_metadata.start_capturing(format)
            );
            match (recognition, metadata) {
                (Ok(recognition), Ok(metadata)) => SessionEvent::CaptureReady {
                    recognition,
                    metadata,
                },
                (Err(e), other) => {
                    drop(other);
                    SessionEvent::CaptureFailed(e)
                }
                (Ok(mut recognition), Err(e)) => {
                    recognition.session.close();
                    SessionEvent::CaptureFailed(e)
                }
            }
        });

        info!(utterance = self.id, %format, "Voice input started");
        vec![SessionNotification::Started]
    }

    /// Feed one chunk of device audio.
    pub fn handle_audio(&mut self, chunk: Bytes) {
        if self.state != SessionState::Capturing {
            return;
        }

        match &mut self.capture {
            CaptureState::NotReady { pending } => pending.push_back(chunk),
            CaptureState::Ready {
                recognition,
                metadata,
            } => forward_chunk(self.id, recognition.as_mut(), metadata.as_mut(), chunk),
            CaptureState::Unavailable | CaptureState::Closed => {}
        }
    }

    /// Merge side-channel metadata, later keys win.
    pub fn handle_side_channel(&mut self, data: Metadata) {
        if self.is_closed() {
            return;
        }
        merge_metadata(&mut self.metadata, data);
    }

    /// Explicit end-of-utterance from the device or the recognizer.
    pub fn end_of_utterance(&mut self) -> Vec<SessionNotification> {
        if self.state != SessionState::Capturing {
            return Vec::new();
        }

        let metadata_session = match std::mem::replace(&mut self.capture, CaptureState::Closed) {
            CaptureState::Ready {
                mut recognition,
                metadata,
            } => {
                recognition.close();
                Some(metadata)
            }
            _ => None,
        };

        let text = self
            .final_result
            .as_ref()
            .map(|result| result.text.clone())
            .unwrap_or_default();
        let will_process = !text.is_empty();
        info!(utterance = self.id, text = %text, will_process, "Fully transcribed");

        let mut notifications = vec![SessionNotification::FullyTranscribed {
            text: text.clone(),
            will_process,
        }];

        if !will_process {
            if let Some(metadata) = metadata_session {
                let id = self.id;
                tokio::spawn(async move {
                    if let Err(e) = metadata.finish().await {
                        warn!(utterance = id, "Failed to finish audio metadata session: {}", e);
                    }
                });
            }
            notifications.extend(self.finish());
            return notifications;
        }

        self.request_text = text;
        self.state = SessionState::Finalizing;
        match metadata_session {
            Some(metadata) => {
                self.spawn(async move { SessionEvent::MetadataFinished(metadata.finish().await) })
            }
            None => self.start_processing(Metadata::new()),
        }
        notifications
    }

    /// Handle the completion of background work.
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SessionNotification> {
        if self.is_closed() {
            debug!(utterance = self.id, ?event, "Discarding event for closed session");
            if let SessionEvent::CaptureReady {
                mut recognition, ..
            } = event
            {
                recognition.session.close();
            }
            return Vec::new();
        }

        match event {
            SessionEvent::CaptureReady {
                recognition,
                metadata,
            } => {
                self.on_capture_ready(recognition, metadata);
                Vec::new()
            }
            SessionEvent::CaptureFailed(e) => {
                error!(utterance = self.id, "Failed to start transcribing/capturing: {}", e);
                if self.state == SessionState::Capturing {
                    self.capture = CaptureState::Unavailable;
                }
                Vec::new()
            }
            SessionEvent::Recognized(result) => self.on_recognized(result),
            SessionEvent::MetadataFinished(result) => self.on_metadata_finished(result),
            SessionEvent::Processed(result) => self.on_processed(result),
            SessionEvent::Synthesized(result) => self.on_synthesized(result),
            SessionEvent::WatchdogExpired => {
                warn!(utterance = self.id, state = %self.state, "Utterance stalled, cancelling");
                self.cancel()
            }
        }
    }

    /// Cancel the utterance. Reported once; later calls do nothing.
    pub fn cancel(&mut self) -> Vec<SessionNotification> {
        if self.is_closed() {
            return Vec::new();
        }
        self.state = SessionState::Cancelled;
        self.release_capture();
        info!(utterance = self.id, "Cancelled");
        vec![SessionNotification::Cancelled]
    }

    /// Complete the utterance. Reported once; later calls do nothing.
    pub fn finish(&mut self) -> Vec<SessionNotification> {
        if self.is_closed() {
            return Vec::new();
        }
        self.state = SessionState::Finished;
        self.release_capture();
        info!(utterance = self.id, "Finished");
        vec![SessionNotification::Finished]
    }

    fn on_capture_ready(
        &mut self,
        recognition: RecognitionStream,
        mut metadata: Box<dyn MetadataSession>,
    ) {
        let RecognitionStream {
            session: mut recognition,
            mut results,
        } = recognition;

        if self.state != SessionState::Capturing {
            recognition.close();
            return;
        }

        let pending = match std::mem::replace(&mut self.capture, CaptureState::Closed) {
            CaptureState::NotReady { pending } => pending,
            _ => VecDeque::new(),
        };
        debug!(utterance = self.id, replayed = pending.len(), "Capture backends ready");
        for chunk in pending {
            forward_chunk(self.id, recognition.as_mut(), metadata.as_mut(), chunk);
        }
        self.capture = CaptureState::Ready {
            recognition,
            metadata,
        };

        let utterance = self.id;
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(result) = results.recv().await {
                let envelope = SessionEnvelope {
                    utterance,
                    event: SessionEvent::Recognized(result),
                };
                if events_tx.send(envelope).is_err() {
                    break;
                }
            }
        });
    }

    fn on_recognized(&mut self, result: RecognitionResult) -> Vec<SessionNotification> {
        if self.state != SessionState::Capturing {
            return Vec::new();
        }

        debug!(utterance = self.id, text = %result.text, end = result.end_of_utterance, "Transcribed");
        let end_of_utterance = result.end_of_utterance;
        let mut notifications = vec![SessionNotification::Transcribed {
            text: result.text.clone(),
        }];
        if end_of_utterance {
            self.final_result = Some(result);
            notifications.extend(self.end_of_utterance());
        }
        notifications
    }

    fn on_metadata_finished(&mut self, result: BackendResult<Metadata>) -> Vec<SessionNotification> {
        if self.state != SessionState::Finalizing {
            return Vec::new();
        }
        match result {
            Ok(audio_metadata) => self.start_processing(audio_metadata),
            Err(e) => error!(utterance = self.id, "Failed to finish audio metadata session: {}", e),
        }
        Vec::new()
    }

    fn start_processing(&mut self, audio_metadata: Metadata) {
        let mut metadata = self.metadata.clone();
        merge_metadata(&mut metadata, audio_metadata);

        let request = ProcessingRequest {
            text: self.request_text.clone(),
            session_id: self.processing_session_id.clone(),
            metadata,
        };
        self.state = SessionState::Processing;

        let processing = self.backends.processing.clone();
        self.spawn(async move { SessionEvent::Processed(processing.process(request).await) });
    }

    fn on_processed(
        &mut self,
        result: BackendResult<ProcessingResponse>,
    ) -> Vec<SessionNotification> {
        if self.state != SessionState::Processing {
            return Vec::new();
        }
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(utterance = self.id, "Failed to process: {}", e);
                return Vec::new();
            }
        };

        info!(
            utterance = self.id,
            text = %response.text,
            require_more_input = response.require_more_input,
            session_id = %response.session_id,
            "Processed"
        );
        self.state = SessionState::Synthesizing;

        let synthesis = self.backends.synthesis.clone();
        let request = SynthesisRequest {
            text: response.text.clone(),
        };
        self.spawn(async move { SessionEvent::Synthesized(synthesis.synthesize(request).await) });

        vec![SessionNotification::Processed(response)]
    }

    fn on_synthesized(
        &mut self,
        result: BackendResult<SynthesisResponse>,
    ) -> Vec<SessionNotification> {
        if self.state != SessionState::Synthesizing {
            return Vec::new();
        }
        match result {
            Ok(response) => {
                info!(utterance = self.id, format = %response.format, bytes = response.audio.len(), "Synthesized");
                let mut notifications = vec![SessionNotification::Synthesized(response)];
                notifications.extend(self.finish());
                notifications
            }
            Err(e) => {
                error!(utterance = self.id, "Failed to synthesize: {}", e);
                Vec::new()
            }
        }
    }

    fn release_capture(&mut self) {
        if let CaptureState::Ready {
            mut recognition, ..
        } = std::mem::replace(&mut self.capture, CaptureState::Closed)
        {
            recognition.close();
        }
    }

    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let utterance = self.id;
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let event = work.await;
            let _ = events_tx.send(SessionEnvelope { utterance, event });
        });
    }
}

fn forward_chunk(
    utterance: UtteranceId,
    recognition: &mut dyn RecognitionSession,
    metadata: &mut dyn MetadataSession,
    chunk: Bytes,
) {
    if let Err(e) = recognition.transcribe_chunk(chunk.clone()) {
        warn!(utterance, "Recognition rejected audio chunk: {}", e);
    }
    if let Err(e) = metadata.process_chunk(chunk) {
        warn!(utterance, "Metadata capture rejected audio chunk: {}", e);
    }
}
