//! Per-connection protocol state.
//!
//! The coordinator is driven from a single control loop: inbound frames go
//! to [`ConnectionCoordinator::handle_frame`], session events to
//! [`ConnectionCoordinator::handle_session_event`]. Outbound frames are
//! queued on the sender task's channel.

use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::{self, MessageRoute, VoiceInputContext};
use crate::core::backends::{AudioFormat, Backends, Metadata};
use crate::core::session::{
    SessionEnvelope, SessionEvent, SessionNotification, UtteranceId, UtteranceSession,
};
use crate::protocol::messages::{
    ClientEvent, ClientMessage, CloseReason, MatchedUser, ServerMessage, StreamControl,
};
use crate::protocol::{
    FrameError, InboundFrame, StreamIdAllocator, decode_frame, encode_audio, encode_control,
};

/// Violations of the device protocol. Each one aborts handling of a single
/// inbound message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// The utterance currently owning the connection's input.
struct ActiveUtterance {
    session: UtteranceSession,
    /// Inbound audio stream routed to the session, cleared once recognition ends
    input_stream_id: Option<u32>,
    context: VoiceInputContext,
}

pub struct ConnectionCoordinator {
    backends: Backends,
    outbound: mpsc::Sender<MessageRoute>,
    events_tx: mpsc::UnboundedSender<SessionEnvelope>,
    active: Option<ActiveUtterance>,
    /// Dialogue continuation id handed to the next utterance
    active_processing_session_id: Option<String>,
    stream_ids: StreamIdAllocator,
    next_utterance: UtteranceId,
    watchdog: Option<Duration>,
}

impl ConnectionCoordinator {
    /// Returns the coordinator and the receiver its sessions report on.
    pub fn new(
        backends: Backends,
        outbound: mpsc::Sender<MessageRoute>,
        watchdog: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEnvelope>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            backends,
            outbound,
            events_tx,
            active: None,
            active_processing_session_id: None,
            stream_ids: StreamIdAllocator::new(),
            next_utterance: 0,
            watchdog,
        };
        (coordinator, events_rx)
    }

    pub fn active_processing_session_id(&self) -> Option<&str> {
        self.active_processing_session_id.as_deref()
    }

    pub fn has_active_session(&self) -> bool {
        self.active.is_some()
    }

    pub fn input_stream_id(&self) -> Option<u32> {
        self.active.as_ref().and_then(|active| active.input_stream_id)
    }

    /// Handle one inbound binary frame.
    pub async fn handle_frame(&mut self, frame: Bytes) -> Result<(), ProtocolError> {
        match decode_frame(frame)? {
            InboundFrame::Control(message) => self.handle_client_message(message).await,
            InboundFrame::Audio { stream_id, payload } => {
                self.handle_audio(stream_id, payload);
                Ok(())
            }
        }
    }

    /// Hand a session event to the utterance it belongs to.
    pub async fn handle_session_event(&mut self, envelope: SessionEnvelope) {
        let notifications = match self.active.as_mut() {
            Some(active) if active.session.id() == envelope.utterance => {
                active.session.handle_event(envelope.event)
            }
            _ => {
                debug!(utterance = envelope.utterance, "Dropping event for stale utterance");
                if let SessionEvent::CaptureReady {
                    mut recognition, ..
                } = envelope.event
                {
                    recognition.session.close();
                }
                return;
            }
        };
        self.apply(notifications).await;
    }

    /// Cancel the active utterance, if any. Called when the connection ends.
    pub async fn shutdown(&mut self) {
        if let Some(active) = self.active.as_mut() {
            let notifications = active.session.cancel();
            self.apply(notifications).await;
        }
    }

    fn handle_audio(&mut self, stream_id: u32, payload: Bytes) {
        match self.active.as_mut() {
            Some(active) if active.input_stream_id == Some(stream_id) => {
                active.session.handle_audio(payload);
            }
            _ => debug!(stream_id, bytes = payload.len(), "Dropping audio for inactive stream"),
        }
    }

    async fn handle_client_message(&mut self, message: ClientMessage) -> Result<(), ProtocolError> {
        if let Some(control) = message.stream_control {
            self.handle_stream_control(control).await;
        }

        let Some(event) = message.event else {
            return Ok(());
        };
        if event.voice_input.is_some() {
            self.handle_voice_input(&event).await?;
        }
        if event.log_spotter.is_some() {
            let ref_message_id = event_message_id(&event)?;
            send_message(&self.outbound, messages::log_ack(ref_message_id)).await;
        }
        if let Some(matched_user) = &event.matched_user {
            self.handle_matched_user(matched_user);
        }
        Ok(())
    }

    async fn handle_voice_input(&mut self, event: &ClientEvent) -> Result<(), ProtocolError> {
        let header = event.header.as_ref().ok_or(ProtocolError::MissingField("Event.Header"))?;
        let stream_id = header
            .stream_id
            .ok_or(ProtocolError::MissingField("Event.Header.StreamId"))?;
        let voice_input = event
            .voice_input
            .as_ref()
            .ok_or(ProtocolError::MissingField("Event.VoiceInput"))?;

        let format: AudioFormat = voice_input
            .format
            .parse()
            .map_err(|_| ProtocolError::UnsupportedFormat(voice_input.format.clone()))?;
        if format != AudioFormat::Opus {
            return Err(ProtocolError::UnsupportedFormat(voice_input.format.clone()));
        }

        if let Some(active) = self.active.as_mut() {
            let notifications = active.session.cancel();
            self.apply(notifications).await;
        }
        self.active = None;

        let request = voice_input.header.clone().unwrap_or_default();
        let context = VoiceInputContext {
            message_id: header.message_id.clone(),
            request_id: request.request_id,
            sequence_number: request.sequence_number,
        };

        self.next_utterance += 1;
        let utterance = self.next_utterance;
        info!(
            utterance,
            stream_id,
            message_id = %context.message_id,
            processing_session_id = ?self.active_processing_session_id,
            "Voice input"
        );

        let mut session = UtteranceSession::new(
            utterance,
            self.backends.clone(),
            self.active_processing_session_id.clone(),
            self.events_tx.clone(),
        );
        let notifications = session.start_voice_input(format);
        self.active = Some(ActiveUtterance {
            session,
            input_stream_id: Some(stream_id),
            context,
        });

        if let Some(timeout) = self.watchdog {
            let events_tx = self.events_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let _ = events_tx.send(SessionEnvelope {
                    utterance,
                    event: SessionEvent::WatchdogExpired,
                });
            });
        }

        self.apply(notifications).await;
        Ok(())
    }

    async fn handle_stream_control(&mut self, control: StreamControl) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.input_stream_id != Some(control.stream_id) {
            debug!(stream_id = control.stream_id, "Ignoring control for foreign stream");
            return;
        }

        let notifications = match control.close_reason() {
            None | Some(CloseReason::Unspecified) => return,
            Some(CloseReason::Cancel) => active.session.cancel(),
            Some(reason) => {
                debug!(stream_id = control.stream_id, ?reason, "Input stream closed");
                active.session.end_of_utterance()
            }
        };
        self.apply(notifications).await;
    }

    fn handle_matched_user(&mut self, matched_user: &MatchedUser) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let classes = matched_user
            .biometry_classification
            .as_ref()
            .map(|c| c.simple.as_slice())
            .unwrap_or_default();
        let class_of = |tag: &str| {
            classes
                .iter()
                .find(|item| item.tag == tag)
                .map(|item| item.class_name.as_str())
        };

        let age = match class_of("children") {
            Some("adult") => "adult",
            Some("child") => "child",
            _ => "unknown",
        };
        let gender = match class_of("gender") {
            Some("male") => "male",
            Some("female") => "female",
            _ => "unknown",
        };

        active.session.handle_side_channel(speaker_metadata(age, gender));
    }

    async fn apply(&mut self, notifications: Vec<SessionNotification>) {
        for notification in notifications {
            self.apply_one(notification).await;
        }
    }

    async fn apply_one(&mut self, notification: SessionNotification) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let ref_message_id = active.context.message_id.clone();

        match notification {
            SessionNotification::Started => {
                send_message(&self.outbound, messages::input_start_ack(&ref_message_id)).await;
            }
            SessionNotification::Transcribed { text } => {
                let message = messages::partial_asr_result(&ref_message_id, &text);
                send_message(&self.outbound, message).await;
            }
            SessionNotification::FullyTranscribed { text, will_process } => {
                active.input_stream_id = None;
                let message = messages::final_asr_result(&ref_message_id, &text, will_process);
                send_message(&self.outbound, message).await;
            }
            SessionNotification::Processed(response) => {
                self.active_processing_session_id = response
                    .require_more_input
                    .then(|| response.session_id.clone());
                let message = messages::assistant_response(&active.context, &response);
                send_message(&self.outbound, message).await;
            }
            SessionNotification::Synthesized(response) => {
                let stream_id = self.stream_ids.allocate();
                let announce = messages::tts_speak(&ref_message_id, stream_id, &response);
                send_message(&self.outbound, announce).await;
                send_frame(&self.outbound, encode_audio(stream_id, &response.audio)).await;
                send_message(&self.outbound, messages::stream_closed(stream_id)).await;
            }
            SessionNotification::Cancelled => {
                self.active = None;
                self.active_processing_session_id = None;
            }
            SessionNotification::Finished => {
                self.active = None;
            }
        }
    }
}

async fn send_message(outbound: &mpsc::Sender<MessageRoute>, message: ServerMessage) {
    send_frame(outbound, encode_control(&message)).await;
}

async fn send_frame(outbound: &mpsc::Sender<MessageRoute>, frame: Bytes) {
    if outbound.send(MessageRoute::Frame(frame)).await.is_err() {
        debug!("Outbound channel closed, dropping frame");
    }
}

fn event_message_id(event: &ClientEvent) -> Result<&str, ProtocolError> {
    event
        .header
        .as_ref()
        .map(|header| header.message_id.as_str())
        .ok_or(ProtocolError::MissingField("Event.Header"))
}

/// Side-channel labels derived from a matched-user event.
pub fn speaker_metadata(age: &str, gender: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("age".to_string(), Value::from(age));
    metadata.insert("gender".to_string(), Value::from(gender));
    metadata
}
