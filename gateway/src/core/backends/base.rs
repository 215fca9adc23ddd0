//! Backend contracts consumed by utterance sessions.
//!
//! Four pluggable services serve one utterance:
//! - recognition: streaming speech-to-text over the raw device audio
//! - audio metadata: side-channel classification of the same audio
//! - processing: turns recognized text into a reply
//! - synthesis: turns the reply into speech

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::codec::CodecError;
use crate::protocol::{Directive, directives};

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not reach the backend
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend answered with a failure
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with something unparseable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Unknown backend kind or missing setting
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The session was already closed
    #[error("Session closed")]
    SessionClosed,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            BackendError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::RequestFailed(e.to_string())
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

// =============================================================================
// Shared Types
// =============================================================================

/// Audio encodings exchanged with the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "audio/opus")]
    Opus,
    #[serde(rename = "audio/mp3")]
    Mp3,
}

impl AudioFormat {
    /// MIME type as used on the wire.
    #[inline]
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Opus => "audio/opus",
            AudioFormat::Mp3 => "audio/mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for AudioFormat {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio/opus" | "audio/ogg" | "audio/ogg;codecs=opus" => Ok(AudioFormat::Opus),
            "audio/mp3" | "audio/mpeg" => Ok(AudioFormat::Mp3),
            _ => Err(BackendError::InvalidConfiguration(format!(
                "Unsupported audio format: {s}"
            ))),
        }
    }
}

/// Side-channel metadata: string keys to arbitrary JSON values.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Last-write-wins union of `overlay` into `base`.
pub fn merge_metadata(base: &mut Metadata, overlay: Metadata) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// One recognition hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionResult {
    pub text: String,
    /// The recognizer considers the utterance complete
    pub end_of_utterance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub text: String,
    /// Dialogue continuation id from the previous turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResponse {
    pub text: String,
    /// The device should keep listening for a follow-up
    #[serde(default)]
    pub require_more_input: bool,
    pub session_id: String,
    #[serde(default, deserialize_with = "directives::deserialize_lenient")]
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResponse {
    pub audio: Bytes,
    pub format: AudioFormat,
}

// =============================================================================
// Traits
// =============================================================================

/// Live recognition session. Chunks are the raw device audio.
pub trait RecognitionSession: Send {
    fn transcribe_chunk(&mut self, chunk: Bytes) -> BackendResult<()>;

    /// Stop the session. Results may still be drained from the stream.
    fn close(&mut self);
}

/// A started recognition session and the channel its results arrive on.
pub struct RecognitionStream {
    pub session: Box<dyn RecognitionSession>,
    pub results: mpsc::UnboundedReceiver<RecognitionResult>,
}

#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn start_transcribing(&self, format: AudioFormat) -> BackendResult<RecognitionStream>;
}

/// Live metadata capture over the raw device audio.
#[async_trait]
pub trait MetadataSession: Send {
    fn process_chunk(&mut self, chunk: Bytes) -> BackendResult<()>;

    /// Finish capturing and return the collected metadata.
    async fn finish(self: Box<Self>) -> BackendResult<Metadata>;
}

#[async_trait]
pub trait AudioMetadataBackend: Send + Sync {
    async fn start_capturing(&self, format: AudioFormat) -> BackendResult<Box<dyn MetadataSession>>;
}

#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    async fn process(&self, request: ProcessingRequest) -> BackendResult<ProcessingResponse>;
}

#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> BackendResult<SynthesisResponse>;
}

/// The backend set one connection works with.
#[derive(Clone)]
pub struct Backends {
    pub recognition: Arc<dyn RecognitionBackend>,
    pub audio_metadata: Arc<dyn AudioMetadataBackend>,
    pub processing: Arc<dyn ProcessingBackend>,
    pub synthesis: Arc<dyn SynthesisBackend>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audio_format_parse() {
        assert_eq!("audio/opus".parse::<AudioFormat>().unwrap(), AudioFormat::Opus);
        assert_eq!("AUDIO/MPEG".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("audio/wav".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_merge_later_keys_win() {
        let mut base = json!({"age": "adult", "room": "kitchen"})
            .as_object()
            .cloned()
            .unwrap();
        let overlay = json!({"age": "child", "gender": "female"})
            .as_object()
            .cloned()
            .unwrap();
        merge_metadata(&mut base, overlay);
        assert_eq!(
            serde_json::Value::Object(base),
            json!({"age": "child", "room": "kitchen", "gender": "female"})
        );
    }

    #[test]
    fn test_processing_request_omits_missing_session() {
        let request = ProcessingRequest {
            text: "hi".to_string(),
            session_id: None,
            metadata: Metadata::new(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"text": "hi", "metadata": {}})
        );
    }

    #[test]
    fn test_processing_response_defaults() {
        let response: ProcessingResponse =
            serde_json::from_value(json!({"text": "ok", "sessionId": "S1"})).unwrap();
        assert!(!response.require_more_input);
        assert!(response.directives.is_empty());
        assert_eq!(response.session_id, "S1");
    }
}
