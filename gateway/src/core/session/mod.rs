//! Per-utterance session.
//!
//! An [`UtteranceSession`] owns one spoken request from voice-input start to
//! the synthesized reply. All of its methods are synchronous and run on the
//! connection's control loop. Backend calls run in spawned tasks that report
//! back as [`SessionEnvelope`]s on the connection's event channel; the
//! connection hands each envelope to the session it is addressed to.
//!
//! ```text
//! Idle -> Capturing -> Finalizing -> Processing -> Synthesizing -> Finished
//!            |             |             |              |
//!            +-------------+------> Cancelled <---------+
//! ```

mod utterance;

use std::fmt;

use crate::core::backends::{
    BackendError, BackendResult, Metadata, MetadataSession, ProcessingResponse,
    RecognitionResult, RecognitionStream, SynthesisResponse,
};

pub use utterance::UtteranceSession;

/// Connection-unique utterance number.
pub type UtteranceId = u64;

/// Lifecycle of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Audio is buffered or streamed into the capture backends
    Capturing,
    /// Waiting for captured metadata
    Finalizing,
    Processing,
    Synthesizing,
    Finished,
    Cancelled,
}

impl SessionState {
    /// `Finished` and `Cancelled` accept no further transitions.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::Finalizing => "finalizing",
            SessionState::Processing => "processing",
            SessionState::Synthesizing => "synthesizing",
            SessionState::Finished => "finished",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Completion of asynchronous work started by a session.
pub enum SessionEvent {
    /// Both capture backends are ready
    CaptureReady {
        recognition: RecognitionStream,
        metadata: Box<dyn MetadataSession>,
    },
    CaptureFailed(BackendError),
    Recognized(RecognitionResult),
    MetadataFinished(BackendResult<Metadata>),
    Processed(BackendResult<ProcessingResponse>),
    Synthesized(BackendResult<SynthesisResponse>),
    /// The connection's stall timer fired
    WatchdogExpired,
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::CaptureReady { .. } => f.write_str("CaptureReady"),
            SessionEvent::CaptureFailed(e) => f.debug_tuple("CaptureFailed").field(e).finish(),
            SessionEvent::Recognized(r) => f.debug_tuple("Recognized").field(r).finish(),
            SessionEvent::MetadataFinished(r) => {
                f.debug_tuple("MetadataFinished").field(r).finish()
            }
            SessionEvent::Processed(r) => f.debug_tuple("Processed").field(r).finish(),
            SessionEvent::Synthesized(r) => f
                .debug_tuple("Synthesized")
                .field(&r.as_ref().map(|s| s.audio.len()))
                .finish(),
            SessionEvent::WatchdogExpired => f.write_str("WatchdogExpired"),
        }
    }
}

/// A [`SessionEvent`] tagged with the utterance it belongs to.
#[derive(Debug)]
pub struct SessionEnvelope {
    pub utterance: UtteranceId,
    pub event: SessionEvent,
}

/// What the session tells its connection, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    Started,
    Transcribed {
        text: String,
    },
    FullyTranscribed {
        text: String,
        will_process: bool,
    },
    Processed(ProcessingResponse),
    Synthesized(SynthesisResponse),
    Cancelled,
    Finished,
}
