pub mod backends;
pub mod codec;
pub mod session;

// Re-export commonly used types for convenience
pub use backends::{
    AudioFormat, BackendError, BackendResult, Backends, Metadata, ProcessingResponse,
    SynthesisResponse, create_backends,
};
pub use codec::{CodecError, CodecEvent, CodecResult, CodecStreamProcessor, OggPage, OpusHead};
pub use session::{
    SessionEnvelope, SessionEvent, SessionNotification, SessionState, UtteranceId,
    UtteranceSession,
};
