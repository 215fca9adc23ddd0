//! Uniproxy wire protocol: frame layout, control messages and directives.

pub mod directives;
pub mod framing;
pub mod messages;

pub use directives::Directive;
pub use framing::{
    CONTROL_MARKER, FrameError, InboundFrame, SERVER_STREAM_ID_BASE, StreamIdAllocator,
    decode_frame, encode_audio, encode_control,
};
