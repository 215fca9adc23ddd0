//! Ogg/Opus demultiplexing and decoding.
//!
//! Devices stream voice as Ogg pages carrying a single mono Opus stream.
//! [`ogg`] splits chunks into pages, [`opus`] reads the identification
//! header, and [`CodecStreamProcessor`] drives the per-stream state machine
//! that turns pages into PCM through a [`FrameDecoder`].

pub mod decoder;
pub mod ogg;
pub mod opus;
pub mod processor;

use thiserror::Error;

pub use decoder::{
    DecoderFactory, FrameDecoder, UnavailableDecoderFactory, default_decoder_factory,
};
pub use ogg::{OggPage, PageFlags, parse_pages};
pub use opus::OpusHead;
pub use processor::{CodecEvent, CodecStreamProcessor};

/// Errors raised while demultiplexing or decoding a voice stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes do not follow the container or header layout
    #[error("Format error: {0}")]
    Format(String),

    /// The call is not valid in the current stream state
    #[error("State error: {0}")]
    State(String),

    /// The codec library rejected a packet
    #[error("Decoder error: {0}")]
    Decoder(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
