//! Opus frame decoder seam.
//!
//! [`CodecStreamProcessor`](super::CodecStreamProcessor) builds one decoder
//! per stream through a [`DecoderFactory`] right after the identification
//! header is read. The libopus-backed factory is compiled in with the `opus`
//! cargo feature.

use std::sync::Arc;

use bytes::Bytes;

use super::{CodecResult, OpusHead};

/// Sample rates libopus can decode at.
pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

/// Longest Opus frame is 120 ms.
pub const MAX_FRAME_MS: u32 = 120;

/// Decodes single Opus packets into 16-bit little-endian PCM.
pub trait FrameDecoder: Send {
    fn decode(&mut self, packet: &[u8]) -> CodecResult<Bytes>;
}

/// Builds a decoder bound to a stream's identification header.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, head: &OpusHead) -> CodecResult<Box<dyn FrameDecoder>>;

    /// Whether [`create`](Self::create) can succeed at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Factory used by the built-in backends.
pub fn default_decoder_factory() -> Arc<dyn DecoderFactory> {
    #[cfg(feature = "opus")]
    {
        Arc::new(libopus::LibopusDecoderFactory)
    }
    #[cfg(not(feature = "opus"))]
    {
        Arc::new(UnavailableDecoderFactory)
    }
}

/// Factory that refuses every stream. Used when libopus is not linked.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDecoderFactory;

impl DecoderFactory for UnavailableDecoderFactory {
    fn create(&self, _head: &OpusHead) -> CodecResult<Box<dyn FrameDecoder>> {
        Err(super::CodecError::Decoder(
            "Opus decoding is not available, rebuild with the `opus` feature".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Samples per channel in the largest frame at `sample_rate`.
pub fn max_frame_samples(sample_rate: u32) -> usize {
    (sample_rate * MAX_FRAME_MS / 1000) as usize
}

#[cfg(feature = "opus")]
pub mod libopus {
    use bytes::{BufMut, Bytes, BytesMut};

    use super::{DecoderFactory, FrameDecoder, SUPPORTED_SAMPLE_RATES, max_frame_samples};
    use crate::core::codec::{CodecError, CodecResult, OpusHead};

    /// libopus decoder for one mono stream.
    pub struct LibopusDecoder {
        decoder: opus::Decoder,
        pcm: Vec<i16>,
    }

    impl FrameDecoder for LibopusDecoder {
        fn decode(&mut self, packet: &[u8]) -> CodecResult<Bytes> {
            let samples = self
                .decoder
                .decode(packet, &mut self.pcm, false)
                .map_err(|e| CodecError::Decoder(e.to_string()))?;

            let mut out = BytesMut::with_capacity(samples * 2);
            for sample in &self.pcm[..samples] {
                out.put_i16_le(*sample);
            }
            Ok(out.freeze())
        }
    }

    #[derive(Debug, Default, Clone, Copy)]
    pub struct LibopusDecoderFactory;

    impl DecoderFactory for LibopusDecoderFactory {
        fn create(&self, head: &OpusHead) -> CodecResult<Box<dyn FrameDecoder>> {
            if !SUPPORTED_SAMPLE_RATES.contains(&head.sample_rate) {
                return Err(CodecError::Format(format!(
                    "Unsupported decoder sample rate {}",
                    head.sample_rate
                )));
            }
            let decoder = opus::Decoder::new(head.sample_rate, opus::Channels::Mono)
                .map_err(|e| CodecError::Decoder(e.to_string()))?;
            Ok(Box::new(LibopusDecoder {
                decoder,
                pcm: vec![0; max_frame_samples(head.sample_rate)],
            }))
        }
    }

}
