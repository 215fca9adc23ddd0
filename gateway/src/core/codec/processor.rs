//! Page-level Opus stream state machine.
//!
//! Page sequence numbers drive the state:
//! - `0`: identification header, builds the decoder and reports the sample rate
//! - `1`: comment header, skipped
//! - `>= 2`: audio pages, each segment decoded as one packet
//!
//! Segments are treated as whole packets. Packets laced across several
//! segments (255+ bytes) are not reassembled; voice frames from devices fit
//! in a single segment.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::{
    CodecError, CodecResult, DecoderFactory, FrameDecoder, OggPage, OpusHead, parse_pages,
};

/// Output of the processor, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecEvent {
    /// Emitted once, before any audio
    SampleRate(u32),
    /// 16-bit little-endian mono PCM for one packet
    Audio(Bytes),
}

/// Incremental Ogg/Opus to PCM converter for one logical stream.
pub struct CodecStreamProcessor {
    factory: Arc<dyn DecoderFactory>,
    decoder: Option<Box<dyn FrameDecoder>>,
    head: Option<OpusHead>,
}

impl CodecStreamProcessor {
    pub fn new(factory: Arc<dyn DecoderFactory>) -> Self {
        Self {
            factory,
            decoder: None,
            head: None,
        }
    }

    /// Sample rate of the stream once the header page was seen.
    pub fn sample_rate(&self) -> Option<u32> {
        self.head.map(|head| head.sample_rate)
    }

    /// Demux a chunk of whole pages and process them in order.
    ///
    /// Events reach `emit` as soon as they are produced, so the ones that
    /// precede a failing page or packet are delivered before the error
    /// returns.
    pub fn push_chunk(
        &mut self,
        chunk: &Bytes,
        mut emit: impl FnMut(CodecEvent),
    ) -> CodecResult<()> {
        for page in parse_pages(chunk)? {
            self.push_page(&page, &mut emit)?;
        }
        Ok(())
    }

    pub fn push_page(
        &mut self,
        page: &OggPage,
        mut emit: impl FnMut(CodecEvent),
    ) -> CodecResult<()> {
        match page.sequence_number {
            0 => self.configure(page, &mut emit),
            1 => {
                debug!(serial = page.serial_number, "Skipping Opus comment page");
                Ok(())
            }
            _ => self.decode(page, &mut emit),
        }
    }

    fn configure(&mut self, page: &OggPage, emit: &mut impl FnMut(CodecEvent)) -> CodecResult<()> {
        let head = OpusHead::parse(&page.payload())?;

        if let Some(current) = self.head {
            if current.sample_rate != head.sample_rate {
                return Err(CodecError::State(format!(
                    "Sample rate already defined: {} (got {})",
                    current.sample_rate, head.sample_rate
                )));
            }
            return Ok(());
        }

        self.decoder = Some(self.factory.create(&head)?);
        self.head = Some(head);
        debug!(
            sample_rate = head.sample_rate,
            pre_skip = head.pre_skip,
            "Opus stream configured"
        );
        emit(CodecEvent::SampleRate(head.sample_rate));
        Ok(())
    }

    fn decode(&mut self, page: &OggPage, emit: &mut impl FnMut(CodecEvent)) -> CodecResult<()> {
        let decoder = self.decoder.as_mut().ok_or_else(|| {
            CodecError::State("Can't decode Opus without OpusHead before".to_string())
        })?;

        for segment in page.segments.iter().filter(|s| !s.is_empty()) {
            emit(CodecEvent::Audio(decoder.decode(segment)?));
        }
        Ok(())
    }
}
