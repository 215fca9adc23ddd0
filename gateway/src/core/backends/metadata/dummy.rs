use async_trait::async_trait;
use bytes::Bytes;

use crate::core::backends::base::{
    AudioFormat, AudioMetadataBackend, BackendResult, Metadata, MetadataSession,
};

/// Metadata backend that captures nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyMetadataBackend;

#[async_trait]
impl AudioMetadataBackend for DummyMetadataBackend {
    async fn start_capturing(&self, _format: AudioFormat) -> BackendResult<Box<dyn MetadataSession>> {
        Ok(Box::new(DummyMetadataSession))
    }
}

struct DummyMetadataSession;

#[async_trait]
impl MetadataSession for DummyMetadataSession {
    fn process_chunk(&mut self, _chunk: Bytes) -> BackendResult<()> {
        Ok(())
    }

    async fn finish(self: Box<Self>) -> BackendResult<Metadata> {
        Ok(Metadata::new())
    }
}
