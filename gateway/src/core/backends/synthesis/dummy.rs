use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::core::backends::base::{
    AudioFormat, BackendError, BackendResult, SynthesisBackend, SynthesisRequest,
    SynthesisResponse,
};

/// Plays a prerecorded Opus file for every reply, or silence when no file is set.
#[derive(Debug, Clone, Default)]
pub struct DummySynthesisBackend {
    file: Option<PathBuf>,
}

impl DummySynthesisBackend {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }
}

#[async_trait]
impl SynthesisBackend for DummySynthesisBackend {
    async fn synthesize(&self, request: SynthesisRequest) -> BackendResult<SynthesisResponse> {
        debug!(text = %request.text, "Dummy synthesis");
        let audio = match &self.file {
            Some(path) => tokio::fs::read(path).await.map(Bytes::from).map_err(|e| {
                BackendError::RequestFailed(format!("Failed to read {}: {e}", path.display()))
            })?,
            None => Bytes::new(),
        };
        Ok(SynthesisResponse {
            audio,
            format: AudioFormat::Opus,
        })
    }
}
