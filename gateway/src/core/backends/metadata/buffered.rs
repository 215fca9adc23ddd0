//! Metadata backend that classifies the whole utterance at once.
//!
//! The Opus stream is decoded to PCM while the user speaks. On finish the
//! PCM is POSTed to every classifier URL as `application/octet-stream` with a
//! `sample_rate` query parameter; the JSON objects they return are merged in
//! URL order. A failing classifier contributes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::core::backends::base::{
    AudioFormat, AudioMetadataBackend, BackendError, BackendResult, Metadata, MetadataSession,
    merge_metadata,
};
use crate::core::codec::{CodecEvent, CodecStreamProcessor, DecoderFactory};

pub struct BufferedMetadataBackend {
    client: reqwest::Client,
    urls: Arc<[String]>,
    decoders: Arc<dyn DecoderFactory>,
}

impl BufferedMetadataBackend {
    pub fn new(urls: Vec<String>, decoders: Arc<dyn DecoderFactory>) -> Self {
        Self {
            client: reqwest::Client::new(),
            urls: urls.into(),
            decoders,
        }
    }
}

#[async_trait]
impl AudioMetadataBackend for BufferedMetadataBackend {
    async fn start_capturing(&self, format: AudioFormat) -> BackendResult<Box<dyn MetadataSession>> {
        if format != AudioFormat::Opus {
            return Err(BackendError::InvalidConfiguration(format!(
                "Buffered metadata capture accepts audio/opus only, got {format}"
            )));
        }
        Ok(Box::new(BufferedMetadataSession {
            client: self.client.clone(),
            urls: self.urls.clone(),
            processor: CodecStreamProcessor::new(self.decoders.clone()),
            pcm: BytesMut::new(),
        }))
    }
}

struct BufferedMetadataSession {
    client: reqwest::Client,
    urls: Arc<[String]>,
    processor: CodecStreamProcessor,
    pcm: BytesMut,
}

#[async_trait]
impl MetadataSession for BufferedMetadataSession {
    fn process_chunk(&mut self, chunk: Bytes) -> BackendResult<()> {
        let pcm = &mut self.pcm;
        self.processor.push_chunk(&chunk, |event| {
            if let CodecEvent::Audio(samples) = event {
                pcm.extend_from_slice(&samples);
            }
        })?;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> BackendResult<Metadata> {
        let Self {
            client,
            urls,
            processor,
            pcm,
        } = *self;
        let Some(sample_rate) = processor.sample_rate() else {
            debug!("No audio header seen, skipping classification");
            return Ok(Metadata::new());
        };

        let pcm = pcm.freeze();
        let requests = urls
            .iter()
            .map(|url| classify(&client, url, sample_rate, pcm.clone()));

        let mut merged = Metadata::new();
        for result in join_all(requests).await {
            merge_metadata(&mut merged, result);
        }
        Ok(merged)
    }
}

async fn classify(client: &reqwest::Client, url: &str, sample_rate: u32, pcm: Bytes) -> Metadata {
    match request_classification(client, url, sample_rate, pcm).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(url, "Failed to get audio metadata: {}", e);
            Metadata::new()
        }
    }
}

async fn request_classification(
    client: &reqwest::Client,
    url: &str,
    sample_rate: u32,
    pcm: Bytes,
) -> BackendResult<Metadata> {
    let response = client
        .post(url)
        .query(&[("sample_rate", sample_rate)])
        .header(CONTENT_TYPE, "application/octet-stream")
        .body(pcm)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::RequestFailed(format!("HTTP {status}")));
    }

    match response.json::<serde_json::Value>().await? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidResponse(format!(
            "Expected a JSON object, got {other}"
        ))),
    }
}
