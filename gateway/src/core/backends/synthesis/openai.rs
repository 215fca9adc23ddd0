//! Synthesis through an OpenAI-compatible speech endpoint.
//!
//! - Endpoint: `POST {base_url}/audio/speech`
//! - Output: Ogg/Opus, which devices play natively
//! - Speed: 0.25 to 4.0

use async_trait::async_trait;
use serde_json::json;

use crate::core::backends::base::{
    AudioFormat, BackendError, BackendResult, SynthesisBackend, SynthesisRequest,
    SynthesisResponse,
};

pub const DEFAULT_VOICE: &str = "IVONA 2 Tatyana OEM";

#[derive(Debug, Clone)]
pub struct OpenAiSynthesisConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub speed: f32,
}

pub struct OpenAiSynthesisBackend {
    client: reqwest::Client,
    config: OpenAiSynthesisConfig,
}

impl OpenAiSynthesisBackend {
    pub fn new(config: OpenAiSynthesisConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_http_request(&self, text: &str) -> reqwest::RequestBuilder {
        let body = json!({
            "model": self.config.model,
            "input": text,
            "voice": self.config.voice,
            "response_format": "opus",
            "speed": self.config.speed,
        });

        self.client
            .post(format!(
                "{}/audio/speech",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&body)
    }
}

#[async_trait]
impl SynthesisBackend for OpenAiSynthesisBackend {
    async fn synthesize(&self, request: SynthesisRequest) -> BackendResult<SynthesisResponse> {
        let response = self.build_http_request(&request.text).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!(
                "Speech synthesis failed with HTTP {status}: {detail}"
            )));
        }

        Ok(SynthesisResponse {
            audio: response.bytes().await?,
            format: AudioFormat::Opus,
        })
    }
}
