//! Processing through an OpenAI-compatible chat completions endpoint.
//!
//! Every request is a fresh single-message conversation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::backends::base::{
    BackendError, BackendResult, ProcessingBackend, ProcessingRequest, ProcessingResponse,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiProcessingBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProcessingBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProcessingBackend for OpenAiProcessingBackend {
    async fn process(&self, request: ProcessingRequest) -> BackendResult<ProcessingResponse> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.text}],
        });

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!(
                "Chat completion failed with HTTP {status}: {detail}"
            )));
        }

        let completion: ChatCompletion = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(ProcessingResponse {
            text,
            require_more_input: false,
            session_id: Uuid::new_v4().to_string(),
            directives: Vec::new(),
        })
    }
}
