//! Processing over a plain JSON HTTP endpoint.
//!
//! Request body is [`ProcessingRequest`] in camelCase. The endpoint replies
//! with `{success, text, requireMoreInput, sessionId, directives}`; an
//! unsuccessful reply is turned into a spoken apology.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::backends::base::{
    BackendError, BackendResult, ProcessingBackend, ProcessingRequest, ProcessingResponse,
};
use crate::protocol::{Directive, directives};

/// Text spoken when the endpoint reports a failure.
pub const FALLBACK_REPLY: &str = "Failed to process your request";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpProcessorReply {
    #[serde(default)]
    success: bool,
    text: Option<String>,
    #[serde(default)]
    require_more_input: bool,
    session_id: Option<String>,
    #[serde(default, deserialize_with = "directives::deserialize_lenient")]
    directives: Vec<Directive>,
}

pub struct HttpProcessingBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpProcessingBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ProcessingBackend for HttpProcessingBackend {
    async fn process(&self, request: ProcessingRequest) -> BackendResult<ProcessingResponse> {
        info!(
            url = %self.url,
            text = %request.text,
            session_id = ?request.session_id,
            "Processor request"
        );

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Processor returned HTTP {status}"
            )));
        }

        let reply: HttpProcessorReply = response.json().await?;
        if !reply.success {
            warn!(url = %self.url, "Processor reported failure");
            return Ok(ProcessingResponse {
                text: FALLBACK_REPLY.to_string(),
                require_more_input: false,
                session_id: Uuid::new_v4().to_string(),
                directives: Vec::new(),
            });
        }

        let (Some(text), Some(session_id)) = (reply.text, reply.session_id) else {
            return Err(BackendError::InvalidResponse(
                "Successful processor reply without text or sessionId".to_string(),
            ));
        };
        info!(
            text = %text,
            require_more_input = reply.require_more_input,
            session_id = %session_id,
            directives = reply.directives.len(),
            "Processor response"
        );

        Ok(ProcessingResponse {
            text,
            require_more_input: reply.require_more_input,
            session_id,
            directives: reply.directives,
        })
    }
}
