use async_trait::async_trait;
use uuid::Uuid;

use crate::core::backends::base::{
    BackendResult, ProcessingBackend, ProcessingRequest, ProcessingResponse,
};

pub const DEFAULT_DUMMY_REPLY: &str = "Не знаю, что на это ответить";

/// Replies with a fixed text and never asks for more input.
#[derive(Debug, Clone)]
pub struct DummyProcessingBackend {
    reply: String,
}

impl DummyProcessingBackend {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for DummyProcessingBackend {
    fn default() -> Self {
        Self::new(DEFAULT_DUMMY_REPLY)
    }
}

#[async_trait]
impl ProcessingBackend for DummyProcessingBackend {
    async fn process(&self, request: ProcessingRequest) -> BackendResult<ProcessingResponse> {
        Ok(ProcessingResponse {
            text: self.reply.clone(),
            require_more_input: false,
            session_id: request
                .session_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            directives: Vec::new(),
        })
    }
}
