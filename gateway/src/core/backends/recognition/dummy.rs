//! Recognizer that answers with a fixed phrase after a number of chunks.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::backends::base::{
    AudioFormat, BackendError, BackendResult, RecognitionBackend, RecognitionResult,
    RecognitionSession, RecognitionStream,
};

pub const DEFAULT_DUMMY_TEXT: &str = "сколько будет два плюс два";
pub const DEFAULT_DUMMY_CHUNKS: usize = 5;

#[derive(Debug, Clone)]
pub struct DummyRecognitionBackend {
    text: String,
    chunks_before_result: usize,
    startup_delay: Duration,
}

impl DummyRecognitionBackend {
    pub fn new(text: impl Into<String>, chunks_before_result: usize) -> Self {
        Self {
            text: text.into(),
            chunks_before_result: chunks_before_result.max(1),
            startup_delay: Duration::ZERO,
        }
    }

    /// Delay session startup, mimicking a remote handshake.
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }
}

impl Default for DummyRecognitionBackend {
    fn default() -> Self {
        Self::new(DEFAULT_DUMMY_TEXT, DEFAULT_DUMMY_CHUNKS)
    }
}

#[async_trait]
impl RecognitionBackend for DummyRecognitionBackend {
    async fn start_transcribing(&self, format: AudioFormat) -> BackendResult<RecognitionStream> {
        if !self.startup_delay.is_zero() {
            tokio::time::sleep(self.startup_delay).await;
        }
        debug!(%format, "Dummy recognition session started");

        let (results_tx, results) = mpsc::unbounded_channel();
        Ok(RecognitionStream {
            session: Box::new(DummyRecognitionSession {
                text: self.text.clone(),
                remaining: self.chunks_before_result,
                results_tx: Some(results_tx),
            }),
            results,
        })
    }
}

struct DummyRecognitionSession {
    text: String,
    remaining: usize,
    results_tx: Option<mpsc::UnboundedSender<RecognitionResult>>,
}

impl RecognitionSession for DummyRecognitionSession {
    fn transcribe_chunk(&mut self, _chunk: Bytes) -> BackendResult<()> {
        let results_tx = self.results_tx.as_ref().ok_or(BackendError::SessionClosed)?;
        if self.remaining == 0 {
            return Ok(());
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            let _ = results_tx.send(RecognitionResult {
                text: self.text.clone(),
                end_of_utterance: true,
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        self.results_tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_final_result_after_configured_chunks() {
        let backend = DummyRecognitionBackend::new("hello there", 3);
        let mut stream = backend.start_transcribing(AudioFormat::Opus).await.unwrap();

        for _ in 0..2 {
            stream.session.transcribe_chunk(Bytes::from_static(b"x")).unwrap();
        }
        assert!(stream.results.try_recv().is_err());

        stream.session.transcribe_chunk(Bytes::from_static(b"x")).unwrap();
        let result = stream.results.recv().await.unwrap();
        assert_eq!(result.text, "hello there");
        assert!(result.end_of_utterance);

        // only one final result
        stream.session.transcribe_chunk(Bytes::from_static(b"x")).unwrap();
        assert!(stream.results.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_audio() {
        let backend = DummyRecognitionBackend::default();
        let mut stream = backend.start_transcribing(AudioFormat::Opus).await.unwrap();
        stream.session.close();
        assert!(matches!(
            stream.session.transcribe_chunk(Bytes::new()),
            Err(BackendError::SessionClosed)
        ));
        assert!(stream.results.recv().await.is_none());
    }
}
