//! GigaAM streaming recognizer client.
//!
//! Protocol over one WebSocket per utterance:
//! - text `{"sample_rate": <hz>}` once the Opus header page is decoded
//! - binary 16-bit LE mono PCM frames after that
//! - server replies with text `{"text": "...", "end_of_utt": bool}`
//!
//! The device Ogg/Opus stream is decoded locally before sending.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use crate::core::backends::base::{
    AudioFormat, BackendError, BackendResult, RecognitionBackend, RecognitionResult,
    RecognitionSession, RecognitionStream,
};
use crate::core::codec::{CodecEvent, CodecStreamProcessor, DecoderFactory};

/// Message from the GigaAM server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GigaAmMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub end_of_utt: bool,
}

impl From<GigaAmMessage> for RecognitionResult {
    fn from(message: GigaAmMessage) -> Self {
        RecognitionResult {
            text: message.text,
            end_of_utterance: message.end_of_utt,
        }
    }
}

pub struct GigaAmRecognitionBackend {
    endpoint: String,
    decoders: Arc<dyn DecoderFactory>,
}

impl GigaAmRecognitionBackend {
    pub fn new(endpoint: impl Into<String>, decoders: Arc<dyn DecoderFactory>) -> Self {
        Self {
            endpoint: endpoint.into(),
            decoders,
        }
    }
}

#[async_trait]
impl RecognitionBackend for GigaAmRecognitionBackend {
    async fn start_transcribing(&self, format: AudioFormat) -> BackendResult<RecognitionStream> {
        if format != AudioFormat::Opus {
            return Err(BackendError::InvalidConfiguration(format!(
                "GigaAM accepts audio/opus only, got {format}"
            )));
        }

        let (ws_stream, _response) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| BackendError::ConnectionFailed(format!("{}: {e}", self.endpoint)))?;
        info!(endpoint = %self.endpoint, "Connected to GigaAM");

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (results_tx, results) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = ws_sink.send(message).await {
                    error!("Failed to send to GigaAM: {}", e);
                    return;
                }
            }
            let _ = ws_sink.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(frame) = ws_source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<GigaAmMessage>(&text) {
                        Ok(message) => {
                            if results_tx.send(message.into()).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Unparseable GigaAM message: {}", e),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "GigaAM closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("GigaAM connection error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(RecognitionStream {
            session: Box::new(GigaAmSession {
                processor: CodecStreamProcessor::new(self.decoders.clone()),
                outgoing_tx: Some(outgoing_tx),
            }),
            results,
        })
    }
}

struct GigaAmSession {
    processor: CodecStreamProcessor,
    outgoing_tx: Option<mpsc::UnboundedSender<Message>>,
}

impl RecognitionSession for GigaAmSession {
    fn transcribe_chunk(&mut self, chunk: Bytes) -> BackendResult<()> {
        let outgoing_tx = self.outgoing_tx.as_ref().ok_or(BackendError::SessionClosed)?;

        // Events decoded before a bad page still go out
        let mut closed = false;
        let decoded = self.processor.push_chunk(&chunk, |event| {
            let message = match event {
                CodecEvent::SampleRate(rate) => {
                    Message::Text(json!({ "sample_rate": rate }).to_string().into())
                }
                CodecEvent::Audio(pcm) => Message::Binary(pcm),
            };
            closed |= outgoing_tx.send(message).is_err();
        });
        if closed {
            return Err(BackendError::SessionClosed);
        }
        decoded?;
        Ok(())
    }

    fn close(&mut self) {
        self.outgoing_tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_message() {
        let message: GigaAmMessage =
            serde_json::from_str(r#"{"text": "привет", "end_of_utt": true}"#).unwrap();
        let result: RecognitionResult = message.into();
        assert_eq!(result.text, "привет");
        assert!(result.end_of_utterance);
    }

    #[test]
    fn test_partial_message_defaults() {
        let message: GigaAmMessage = serde_json::from_str(r#"{"text": "при"}"#).unwrap();
        assert!(!message.end_of_utt);
    }
}
