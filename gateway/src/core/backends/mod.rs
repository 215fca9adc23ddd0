//! Backend contracts and the built-in adapters.
//!
//! Each service has a kind selected by configuration:
//!
//! | Service | Kinds |
//! |---|---|
//! | recognition | `dummy`, `gigaam` |
//! | audio metadata | `dummy`, `buffered` |
//! | processing | `dummy`, `basic`, `openai` |
//! | synthesis | `dummy`, `openai` |

pub mod base;
pub mod metadata {
    pub mod buffered;
    pub mod dummy;
}
pub mod processing {
    pub mod dummy;
    pub mod http;
    pub mod openai;
}
pub mod recognition {
    pub mod dummy;
    pub mod gigaam;
}
pub mod synthesis {
    pub mod dummy;
    pub mod openai;
}

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

pub use base::{
    AudioFormat, AudioMetadataBackend, BackendError, BackendResult, Backends, Metadata,
    MetadataSession, ProcessingBackend, ProcessingRequest, ProcessingResponse,
    RecognitionBackend, RecognitionResult, RecognitionSession, RecognitionStream,
    SynthesisBackend, SynthesisRequest, SynthesisResponse, merge_metadata,
};

use crate::config::ServerConfig;
use crate::core::codec::{DecoderFactory, default_decoder_factory};

macro_rules! backend_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($label)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = BackendError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($label $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(BackendError::InvalidConfiguration(format!(
                        concat!("Unsupported ", stringify!($name), ": {}. Supported: ", $($label, " "),+),
                        s
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = BackendError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

backend_kind! {
    /// Speech recognition implementation
    RecognitionBackendKind { Dummy => "dummy", GigaAm => "gigaam" | "giga-am" }
}

backend_kind! {
    /// Audio metadata capture implementation
    MetadataBackendKind { Dummy => "dummy", Buffered => "buffered" }
}

backend_kind! {
    /// Request processing implementation
    ProcessingBackendKind { Dummy => "dummy", Http => "basic" | "http", OpenAi => "openai" }
}

backend_kind! {
    /// Speech synthesis implementation
    SynthesisBackendKind { Dummy => "dummy", OpenAi => "openai" }
}

/// Build the backend set selected by `config`.
pub fn create_backends(config: &ServerConfig) -> BackendResult<Backends> {
    create_backends_with(config, default_decoder_factory())
}

/// Build the backend set with an explicit Opus decoder factory.
///
/// Fails when a backend that decodes device audio is selected but
/// `decoders` cannot decode anything.
pub fn create_backends_with(
    config: &ServerConfig,
    decoders: Arc<dyn DecoderFactory>,
) -> BackendResult<Backends> {
    if !decoders.is_available() {
        if config.stt.kind == RecognitionBackendKind::GigaAm {
            return Err(BackendError::InvalidConfiguration(format!(
                "STT backend {} needs Opus decoding, rebuild with the `opus` feature",
                config.stt.kind
            )));
        }
        if config.audio_metadata.kind == MetadataBackendKind::Buffered {
            return Err(BackendError::InvalidConfiguration(format!(
                "Audio metadata backend {} needs Opus decoding, rebuild with the `opus` feature",
                config.audio_metadata.kind
            )));
        }
    }

    let recognition: Arc<dyn RecognitionBackend> = match config.stt.kind {
        RecognitionBackendKind::Dummy => Arc::new(recognition::dummy::DummyRecognitionBackend::new(
            config.stt.dummy_text.clone(),
            config.stt.dummy_chunks,
        )),
        RecognitionBackendKind::GigaAm => Arc::new(
            recognition::gigaam::GigaAmRecognitionBackend::new(
                config.stt.gigaam_url.clone(),
                decoders.clone(),
            ),
        ),
    };

    let audio_metadata: Arc<dyn AudioMetadataBackend> = match config.audio_metadata.kind {
        MetadataBackendKind::Dummy => Arc::new(metadata::dummy::DummyMetadataBackend),
        MetadataBackendKind::Buffered => Arc::new(metadata::buffered::BufferedMetadataBackend::new(
            config.audio_metadata.urls.clone(),
            decoders,
        )),
    };

    let processing: Arc<dyn ProcessingBackend> = match config.processor.kind {
        ProcessingBackendKind::Dummy => {
            Arc::new(processing::dummy::DummyProcessingBackend::default())
        }
        ProcessingBackendKind::Http => Arc::new(processing::http::HttpProcessingBackend::new(
            config.processor.basic_url.clone(),
        )),
        ProcessingBackendKind::OpenAi => Arc::new(processing::openai::OpenAiProcessingBackend::new(
            config.processor.openai_base_url.clone(),
            config.processor.openai_api_key.clone().unwrap_or_default(),
            config.processor.openai_model.clone(),
        )),
    };

    let synthesis: Arc<dyn SynthesisBackend> = match config.tts.kind {
        SynthesisBackendKind::Dummy => Arc::new(synthesis::dummy::DummySynthesisBackend::new(
            config.tts.dummy_file.clone(),
        )),
        SynthesisBackendKind::OpenAi => Arc::new(synthesis::openai::OpenAiSynthesisBackend::new(
            synthesis::openai::OpenAiSynthesisConfig {
                base_url: config.tts.openai_base_url.clone(),
                api_key: config.tts.openai_api_key.clone().unwrap_or_default(),
                model: config.tts.openai_model.clone(),
                voice: config.tts.openai_voice.clone(),
                speed: config.tts.openai_speed,
            },
        )),
    };

    info!(
        stt = %config.stt.kind,
        audio_metadata = %config.audio_metadata.kind,
        processor = %config.processor.kind,
        tts = %config.tts.kind,
        "Backends configured"
    );

    Ok(Backends {
        recognition,
        audio_metadata,
        processing,
        synthesis,
    })
}
