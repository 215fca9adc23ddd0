use serde::Deserialize;
use std::path::PathBuf;

use super::{ConfigError, ConfigResult};
use crate::core::backends::{
    MetadataBackendKind, ProcessingBackendKind, RecognitionBackendKind, SynthesisBackendKind,
};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 31115
///   uniproxy_path: "/uniproxy.alice.yandex.net/uni.ws"
///   idle_timeout_seconds: 300
///   session_watchdog_seconds: 60
///   tls:
///     cert_path: "/etc/uniproxy/cert.pem"
///     key_path: "/etc/uniproxy/key.pem"
///
/// security:
///   cors_allowed_origins: "*"
///
/// backends:
///   stt:
///     kind: gigaam
///     gigaam_url: "ws://127.0.0.1:8080"
///   audio_metadata:
///     kind: buffered
///     urls:
///       - "http://127.0.0.1:8090/classify"
///   processor:
///     kind: basic
///     basic_url: "http://localhost:8080"
///   tts:
///     kind: openai
///     openai_base_url: "http://127.0.0.1:8000"
///     openai_voice: "IVONA 2 Tatyana OEM"
///     openai_speed: 1.0
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub security: Option<SecurityYaml>,
    pub backends: Option<BackendsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub uniproxy_path: Option<String>,
    pub idle_timeout_seconds: Option<u64>,
    pub session_watchdog_seconds: Option<u64>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

/// Backend selection from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BackendsYaml {
    pub stt: Option<SttYaml>,
    pub audio_metadata: Option<AudioMetadataYaml>,
    pub processor: Option<ProcessorYaml>,
    pub tts: Option<TtsYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SttYaml {
    pub kind: Option<RecognitionBackendKind>,
    pub gigaam_url: Option<String>,
    pub dummy_text: Option<String>,
    pub dummy_chunks: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioMetadataYaml {
    pub kind: Option<MetadataBackendKind>,
    pub urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProcessorYaml {
    pub kind: Option<ProcessingBackendKind>,
    pub basic_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub kind: Option<SynthesisBackendKind>,
    pub dummy_file: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_voice: Option<String>,
    pub openai_speed: Option<f32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - A field has an invalid type or an unknown backend kind
    pub fn from_file(path: &PathBuf) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
