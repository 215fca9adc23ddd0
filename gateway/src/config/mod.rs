//! Configuration module for the uniproxy gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use uniproxy_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::backends::processing::openai::DEFAULT_OPENAI_BASE_URL;
use crate::core::backends::recognition::dummy::{DEFAULT_DUMMY_CHUNKS, DEFAULT_DUMMY_TEXT};
use crate::core::backends::synthesis::openai::DEFAULT_VOICE;
use crate::core::backends::{
    MetadataBackendKind, ProcessingBackendKind, RecognitionBackendKind, SynthesisBackendKind,
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 31115;
pub const DEFAULT_UNIPROXY_PATH: &str = "/uniproxy.alice.yandex.net/uni.ws";
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_GIGAAM_URL: &str = "ws://127.0.0.1:8080";
pub const DEFAULT_PROCESSOR_BASIC_URL: &str = "http://localhost:8080";
pub const DEFAULT_PROCESSOR_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Speech recognition backend selection
#[derive(Debug, Clone, PartialEq)]
pub struct SttConfig {
    pub kind: RecognitionBackendKind,
    /// GigaAM streaming endpoint
    pub gigaam_url: String,
    /// Phrase reported by the dummy recognizer
    pub dummy_text: String,
    /// Chunks the dummy recognizer waits for before its result
    pub dummy_chunks: usize,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            kind: RecognitionBackendKind::default(),
            gigaam_url: DEFAULT_GIGAAM_URL.to_string(),
            dummy_text: DEFAULT_DUMMY_TEXT.to_string(),
            dummy_chunks: DEFAULT_DUMMY_CHUNKS,
        }
    }
}

/// Audio metadata backend selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioMetadataConfig {
    pub kind: MetadataBackendKind,
    /// Classifier endpoints the buffered backend posts PCM to
    pub urls: Vec<String>,
}

/// Request processing backend selection
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    pub kind: ProcessingBackendKind,
    pub basic_url: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            kind: ProcessingBackendKind::default(),
            basic_url: DEFAULT_PROCESSOR_BASIC_URL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_PROCESSOR_OPENAI_MODEL.to_string(),
        }
    }
}

/// Speech synthesis backend selection
#[derive(Debug, Clone, PartialEq)]
pub struct TtsConfig {
    pub kind: SynthesisBackendKind,
    /// Audio file returned by the dummy synthesizer
    pub dummy_file: Option<PathBuf>,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_voice: String,
    /// Playback speed, 0.25 to 4.0
    pub openai_speed: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            kind: SynthesisBackendKind::default(),
            dummy_file: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_api_key: None,
            openai_model: String::new(),
            openai_voice: DEFAULT_VOICE.to_string(),
            openai_speed: 1.0,
        }
    }
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, endpoint path, TLS)
/// - Connection and utterance timeouts
/// - Backend selection for recognition, audio metadata, processing and synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Path the device WebSocket is served on
    pub uniproxy_path: String,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,

    /// Device connections without inbound traffic for this long are closed
    pub idle_timeout_seconds: u64,
    /// Utterances still active after this long are cancelled; unset disables
    pub session_watchdog_seconds: Option<u64>,

    // Backends
    pub stt: SttConfig,
    pub audio_metadata: AudioMetadataConfig,
    pub processor: ProcessorConfig,
    pub tts: TtsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            uniproxy_path: DEFAULT_UNIPROXY_PATH.to_string(),
            tls: None,
            cors_allowed_origins: None,
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECONDS,
            session_watchdog_seconds: None,
            stt: SttConfig::default(),
            audio_metadata: AudioMetadataConfig::default(),
            processor: ProcessorConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded by `main` before this runs, so its values are
    /// visible here unless overridden by the actual environment.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> ConfigResult<Self> {
        let config = env::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> ConfigResult<Self> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = env::load()?;
        merge::apply_yaml(&mut config, yaml_config);

        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn session_watchdog(&self) -> Option<Duration> {
        self.session_watchdog_seconds.map(Duration::from_secs)
    }
}
