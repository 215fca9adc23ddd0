use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigResult, ServerConfig, TlsConfig};

/// Every variable read by [`load`].
#[cfg(test)]
pub(crate) const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "UNIPROXY_PATH",
    "IDLE_TIMEOUT_SECONDS",
    "SESSION_WATCHDOG_SECONDS",
    "TLS_CERT_PATH",
    "TLS_KEY_PATH",
    "CORS_ALLOWED_ORIGINS",
    "STT_BACKEND",
    "STT_GIGAAM_URL",
    "STT_DUMMY_TEXT",
    "STT_DUMMY_CHUNKS",
    "AUDIO_METADATA_BACKEND",
    "AUDIO_METADATA_URLS",
    "PROCESSOR_BACKEND",
    "PROCESSOR_BASIC_URL",
    "PROCESSOR_OPENAI_BASE_URL",
    "PROCESSOR_OPENAI_API_KEY",
    "PROCESSOR_OPENAI_MODEL",
    "TTS_BACKEND",
    "TTS_DUMMY_FILE",
    "TTS_OPENAI_BASE_URL",
    "TTS_OPENAI_API_KEY",
    "TTS_OPENAI_MODEL",
    "TTS_OPENAI_VOICE",
    "TTS_OPENAI_SPEED",
];

/// Non-empty value of an environment variable.
fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T>(key: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                message: format!("{value:?}: {e}"),
            })
        })
        .transpose()
}

/// Comma-separated list, empty entries dropped.
pub(super) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build a configuration from defaults overridden by the process environment.
pub(super) fn load() -> ConfigResult<ServerConfig> {
    let mut config = ServerConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse("PORT")? {
        config.port = port;
    }
    if let Some(path) = var("UNIPROXY_PATH") {
        config.uniproxy_path = path;
    }
    if let Some(seconds) = parse("IDLE_TIMEOUT_SECONDS")? {
        config.idle_timeout_seconds = seconds;
    }
    config.session_watchdog_seconds = parse("SESSION_WATCHDOG_SECONDS")?;
    config.cors_allowed_origins = var("CORS_ALLOWED_ORIGINS");

    config.tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Validation(
                "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
            ));
        }
    };

    let stt = &mut config.stt;
    if let Some(kind) = parse("STT_BACKEND")? {
        stt.kind = kind;
    }
    if let Some(url) = var("STT_GIGAAM_URL") {
        stt.gigaam_url = url;
    }
    if let Some(text) = var("STT_DUMMY_TEXT") {
        stt.dummy_text = text;
    }
    if let Some(chunks) = parse("STT_DUMMY_CHUNKS")? {
        stt.dummy_chunks = chunks;
    }

    let metadata = &mut config.audio_metadata;
    if let Some(kind) = parse("AUDIO_METADATA_BACKEND")? {
        metadata.kind = kind;
    }
    if let Some(urls) = var("AUDIO_METADATA_URLS") {
        metadata.urls = split_list(&urls);
    }

    let processor = &mut config.processor;
    if let Some(kind) = parse("PROCESSOR_BACKEND")? {
        processor.kind = kind;
    }
    if let Some(url) = var("PROCESSOR_BASIC_URL") {
        processor.basic_url = url;
    }
    if let Some(url) = var("PROCESSOR_OPENAI_BASE_URL") {
        processor.openai_base_url = url;
    }
    processor.openai_api_key = var("PROCESSOR_OPENAI_API_KEY");
    if let Some(model) = var("PROCESSOR_OPENAI_MODEL") {
        processor.openai_model = model;
    }

    let tts = &mut config.tts;
    if let Some(kind) = parse("TTS_BACKEND")? {
        tts.kind = kind;
    }
    tts.dummy_file = var("TTS_DUMMY_FILE").map(PathBuf::from);
    if let Some(url) = var("TTS_OPENAI_BASE_URL") {
        tts.openai_base_url = url;
    }
    tts.openai_api_key = var("TTS_OPENAI_API_KEY");
    if let Some(model) = var("TTS_OPENAI_MODEL") {
        tts.openai_model = model;
    }
    if let Some(voice) = var("TTS_OPENAI_VOICE") {
        tts.openai_voice = voice;
    }
    if let Some(speed) = parse("TTS_OPENAI_SPEED")? {
        tts.openai_speed = speed;
    }

    Ok(config)
}
