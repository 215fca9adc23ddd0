use url::Url;

use super::{ConfigError, ConfigResult, ServerConfig};
use crate::core::backends::{
    MetadataBackendKind, ProcessingBackendKind, RecognitionBackendKind, SynthesisBackendKind,
};

const MIN_TTS_SPEED: f32 = 0.25;
const MAX_TTS_SPEED: f32 = 4.0;

fn validate_url(name: &str, value: &str, schemes: &[&str]) -> ConfigResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{name} is not a valid URL ({value}): {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Validation(format!(
            "{name} must use one of {schemes:?}, got {}",
            url.scheme()
        )));
    }
    Ok(())
}

/// Check the merged configuration before the server starts.
pub(super) fn validate(config: &ServerConfig) -> ConfigResult<()> {
    const HTTP: &[&str] = &["http", "https"];
    const WS: &[&str] = &["ws", "wss"];

    if config.port == 0 {
        return Err(ConfigError::Validation("port must not be 0".to_string()));
    }
    if config.idle_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "idle_timeout_seconds must be greater than 0".to_string(),
        ));
    }
    if config.session_watchdog_seconds == Some(0) {
        return Err(ConfigError::Validation(
            "session_watchdog_seconds must be greater than 0 when set".to_string(),
        ));
    }
    if !config.uniproxy_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "uniproxy_path must start with '/': {}",
            config.uniproxy_path
        )));
    }

    if config.stt.kind == RecognitionBackendKind::GigaAm {
        validate_url("STT_GIGAAM_URL", &config.stt.gigaam_url, WS)?;
    }

    if config.audio_metadata.kind == MetadataBackendKind::Buffered {
        if config.audio_metadata.urls.is_empty() {
            return Err(ConfigError::Validation(
                "buffered audio metadata backend needs at least one URL".to_string(),
            ));
        }
        for url in &config.audio_metadata.urls {
            validate_url("AUDIO_METADATA_URLS", url, HTTP)?;
        }
    }

    match config.processor.kind {
        ProcessingBackendKind::Http => {
            validate_url("PROCESSOR_BASIC_URL", &config.processor.basic_url, HTTP)?
        }
        ProcessingBackendKind::OpenAi => validate_url(
            "PROCESSOR_OPENAI_BASE_URL",
            &config.processor.openai_base_url,
            HTTP,
        )?,
        ProcessingBackendKind::Dummy => {}
    }

    if config.tts.kind == SynthesisBackendKind::OpenAi {
        validate_url("TTS_OPENAI_BASE_URL", &config.tts.openai_base_url, HTTP)?;
        let speed = config.tts.openai_speed;
        if !(MIN_TTS_SPEED..=MAX_TTS_SPEED).contains(&speed) {
            return Err(ConfigError::Validation(format!(
                "TTS_OPENAI_SPEED must be within {MIN_TTS_SPEED}..={MAX_TTS_SPEED}, got {speed}"
            )));
        }
    }

    Ok(())
}
