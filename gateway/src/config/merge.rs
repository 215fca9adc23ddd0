use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Overwrite `config` with every value present in `yaml`.
pub(super) fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(path) = server.uniproxy_path {
            config.uniproxy_path = path;
        }
        if let Some(seconds) = server.idle_timeout_seconds {
            config.idle_timeout_seconds = seconds;
        }
        if let Some(seconds) = server.session_watchdog_seconds {
            config.session_watchdog_seconds = Some(seconds);
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else if let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path) {
                config.tls = Some(TlsConfig {
                    cert_path: PathBuf::from(cert),
                    key_path: PathBuf::from(key),
                });
            }
        }
    }

    if let Some(origins) = yaml.security.and_then(|s| s.cors_allowed_origins) {
        config.cors_allowed_origins = Some(origins);
    }

    let Some(backends) = yaml.backends else {
        return;
    };

    if let Some(stt) = backends.stt {
        let target = &mut config.stt;
        if let Some(kind) = stt.kind {
            target.kind = kind;
        }
        if let Some(url) = stt.gigaam_url {
            target.gigaam_url = url;
        }
        if let Some(text) = stt.dummy_text {
            target.dummy_text = text;
        }
        if let Some(chunks) = stt.dummy_chunks {
            target.dummy_chunks = chunks;
        }
    }

    if let Some(metadata) = backends.audio_metadata {
        if let Some(kind) = metadata.kind {
            config.audio_metadata.kind = kind;
        }
        if let Some(urls) = metadata.urls {
            config.audio_metadata.urls = urls;
        }
    }

    if let Some(processor) = backends.processor {
        let target = &mut config.processor;
        if let Some(kind) = processor.kind {
            target.kind = kind;
        }
        if let Some(url) = processor.basic_url {
            target.basic_url = url;
        }
        if let Some(url) = processor.openai_base_url {
            target.openai_base_url = url;
        }
        if processor.openai_api_key.is_some() {
            target.openai_api_key = processor.openai_api_key;
        }
        if let Some(model) = processor.openai_model {
            target.openai_model = model;
        }
    }

    if let Some(tts) = backends.tts {
        let target = &mut config.tts;
        if let Some(kind) = tts.kind {
            target.kind = kind;
        }
        if let Some(file) = tts.dummy_file {
            target.dummy_file = Some(PathBuf::from(file));
        }
        if let Some(url) = tts.openai_base_url {
            target.openai_base_url = url;
        }
        if tts.openai_api_key.is_some() {
            target.openai_api_key = tts.openai_api_key;
        }
        if let Some(model) = tts.openai_model {
            target.openai_model = model;
        }
        if let Some(voice) = tts.openai_voice {
            target.openai_voice = voice;
        }
        if let Some(speed) = tts.openai_speed {
            target.openai_speed = speed;
        }
    }
}
