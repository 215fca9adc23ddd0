//! Client-side actions returned by the processing backend.

use std::collections::BTreeMap;

use prost_types::{Struct, Value, value::Kind};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::messages::DirectiveMessage;

const CLIENT_ACTION: &str = "client_action";

/// Device volume range.
pub const MAX_SOUND_LEVEL: f64 = 10.0;

/// Structured action attached to an assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Directive {
    /// Set the device volume, clamped to 0..=10 on the wire
    #[serde(rename_all = "camelCase")]
    SoundSetLevel { new_level: f64 },
    SoundQuieter,
    SoundLouder,
}

impl Directive {
    /// Wire form of the directive.
    pub fn to_message(&self) -> DirectiveMessage {
        match self {
            Self::SoundSetLevel { new_level } => {
                let level = new_level.clamp(0.0, MAX_SOUND_LEVEL);
                client_action(
                    "sound_set_level",
                    Some(struct_of([
                        ("new_level", number(level)),
                        ("new_percent_level", number(level * 10.0)),
                    ])),
                )
            }
            Self::SoundLouder => client_action("sound_louder", Some(Struct::default())),
            // the device firmware expects this spelling
            Self::SoundQuieter => client_action("sound_quiter", Some(Struct::default())),
        }
    }
}

/// Deserialize a directive list, dropping entries that are not understood
/// instead of failing the whole reply.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match Directive::deserialize(&value) {
            Ok(directive) => Some(directive),
            Err(e) => {
                warn!(directive = %value, "Skipping unsupported directive: {}", e);
                None
            }
        })
        .collect())
}

/// Directive telling the device to play the pending speech on the dialog channel.
pub fn tts_play_placeholder() -> DirectiveMessage {
    client_action(
        "tts_play_placeholder",
        Some(struct_of([("channel", string("Dialog"))])),
    )
}

fn client_action(name: &str, payload: Option<Struct>) -> DirectiveMessage {
    DirectiveMessage {
        r#type: CLIENT_ACTION.to_string(),
        name: name.to_string(),
        analytics_type: name.to_string(),
        payload,
        is_led_silent: true,
    }
}

fn struct_of<const N: usize>(fields: [(&str, Value); N]) -> Struct {
    Struct {
        fields: fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn number(value: f64) -> Value {
    Value {
        kind: Some(Kind::NumberValue(value)),
    }
}

fn string(value: &str) -> Value {
    Value {
        kind: Some(Kind::StringValue(value.to_string())),
    }
}
