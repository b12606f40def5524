use std::str::FromStr;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::tracking::domain::effect_event::EffectEvent;

/// Framing of records on the upstream wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// One JSON object per line, `\r\n` terminated. Works for sockets and
    /// log files alike.
    #[default]
    JsonLines,
    /// 4-byte big-endian length followed by the JSON bytes.
    LengthPrefixed,
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown wire format '{0}', expected json-lines or length-prefixed")]
pub struct UnknownWireFormat(String);

impl FromStr for WireFormat {
    type Err = UnknownWireFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json-lines" | "jsonl" => Ok(WireFormat::JsonLines),
            "length-prefixed" => Ok(WireFormat::LengthPrefixed),
            other => Err(UnknownWireFormat(other.to_string())),
        }
    }
}

/// A flat key/value record as sent to the downstream consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamRecord {
    fields: Map<String, Value>,
}

impl UpstreamRecord {
    pub fn from_event(event: &EffectEvent) -> Self {
        let mut fields = Map::new();
        fields.insert("mode".into(), Value::from(event.kind()));
        if let Some(bbox) = event.bbox() {
            fields.insert("box".into(), box_value(bbox));
        }
        match event {
            EffectEvent::EffectStart { timings, .. } => {
                fields.insert(
                    "time".into(),
                    json!([
                        timings.start.as_secs_f64(),
                        timings.run.as_secs_f64(),
                        timings.abort.as_secs_f64()
                    ]),
                );
            }
            EffectEvent::EffectAbort { abort } => {
                fields.insert("time".into(), json!([abort.as_secs_f64()]));
            }
            EffectEvent::EffectRun { .. } | EffectEvent::CameraMoving => {}
        }
        Self { fields }
    }

    /// Sibling record carrying a freshly extracted face image.
    pub fn face(encoded_image: String) -> Self {
        let mut fields = Map::new();
        fields.insert("face".into(), Value::from(encoded_image));
        Self { fields }
    }

    pub fn with_frame(mut self, encoded_frame: String) -> Self {
        self.fields.insert("frame".into(), Value::from(encoded_frame));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    pub fn encode(&self, format: WireFormat) -> Result<Vec<u8>, serde_json::Error> {
        let json = self.to_json()?;
        Ok(match format {
            WireFormat::JsonLines => {
                let mut bytes = json.into_bytes();
                bytes.extend_from_slice(b"\r\n");
                bytes
            }
            WireFormat::LengthPrefixed => {
                let mut bytes = Vec::with_capacity(4 + json.len());
                bytes.extend_from_slice(&(json.len() as u32).to_be_bytes());
                bytes.extend_from_slice(json.as_bytes());
                bytes
            }
        })
    }
}

fn box_value(bbox: &BoundingBox) -> Value {
    json!(bbox.to_array())
}
