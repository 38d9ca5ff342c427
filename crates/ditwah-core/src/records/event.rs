//! Crisis event records extracted from news items

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Districts the pipeline recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum District {
    Colombo,
    Gampaha,
    Kandy,
    Kalutara,
    Galle,
    Matara,
    Ratnapura,
    Other,
}

impl District {
    pub const ALL: [District; 8] = [
        District::Colombo,
        District::Gampaha,
        District::Kandy,
        District::Kalutara,
        District::Galle,
        District::Matara,
        District::Ratnapura,
        District::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            District::Colombo => "Colombo",
            District::Gampaha => "Gampaha",
            District::Kandy => "Kandy",
            District::Kalutara => "Kalutara",
            District::Galle => "Galle",
            District::Matara => "Matara",
            District::Ratnapura => "Ratnapura",
            District::Other => "Other",
        }
    }
}

impl std::fmt::Display for District {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Critical,
    Warning,
    Stable,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Critical => write!(f, "Critical"),
            EventStatus::Warning => write!(f, "Warning"),
            EventStatus::Stable => write!(f, "Stable"),
        }
    }
}

/// A validated crisis event
///
/// Only built by [`CrisisEvent::from_model_output`]; a response that fails
/// any check is rejected whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisEvent {
    pub district: District,
    #[serde(
        default,
        alias = "flood_level",
        alias = "flood_level_m",
        deserialize_with = "lenient_flood_level"
    )]
    pub flood_level_meters: Option<f64>,
    #[serde(default, deserialize_with = "lenient_victim_count")]
    pub victim_count: u32,
    pub main_need: String,
    pub status: EventStatus,
}

impl CrisisEvent {
    /// Validate a model response into an event
    pub fn from_model_output(text: &str) -> Result<Self> {
        let json = strip_code_fences(text);
        if json.is_empty() {
            return Err(Error::ValidationFailed("empty response".to_string()));
        }
        serde_json::from_str(json).map_err(|e| Error::ValidationFailed(e.to_string()))
    }

    /// JSON schema description included in extraction prompts
    pub fn schema_description() -> String {
        let districts: Vec<&str> = District::ALL.iter().map(|d| d.as_str()).collect();
        format!(
            r#"{{
  "district": one of [{}],
  "flood_level_meters": number or null,
  "victim_count": integer >= 0 (default 0),
  "main_need": string,
  "status": one of ["Critical", "Warning", "Stable"]
}}"#,
            districts
                .iter()
                .map(|d| format!("\"{}\"", d))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Remove surrounding markdown code fences (```json ... ```)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

fn lenient_flood_level<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("flood level out of range")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid flood level '{}'", s))),
        Some(other) => Err(de::Error::custom(format!("invalid flood level {}", other))),
    }
}

fn lenient_victim_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<u32, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| de::Error::custom("victim_count must be a non-negative integer"))
}
