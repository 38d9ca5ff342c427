//! Routing types: techniques, tiers and call parameters

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::llm::Provider;

/// Model capability tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Small, fast, cheap model
    General,
    /// Larger model for multi-step reasoning
    Reason,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::General => write!(f, "general"),
            Tier::Reason => write!(f, "reason"),
        }
    }
}

/// Labelled task category used to pick a model and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// Few-shot message classification
    Classification,
    /// Repeated sampling to compare temperatures
    TemperatureProbe,
    /// Chain-of-thought priority scoring
    CotReasoning,
    /// Tree-of-thought route planning
    TotReasoning,
    /// Structured JSON extraction
    Extraction,
    /// Condensing an over-budget message
    Summarization,
    /// Anything else
    General,
}

impl Technique {
    /// All techniques, in display order
    pub const ALL: [Technique; 7] = [
        Technique::Classification,
        Technique::TemperatureProbe,
        Technique::CotReasoning,
        Technique::TotReasoning,
        Technique::Extraction,
        Technique::Summarization,
        Technique::General,
    ];

    /// Label used in config, logs and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Classification => "classification",
            Technique::TemperatureProbe => "temperature_probe",
            Technique::CotReasoning => "cot_reasoning",
            Technique::TotReasoning => "tot_reasoning",
            Technique::Extraction => "extraction",
            Technique::Summarization => "summarization",
            Technique::General => "general",
        }
    }

    /// Accepted alternative labels
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Technique::Classification => &["few_shot"],
            Technique::CotReasoning => &["reasoning"],
            Technique::Extraction => &["json_extract"],
            Technique::Summarization => &["overflow_summarize"],
            _ => &[],
        }
    }

    /// Model tier the technique runs on
    pub fn tier(&self) -> Tier {
        match self {
            Technique::CotReasoning | Technique::TotReasoning => Tier::Reason,
            _ => Tier::General,
        }
    }

    /// Default call parameters
    pub fn default_params(&self) -> CallParams {
        match self {
            Technique::Classification => CallParams::new(0.0, 100),
            Technique::TemperatureProbe => CallParams::new(1.0, 200),
            Technique::CotReasoning => CallParams::new(0.0, 800),
            Technique::TotReasoning => CallParams::new(0.0, 1200),
            Technique::Extraction => CallParams::new(0.0, 300).json(),
            Technique::Summarization => CallParams::new(0.0, 150),
            Technique::General => CallParams::new(0.7, 256),
        }
    }
}

impl std::fmt::Display for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Technique {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase().replace('-', "_");
        Technique::ALL
            .into_iter()
            .find(|t| t.as_str() == label || t.aliases().contains(&label.as_str()))
            .ok_or_else(|| Error::UnknownTechnique(s.trim().to_string()))
    }
}

/// Sampling parameters for one call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallParams {
    pub temperature: f32,
    pub max_tokens: usize,
    pub json_mode: bool,
}

impl CallParams {
    pub fn new(temperature: f32, max_tokens: usize) -> Self {
        Self {
            temperature,
            max_tokens,
            json_mode: false,
        }
    }

    /// Request a JSON object response
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Caller-supplied parameter overrides
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamOverrides {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl ParamOverrides {
    pub fn temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: None,
        }
    }

    pub fn max_tokens(max_tokens: usize) -> Self {
        Self {
            temperature: None,
            max_tokens: Some(max_tokens),
        }
    }

    /// Layer the overrides on top of defaults
    pub fn apply(&self, params: CallParams) -> CallParams {
        CallParams {
            temperature: self.temperature.unwrap_or(params.temperature),
            max_tokens: self.max_tokens.unwrap_or(params.max_tokens),
            json_mode: params.json_mode,
        }
    }
}

/// Result of routing a technique
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub provider: Provider,
    pub model: String,
    pub technique: Technique,
    pub tier: Tier,
    pub params: CallParams,
}
