//! Incidents, priority scores and rescue route plans

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Score assumed when the model's answer has no readable score
pub const DEFAULT_SCORE: u8 = 5;

/// Highest possible priority score
pub const MAX_SCORE: u8 = 10;

/// A reported incident awaiting prioritisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub location: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_affected: Option<u32>,
    /// Rescue, Medicine, Supply...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_info: Option<String>,
}

impl Incident {
    pub fn new(location: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            description: description.into(),
            people_affected: None,
            need_type: None,
            age_info: None,
        }
    }

    /// Parse a `location: description` line
    ///
    /// Optional details follow as `| key=value` pairs with the keys
    /// `people`, `need` and `age`, e.g.
    /// `Ja-Ela: Couple trapped | people=2 | need=Rescue | age=70s`.
    /// Unknown keys and unreadable counts are ignored. Lines without a colon
    /// get the location `Unknown`.
    pub fn parse_line(line: &str) -> Self {
        let mut parts = line.split(" | ");
        let head = parts.next().unwrap_or_default();

        let mut incident = match head.split_once(':') {
            Some((location, description)) if !location.trim().is_empty() => {
                Self::new(location.trim(), description.trim())
            }
            _ => Self::new("Unknown", head.trim()),
        };

        for detail in parts {
            let Some((key, value)) = detail.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "people" => incident.people_affected = value.parse().ok(),
                "need" => incident.need_type = Some(value.to_string()),
                "age" => incident.age_info = Some(value.to_string()),
                _ => {}
            }
        }
        incident
    }
}

/// An incident with its priority score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredIncident {
    pub incident: Incident,
    /// 0 to 10
    pub score: u8,
    pub reasoning: String,
}

/// Pull the final `Score: X/10` out of a reasoning trace
///
/// The last match wins so that intermediate mentions such as "Base Score: 5"
/// do not shadow the answer. Values are clamped to 0..=10 and unreadable
/// answers fall back to [`DEFAULT_SCORE`].
pub fn parse_score(text: &str) -> u8 {
    static SCORE: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = SCORE.get_or_init(|| {
        Regex::new(r"(?i)score\s*[:=]?\s*\**\s*(-?\d+(?:\.\d+)?)\s*\**\s*/\s*10").ok()
    });

    pattern
        .as_ref()
        .and_then(|re| re.captures_iter(text).last())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|value| value.round().clamp(0.0, MAX_SCORE as f64) as u8)
        .unwrap_or(DEFAULT_SCORE)
}

/// Strategies explored when planning a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteStrategy {
    HighestPriorityFirst,
    ClosestFirst,
    FurthestFirst,
}

impl RouteStrategy {
    pub const ALL: [RouteStrategy; 3] = [
        RouteStrategy::HighestPriorityFirst,
        RouteStrategy::ClosestFirst,
        RouteStrategy::FurthestFirst,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RouteStrategy::HighestPriorityFirst => "Highest priority first",
            RouteStrategy::ClosestFirst => "Closest location first",
            RouteStrategy::FurthestFirst => "Furthest location first",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            RouteStrategy::HighestPriorityFirst => &["branch 1", "highest priority", "greedy"],
            RouteStrategy::ClosestFirst => &["branch 2", "closest", "nearest"],
            RouteStrategy::FurthestFirst => &["branch 3", "furthest", "farthest"],
        }
    }

    /// Work out which strategy the model settled on
    ///
    /// Scans from the end for a line that states a choice and names a
    /// strategy. Defaults to highest priority first.
    pub fn from_reasoning(reasoning: &str) -> Self {
        const CHOICE_MARKERS: [&str; 7] = [
            "best", "select", "choose", "chose", "recommend", "optimal", "winner",
        ];

        for line in reasoning.lines().rev() {
            let line = line.to_lowercase();
            if !CHOICE_MARKERS.iter().any(|m| line.contains(m)) {
                continue;
            }
            let named: Vec<RouteStrategy> = Self::ALL
                .into_iter()
                .filter(|s| s.keywords().iter().any(|k| line.contains(k)))
                .collect();
            if named.len() == 1 {
                return named[0];
            }
        }
        RouteStrategy::HighestPriorityFirst
    }
}

impl std::fmt::Display for RouteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A planned rescue route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Start location followed by incident locations
    pub route: Vec<String>,
    pub strategy: RouteStrategy,
    pub reasoning: String,
    pub total_priority_score: u32,
}

impl RoutePlan {
    /// Build a plan visiting incidents by descending score
    pub fn build(start: &str, scored: &[ScoredIncident], reasoning: String) -> Self {
        let mut ordered: Vec<&ScoredIncident> = scored.iter().collect();
        ordered.sort_by(|a, b| b.score.cmp(&a.score));

        let mut route = Vec::with_capacity(ordered.len() + 1);
        route.push(start.to_string());
        route.extend(ordered.iter().map(|s| s.incident.location.clone()));

        Self {
            route,
            strategy: RouteStrategy::from_reasoning(&reasoning),
            total_priority_score: scored.iter().map(|s| s.score as u32).sum(),
            reasoning,
        }
    }
}
