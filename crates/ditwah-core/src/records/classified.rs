//! Classified message records

use serde::{Deserialize, Serialize};

/// What the sender is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    Rescue,
    Supply,
    Info,
    Other,
}

impl Intent {
    /// Map a model label to an intent; anything unrecognised is `Other`
    pub fn from_label(label: &str) -> Self {
        match clean_word(label).to_lowercase().as_str() {
            "rescue" => Intent::Rescue,
            "supply" | "supplies" => Intent::Supply,
            "info" | "information" => Intent::Info,
            _ => Intent::Other,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Rescue => write!(f, "Rescue"),
            Intent::Supply => write!(f, "Supply"),
            Intent::Info => write!(f, "Info"),
            Intent::Other => write!(f, "Other"),
        }
    }
}

/// Urgency of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Low,
}

impl Priority {
    /// Map a model label to a priority; anything but "high" is `Low`
    pub fn from_label(label: &str) -> Self {
        if clean_word(label).eq_ignore_ascii_case("high") {
            Priority::High
        } else {
            Priority::Low
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

/// A message with the labels the model assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMessage {
    pub message: String,
    pub district: Option<String>,
    pub intent: Intent,
    pub priority: Priority,
    pub raw_output: String,
}

impl ClassifiedMessage {
    /// Parse `District: X | Intent: Y | Priority: Z`
    ///
    /// Missing fields fall back to no district, `Other` and `Low`.
    pub fn parse(message: impl Into<String>, output: &str) -> Self {
        let output = output.trim();

        let district = field(output, "District:")
            .map(|raw| raw.lines().next().unwrap_or("").trim().to_string())
            .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("none"));

        let intent = field(output, "Intent:")
            .map(first_word)
            .map(Intent::from_label)
            .unwrap_or(Intent::Other);

        let priority = after(output, "Priority:")
            .map(first_word)
            .map(Priority::from_label)
            .unwrap_or(Priority::Low);

        Self {
            message: message.into(),
            district,
            intent,
            priority,
            raw_output: output.to_string(),
        }
    }

    /// District label for reports
    pub fn district_label(&self) -> &str {
        self.district.as_deref().unwrap_or("None")
    }
}

/// Text following `key`, up to the next `|`
fn field<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    after(output, key).map(|rest| rest.split('|').next().unwrap_or("").trim())
}

fn after<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.find(key).map(|idx| output[idx + key.len()..].trim())
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

fn clean_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}
