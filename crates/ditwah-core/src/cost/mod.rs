//! Cost estimation and aggregation
//!
//! This module provides:
//! - A static per-model price table (USD per million tokens)
//! - Cost estimation for a single call's token usage
//! - Daily and per-model aggregation of run log records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::llm::Usage;
use crate::runlog::CallRecord;

/// Pricing information for a model (per million tokens)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model identifier
    pub model: String,
    /// Cost per million input tokens in USD
    pub input_price_per_million: f64,
    /// Cost per million output tokens in USD
    pub output_price_per_million: f64,
}

impl ModelPricing {
    /// Create new model pricing
    pub fn new(model: impl Into<String>, input_price: f64, output_price: f64) -> Self {
        Self {
            model: model.into(),
            input_price_per_million: input_price,
            output_price_per_million: output_price,
        }
    }

    /// Calculate (input, output) cost for given token usage
    pub fn calculate_cost(&self, usage: &Usage) -> (f64, f64) {
        let input_cost =
            (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_price_per_million;
        let output_cost =
            (usage.completion_tokens as f64 / 1_000_000.0) * self.output_price_per_million;
        (input_cost, output_cost)
    }
}

/// Price table keyed by model identifier
#[derive(Debug, Clone)]
pub struct PriceTable {
    pricing: HashMap<String, ModelPricing>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut pricing = HashMap::new();
        for entry in [
            // OpenAI
            ModelPricing::new("gpt-4o-mini", 0.15, 0.60),
            ModelPricing::new("gpt-4o", 2.50, 10.0),
            // Google
            ModelPricing::new("gemini-1.5-flash", 0.075, 0.30),
            ModelPricing::new("gemini-1.5-pro", 1.25, 5.0),
            // Groq
            ModelPricing::new("llama-3.1-8b-instant", 0.05, 0.08),
            ModelPricing::new("llama-3.3-70b-versatile", 0.59, 0.79),
        ] {
            pricing.insert(entry.model.clone(), entry);
        }
        Self { pricing }
    }
}

impl PriceTable {
    /// Add or replace pricing for a model
    pub fn add_pricing(&mut self, pricing: ModelPricing) {
        self.pricing.insert(pricing.model.clone(), pricing);
    }

    /// Get pricing for a model, returns None if unknown
    pub fn get_pricing(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(model)
    }

    /// Estimated cost in USD; unknown models cost nothing
    pub fn estimate(&self, model: &str, usage: &Usage) -> f64 {
        self.pricing
            .get(model)
            .map(|p| {
                let (input, output) = p.calculate_cost(usage);
                input + output
            })
            .unwrap_or(0.0)
    }

    /// All entries sorted by model name
    pub fn entries(&self) -> Vec<&ModelPricing> {
        let mut entries: Vec<_> = self.pricing.values().collect();
        entries.sort_by(|a, b| a.model.cmp(&b.model));
        entries
    }
}

/// Cost summary for a specific model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCostSummary {
    /// Model identifier
    pub model: String,
    /// Total cost in USD
    pub total_cost_usd: f64,
    /// Total input tokens
    pub total_input_tokens: u64,
    /// Total output tokens
    pub total_output_tokens: u64,
    /// Number of calls
    pub call_count: u32,
    /// Number of failed calls
    pub failed_calls: u32,
}

impl ModelCostSummary {
    /// Create a new empty model summary
    pub fn new(model: String) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Add a call record to this summary
    pub fn add(&mut self, record: &CallRecord) {
        self.total_cost_usd += record.cost_estimate_usd;
        self.total_input_tokens += record.prompt_tokens as u64;
        self.total_output_tokens += record.completion_tokens as u64;
        self.call_count += 1;
        if !record.is_ok() {
            self.failed_calls += 1;
        }
    }
}

/// Daily cost summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCostSummary {
    /// The date for this summary
    pub date: NaiveDate,
    /// Total cost in USD
    pub total_cost_usd: f64,
    /// Total input tokens
    pub total_input_tokens: u64,
    /// Total output tokens
    pub total_output_tokens: u64,
    /// Number of LLM calls
    pub call_count: u32,
    /// Breakdown by model
    pub by_model: BTreeMap<String, ModelCostSummary>,
}

impl DailyCostSummary {
    /// Create a new empty daily summary
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_cost_usd: 0.0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            call_count: 0,
            by_model: BTreeMap::new(),
        }
    }

    /// Add a call record to this summary
    pub fn add(&mut self, record: &CallRecord) {
        self.total_cost_usd += record.cost_estimate_usd;
        self.total_input_tokens += record.prompt_tokens as u64;
        self.total_output_tokens += record.completion_tokens as u64;
        self.call_count += 1;

        self.by_model
            .entry(record.model.clone())
            .or_insert_with(|| ModelCostSummary::new(record.model.clone()))
            .add(record);
    }
}

/// Aggregate over a whole run log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostReport {
    pub days: BTreeMap<NaiveDate, DailyCostSummary>,
    pub total_cost_usd: f64,
    pub total_calls: u32,
    pub failed_calls: u32,
    pub total_attempts: u64,
}

impl CostReport {
    /// Build a report from call records
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CallRecord>) -> Self {
        let mut report = Self::default();
        for record in records {
            report.add(record);
        }
        report
    }

    /// Add a call record to the report
    pub fn add(&mut self, record: &CallRecord) {
        let date = record.timestamp.date_naive();
        self.days
            .entry(date)
            .or_insert_with(|| DailyCostSummary::new(date))
            .add(record);

        self.total_cost_usd += record.cost_estimate_usd;
        self.total_calls += 1;
        self.total_attempts += record.attempts as u64;
        if !record.is_ok() {
            self.failed_calls += 1;
        }
    }

    /// Whether any calls were recorded
    pub fn is_empty(&self) -> bool {
        self.total_calls == 0
    }
}
