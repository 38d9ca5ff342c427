//! Temperature probe: how stable are answers at different temperatures?
//!
//! A scenario is sent several times at each temperature. Answers are
//! normalised and compared; the share of runs agreeing with the most common
//! answer is that temperature's consistency.

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use super::{BatchSummary, skip_unless_fatal};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::llm::Usage;
use crate::prompts;
use crate::routing::{ParamOverrides, Technique};

/// Highest temperature the providers accept
pub const MAX_TEMPERATURE: f32 = 2.0;

/// How many runs to make at which temperature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbePlan {
    pub runs: Vec<(f32, u32)>,
}

impl Default for ProbePlan {
    /// Three creative runs and one deterministic run
    fn default() -> Self {
        Self {
            runs: vec![(1.0, 3), (0.0, 1)],
        }
    }
}

impl ProbePlan {
    /// The same number of runs at every temperature
    pub fn uniform(temperatures: &[f32], iterations: u32) -> Self {
        Self {
            runs: temperatures.iter().map(|&t| (t, iterations)).collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.runs.is_empty() {
            return Err(Error::InvalidInput(
                "At least one temperature is required".to_string(),
            ));
        }
        for &(temperature, iterations) in &self.runs {
            if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
                return Err(Error::InvalidInput(format!(
                    "Temperature {} is outside 0.0..={}",
                    temperature, MAX_TEMPERATURE
                )));
            }
            if iterations == 0 {
                return Err(Error::InvalidInput(format!(
                    "Temperature {} needs at least one run",
                    temperature
                )));
            }
        }
        Ok(())
    }
}

/// One answer to the scenario
#[derive(Debug, Clone, Serialize)]
pub struct TemperatureSample {
    pub temperature: f32,
    pub iteration: u32,
    pub response: String,
    pub usage: Usage,
    pub latency_ms: u64,
}

/// Agreement between answers at one temperature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub temperature: f32,
    pub runs: u32,
    pub distinct_answers: u32,
    /// Share of runs giving the most common answer, 0.0 to 1.0
    pub consistency: f64,
}

/// Outcome of probing one scenario
#[derive(Debug, Clone, Serialize)]
pub struct TemperatureReport {
    pub scenario: String,
    pub samples: Vec<TemperatureSample>,
    pub stats: Vec<TemperatureStats>,
    pub recommended_temperature: f32,
    pub recommendation: String,
    pub summary: BatchSummary,
}

/// Probe a scenario according to the plan
pub async fn analyze(
    dispatcher: &Dispatcher,
    scenario: &str,
    plan: &ProbePlan,
) -> Result<TemperatureReport> {
    plan.validate()?;

    let prompt = prompts::temperature_probe(scenario);
    let mut samples = Vec::new();
    let mut summary = BatchSummary::default();
    let mut last_error = None;

    for &(temperature, iterations) in &plan.runs {
        for iteration in 1..=iterations {
            let result = dispatcher
                .dispatch_with(
                    Technique::TemperatureProbe,
                    &prompt,
                    ParamOverrides::temperature(temperature),
                    false,
                )
                .await;

            match result {
                Ok(completion) => {
                    let sample = TemperatureSample {
                        temperature,
                        iteration,
                        response: completion.text.trim().to_string(),
                        usage: completion.usage,
                        latency_ms: completion.meta.latency_ms,
                    };
                    summary.add(&super::Outcome::new((), &completion));
                    samples.push(sample);
                }
                Err(e) => {
                    summary.add_failure();
                    last_error = Some(e.to_string());
                    skip_unless_fatal(e, samples.len())?;
                }
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::LLMError(format!(
            "Every temperature probe failed: {}",
            last_error.unwrap_or_default()
        )));
    }

    let stats = consistency_stats(&samples);
    let (recommended_temperature, recommendation) = recommend(&stats);

    info!(
        samples = samples.len(),
        recommended_temperature,
        "Temperature analysis complete"
    );

    Ok(TemperatureReport {
        scenario: scenario.to_string(),
        samples,
        stats,
        recommended_temperature,
        recommendation,
        summary,
    })
}

/// Probe several scenarios with the same plan
pub async fn analyze_batch(
    dispatcher: &Dispatcher,
    scenarios: &[String],
    plan: &ProbePlan,
) -> Result<Vec<TemperatureReport>> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for (index, scenario) in scenarios.iter().enumerate() {
        match analyze(dispatcher, scenario, plan).await {
            Ok(report) => reports.push(report),
            Err(e) => skip_unless_fatal(e, index)?,
        }
    }
    Ok(reports)
}

/// The temperature most scenarios recommended; ties go to the lowest
pub fn overall_recommendation(reports: &[TemperatureReport]) -> Option<f32> {
    let mut votes: Vec<(f32, usize)> = Vec::new();
    for report in reports {
        match votes
            .iter_mut()
            .find(|(t, _)| *t == report.recommended_temperature)
        {
            Some((_, count)) => *count += 1,
            None => votes.push((report.recommended_temperature, 1)),
        }
    }
    votes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.total_cmp(&b.0)));
    votes.first().map(|(t, _)| *t)
}

/// Lowercase, collapse whitespace and drop surrounding punctuation
pub fn normalize_answer(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Per-temperature agreement, in plan order
pub fn consistency_stats(samples: &[TemperatureSample]) -> Vec<TemperatureStats> {
    let mut order: Vec<f32> = Vec::new();
    let mut answers: HashMap<u32, Vec<String>> = HashMap::new();

    for sample in samples {
        let key = sample.temperature.to_bits();
        if !answers.contains_key(&key) {
            order.push(sample.temperature);
        }
        answers
            .entry(key)
            .or_default()
            .push(normalize_answer(&sample.response));
    }

    order
        .into_iter()
        .map(|temperature| {
            let runs = answers.get(&temperature.to_bits()).cloned().unwrap_or_default();
            let mut counts: HashMap<&str, u32> = HashMap::new();
            for answer in &runs {
                *counts.entry(answer.as_str()).or_insert(0) += 1;
            }
            let most_common = counts.values().copied().max().unwrap_or(0);
            TemperatureStats {
                temperature,
                runs: runs.len() as u32,
                distinct_answers: counts.len() as u32,
                consistency: if runs.is_empty() {
                    0.0
                } else {
                    most_common as f64 / runs.len() as f64
                },
            }
        })
        .collect()
}

/// Most consistent temperature, lowest on ties, with a readable rationale
fn recommend(stats: &[TemperatureStats]) -> (f32, String) {
    let best = stats.iter().max_by(|a, b| {
        a.consistency
            .total_cmp(&b.consistency)
            .then(b.temperature.total_cmp(&a.temperature))
    });

    match best {
        Some(best) => (
            best.temperature,
            format!(
                "Use temperature {:.1}: {:.0}% of {} runs agreed ({} distinct answers). \
                 Crisis routing needs repeatable answers.",
                best.temperature,
                best.consistency * 100.0,
                best.runs,
                best.distinct_answers
            ),
        ),
        None => (0.0, "No samples collected; defaulting to temperature 0.0".to_string()),
    }
}
