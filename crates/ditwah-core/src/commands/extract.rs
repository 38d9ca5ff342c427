//! Structured extraction of crisis events from news items

use serde::Serialize;
use tracing::{info, warn};

use super::{BatchSummary, Outcome, skip_unless_fatal};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::prompts;
use crate::records::CrisisEvent;
use crate::routing::Technique;

/// Result of extracting events from a news feed
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionBatch {
    pub events: Vec<CrisisEvent>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub summary: BatchSummary,
}

impl ExtractionBatch {
    /// Share of items that produced a valid event, 0.0 to 1.0
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// Extract and validate one event
///
/// A reply that does not validate yields `Error::ValidationFailed`.
pub async fn extract_event(dispatcher: &Dispatcher, text: &str) -> Result<Outcome<CrisisEvent>> {
    let (outcome, validated) = extract_unvalidated(dispatcher, text).await?;
    let event = validated?;
    Ok(Outcome {
        value: event,
        usage: outcome.usage,
        cost_usd: outcome.cost_usd,
        latency_ms: outcome.latency_ms,
    })
}

async fn extract_unvalidated(
    dispatcher: &Dispatcher,
    text: &str,
) -> Result<(Outcome<()>, Result<CrisisEvent>)> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("News item is empty".to_string()));
    }
    let prompt = prompts::extraction(text);
    let completion = dispatcher.dispatch(Technique::Extraction, &prompt).await?;
    let validated = CrisisEvent::from_model_output(&completion.text);
    Ok((Outcome::new((), &completion), validated))
}

/// Extract events from news items one after another
///
/// Replies that fail validation are dropped with a warning.
pub async fn extract_batch(dispatcher: &Dispatcher, items: &[String]) -> Result<ExtractionBatch> {
    let mut batch = ExtractionBatch {
        total: items.len(),
        ..Default::default()
    };

    for (index, item) in items.iter().enumerate() {
        match extract_unvalidated(dispatcher, item).await {
            Ok((outcome, Ok(event))) => {
                batch.summary.add(&outcome);
                batch.events.push(event);
                batch.successful += 1;
            }
            Ok((outcome, Err(e))) => {
                warn!(item = index, error = %e, "Dropping invalid event");
                batch.summary.add(&outcome);
                batch.failed += 1;
            }
            Err(e) => {
                skip_unless_fatal(e, index)?;
                batch.summary.add_failure();
                batch.failed += 1;
            }
        }
    }

    info!(
        total = batch.total,
        successful = batch.successful,
        failed = batch.failed,
        success_rate = batch.success_rate(),
        "Extraction batch complete"
    );

    Ok(batch)
}
