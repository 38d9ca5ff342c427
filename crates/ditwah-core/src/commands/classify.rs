//! Few-shot message classification

use serde::Serialize;
use tracing::info;

use super::{BatchSummary, Outcome, skip_unless_fatal};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::prompts;
use crate::records::ClassifiedMessage;
use crate::routing::{ParamOverrides, Technique};

/// Result of classifying a list of messages
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationBatch {
    pub results: Vec<ClassifiedMessage>,
    /// Messages whose call failed
    pub failed: Vec<String>,
    pub summary: BatchSummary,
}

/// Classify one message
pub async fn classify_message(
    dispatcher: &Dispatcher,
    message: &str,
    overrides: ParamOverrides,
) -> Result<Outcome<ClassifiedMessage>> {
    let prompt = prompts::classification(message);
    let completion = dispatcher
        .dispatch_with(Technique::Classification, &prompt, overrides, false)
        .await?;
    let parsed = ClassifiedMessage::parse(message, &completion.text);
    Ok(Outcome::new(parsed, &completion))
}

/// Classify messages one after another
pub async fn classify_batch(
    dispatcher: &Dispatcher,
    messages: &[String],
    overrides: ParamOverrides,
) -> Result<ClassificationBatch> {
    let mut batch = ClassificationBatch::default();

    for (index, message) in messages.iter().enumerate() {
        match classify_message(dispatcher, message, overrides).await {
            Ok(outcome) => {
                batch.summary.add(&outcome);
                batch.results.push(outcome.value);
            }
            Err(e) => {
                skip_unless_fatal(e, index)?;
                batch.summary.add_failure();
                batch.failed.push(message.clone());
            }
        }
    }

    info!(
        classified = batch.results.len(),
        failed = batch.failed.len(),
        tokens = batch.summary.usage.total_tokens,
        "Classification batch complete"
    );

    Ok(batch)
}
