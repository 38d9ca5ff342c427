//! Spam filter: keep oversized messages from flooding the pipeline

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{BatchSummary, Outcome, skip_unless_fatal};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::routing::{ParamOverrides, Technique};
use crate::tokens::{GuardDecision, GuardPolicy, TokenGuard};

/// What happened to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterStatus {
    Accepted,
    Truncated,
    Summarized,
    Blocked,
}

impl std::fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterStatus::Accepted => write!(f, "ACCEPTED"),
            FilterStatus::Truncated => write!(f, "TRUNCATED"),
            FilterStatus::Summarized => write!(f, "SUMMARIZED"),
            FilterStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Outcome of filtering one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpamFilterResult {
    pub status: FilterStatus,
    pub original_token_count: usize,
    pub processed_token_count: usize,
    /// Empty when blocked
    pub processed_message: String,
    pub action: String,
    pub tokens_saved: usize,
}

impl SpamFilterResult {
    fn new(status: FilterStatus, original: usize, processed: usize, message: String, action: &str) -> Self {
        Self {
            status,
            original_token_count: original,
            processed_token_count: processed,
            processed_message: message,
            action: action.to_string(),
            tokens_saved: original.saturating_sub(processed),
        }
    }
}

/// Result of screening a message locally
#[derive(Debug, Clone, PartialEq)]
pub enum Screening {
    /// Settled without a model call
    Done(SpamFilterResult),
    /// Over the ceiling under the summarize policy
    NeedsSummary {
        prompt: String,
        original_tokens: usize,
        ceiling: usize,
    },
}

/// Screen a message without calling a model
///
/// Everything but the summarize policy is settled here.
pub fn screen(guard: &TokenGuard, message: &str, policy: GuardPolicy) -> Result<Screening> {
    let result = match guard.screen(message, policy)? {
        GuardDecision::Pass { text, tokens } => {
            SpamFilterResult::new(FilterStatus::Accepted, tokens, tokens, text, "None")
        }
        GuardDecision::Truncated {
            text,
            original_tokens,
            tokens,
        } => SpamFilterResult::new(
            FilterStatus::Truncated,
            original_tokens,
            tokens,
            text,
            "Truncated",
        ),
        GuardDecision::Blocked {
            original_tokens, ..
        } => blocked(original_tokens),
        GuardDecision::Summarize {
            prompt,
            original_tokens,
            ceiling,
        } => {
            return Ok(Screening::NeedsSummary {
                prompt,
                original_tokens,
                ceiling,
            });
        }
    };
    Ok(Screening::Done(result))
}

/// Result of filtering a list of messages
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpamFilterBatch {
    pub results: Vec<SpamFilterResult>,
    /// Messages whose summary call failed
    pub failed: Vec<String>,
    pub summary: BatchSummary,
}

/// Check a message against a token ceiling
///
/// Messages within the ceiling pass untouched. Over the ceiling the policy
/// decides: block it, truncate it, or have the model summarize it. A summary
/// that still overshoots is truncated.
pub async fn check(
    dispatcher: &Dispatcher,
    message: &str,
    ceiling: usize,
    policy: GuardPolicy,
) -> Result<SpamFilterResult> {
    let guard = dispatcher.guard(ceiling);
    let (result, _) = filter(dispatcher, &guard, message, policy).await?;
    Ok(result)
}

/// Check messages one after another
///
/// A failed summary call skips that message; only fatal errors stop the batch.
pub async fn check_batch(
    dispatcher: &Dispatcher,
    messages: &[String],
    ceiling: usize,
    policy: GuardPolicy,
) -> Result<SpamFilterBatch> {
    let guard = dispatcher.guard(ceiling);
    let mut batch = SpamFilterBatch::default();

    for (index, message) in messages.iter().enumerate() {
        match filter(dispatcher, &guard, message, policy).await {
            Ok((result, outcome)) => {
                if let Some(outcome) = outcome {
                    batch.summary.add(&outcome);
                }
                batch.results.push(result);
            }
            Err(e) => {
                skip_unless_fatal(e, index)?;
                batch.summary.add_failure();
                batch.failed.push(message.clone());
            }
        }
    }

    info!(
        filtered = batch.results.len(),
        failed = batch.failed.len(),
        calls = batch.summary.calls,
        "Spam filter batch complete"
    );

    Ok(batch)
}

/// Filter one message; the outcome is present when a summary call was made
async fn filter(
    dispatcher: &Dispatcher,
    guard: &TokenGuard,
    message: &str,
    policy: GuardPolicy,
) -> Result<(SpamFilterResult, Option<Outcome<()>>)> {
    let (result, outcome) = match screen(guard, message, policy)? {
        Screening::Done(result) => (result, None),
        Screening::NeedsSummary {
            prompt,
            original_tokens,
            ceiling,
        } => {
            let completion = dispatcher
                .dispatch_with(
                    Technique::Summarization,
                    &prompt,
                    ParamOverrides::max_tokens(ceiling),
                    true,
                )
                .await?;

            let result = match guard.enforce(completion.text.trim())? {
                GuardDecision::Pass { text, tokens } => SpamFilterResult::new(
                    FilterStatus::Summarized,
                    original_tokens,
                    tokens,
                    text,
                    "Summarized",
                ),
                GuardDecision::Truncated { text, tokens, .. } => SpamFilterResult::new(
                    FilterStatus::Summarized,
                    original_tokens,
                    tokens,
                    text,
                    "Summarized and truncated",
                ),
                _ => blocked(original_tokens),
            };
            (result, Some(Outcome::new((), &completion)))
        }
    };

    info!(
        status = %result.status,
        original_tokens = result.original_token_count,
        processed_tokens = result.processed_token_count,
        ceiling = guard.ceiling(),
        policy = %policy,
        "Message filtered"
    );

    Ok((result, outcome))
}

fn blocked(original_tokens: usize) -> SpamFilterResult {
    SpamFilterResult::new(
        FilterStatus::Blocked,
        original_tokens,
        0,
        String::new(),
        "Blocked",
    )
}
