//! Pipeline commands as library functions
//!
//! Each command renders a prompt, sends it through the [`Dispatcher`] and
//! parses or validates the reply. Batch variants keep going past per-item
//! failures unless the failure is fatal (bad credentials, bad config).
//!
//! [`Dispatcher`]: crate::dispatch::Dispatcher

pub mod allocate;
pub mod classify;
pub mod extract;
pub mod spam;
pub mod temperature;

use serde::Serialize;
use tracing::warn;

use crate::dispatch::Completion;
use crate::error::{Error, Result};
use crate::llm::Usage;

/// A parsed value together with what the call cost
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub usage: Usage,
    pub cost_usd: f64,
    pub latency_ms: u64,
}

impl<T> Outcome<T> {
    pub fn new(value: T, completion: &Completion) -> Self {
        Self {
            value,
            usage: completion.usage,
            cost_usd: completion.record.cost_estimate_usd,
            latency_ms: completion.meta.latency_ms,
        }
    }
}

/// Totals across a batch of calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub calls: u32,
    pub failed_calls: u32,
    pub usage: Usage,
    pub cost_usd: f64,
    pub latency_ms: u64,
}

impl BatchSummary {
    /// Count a completed call
    pub fn add<T>(&mut self, outcome: &Outcome<T>) {
        self.calls += 1;
        self.usage.add(&outcome.usage);
        self.cost_usd += outcome.cost_usd;
        self.latency_ms += outcome.latency_ms;
    }

    /// Count a call that did not complete
    pub fn add_failure(&mut self) {
        self.calls += 1;
        self.failed_calls += 1;
    }
}

/// Decide whether a batch can continue after an item failed
///
/// Fatal errors are returned; anything else is logged and swallowed.
fn skip_unless_fatal(error: Error, item: usize) -> Result<()> {
    if error.is_fatal() {
        return Err(error);
    }
    warn!(item, code = error.code(), error = %error, "Skipping item");
    Ok(())
}
