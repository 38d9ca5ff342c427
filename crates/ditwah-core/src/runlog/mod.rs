//! Append-only CSV log of every model call
//!
//! One [`CallRecord`] is written per dispatched call, successful or not.
//! A failure to write the log is reported as a warning and never fails the
//! call that produced it.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cost::{CostReport, PriceTable};
use crate::error::{Error, Result};
use crate::llm::{LlmResponse, Provider, Usage};
use crate::routing::{RouteDecision, Technique};

/// Outcome column of the run log: `ok` or `error:<kind>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CallStatus {
    Ok,
    Error(String),
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Ok => write!(f, "ok"),
            CallStatus::Error(kind) => write!(f, "error:{}", kind),
        }
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for CallStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, String> {
        if value == "ok" {
            return Ok(CallStatus::Ok);
        }
        match value.strip_prefix("error:") {
            Some(kind) if !kind.is_empty() => Ok(CallStatus::Error(kind.to_string())),
            _ => Err(format!("invalid call status '{}'", value)),
        }
    }
}

/// One row of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub timestamp: DateTime<Utc>,
    pub provider: Provider,
    pub model: String,
    pub technique: Technique,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_estimate_usd: f64,
    pub status: CallStatus,
    /// HTTP attempts made, retries included
    pub attempts: u32,
    pub backoff_ms_total: u64,
    pub latency_ms: u64,
    /// The prompt was truncated or summarized by the token guard
    pub overflow_handled: bool,
}

impl CallRecord {
    fn base(decision: &RouteDecision, overflow_handled: bool) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            provider: decision.provider,
            model: decision.model.clone(),
            technique: decision.technique,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_estimate_usd: 0.0,
            status: CallStatus::Ok,
            attempts: 1,
            backoff_ms_total: 0,
            latency_ms: 0,
            overflow_handled,
        }
    }

    /// Whether the call succeeded
    pub fn is_ok(&self) -> bool {
        self.status == CallStatus::Ok
    }

    /// Token usage of the call
    pub fn usage(&self) -> Usage {
        Usage::new(self.prompt_tokens, self.completion_tokens)
    }
}

/// Writes call records to a CSV file
#[derive(Debug)]
pub struct RunLogger {
    path: PathBuf,
    prices: PriceTable,
    lock: Mutex<()>,
}

impl RunLogger {
    /// Create a logger appending to the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_prices(path, PriceTable::default())
    }

    /// Create a logger with a custom price table
    pub fn with_prices(path: impl Into<PathBuf>, prices: PriceTable) -> Self {
        Self {
            path: path.into(),
            prices,
            lock: Mutex::new(()),
        }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Price table used for cost estimates
    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Record a successful call
    pub fn record_success(
        &self,
        decision: &RouteDecision,
        response: &LlmResponse,
        overflow_handled: bool,
    ) -> CallRecord {
        let mut record = CallRecord::base(decision, overflow_handled);
        record.prompt_tokens = response.usage.prompt_tokens;
        record.completion_tokens = response.usage.completion_tokens;
        record.cost_estimate_usd = self.prices.estimate(&decision.model, &response.usage);
        record.attempts = response.meta.attempts.max(1);
        record.backoff_ms_total = response.meta.backoff_ms_total;
        record.latency_ms = response.meta.latency_ms;
        self.record(record)
    }

    /// Record a failed call
    pub fn record_failure(
        &self,
        decision: &RouteDecision,
        error: &Error,
        latency_ms: u64,
        overflow_handled: bool,
    ) -> CallRecord {
        let mut record = CallRecord::base(decision, overflow_handled);
        record.status = CallStatus::Error(error.kind().to_string());
        record.attempts = match error {
            Error::TokenBudgetExceeded { .. } => 0,
            other => other.attempts(),
        };
        record.backoff_ms_total = error.backoff_ms_total();
        record.latency_ms = latency_ms;
        self.record(record)
    }

    /// Append a record, warning instead of failing on I/O errors
    pub fn record(&self, record: CallRecord) -> CallRecord {
        match self.append(&record) {
            Ok(()) => debug!(
                call_id = %record.call_id,
                technique = %record.technique,
                status = %record.status,
                path = %self.path.display(),
                "Call recorded"
            ),
            Err(e) => warn!(
                call_id = %record.call_id,
                path = %self.path.display(),
                error = %e,
                "Failed to write run log"
            ),
        }
        record
    }

    fn append(&self, record: &CallRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Other("run log lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// Read every record from a log file
    pub fn read(path: impl AsRef<Path>) -> Result<Vec<CallRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::InputNotFound(path.display().to_string()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Aggregate a log file per day and per model
    pub fn summarize(path: impl AsRef<Path>) -> Result<CostReport> {
        let records = Self::read(path)?;
        Ok(CostReport::from_records(&records))
    }
}
