//! HTTP client for OpenAI-compatible chat completion endpoints
//!
//! Provides an async client with:
//! - One code path for OpenAI, Gemini and Groq
//! - Error classification by HTTP status and body
//! - Exponential backoff with jitter for transient and rate-limit failures

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client as HttpClient;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::{Error, Result};

use super::backend::ChatBackend;
use super::provider::Provider;
use super::types::{CallMeta, ChatRequest, ChatResponse, LlmResponse};

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Body fragments that identify a context-length rejection
const CONTEXT_OVERFLOW_MARKERS: [&str; 3] = [
    "context_length_exceeded",
    "maximum context length",
    "context window",
];

/// Chat completion client for a single provider
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    provider: Provider,
    api_key: String,
    base_url: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.retry.max_attempts)
            .finish()
    }
}

/// Builder for creating an LlmClient
pub struct LlmClientBuilder {
    provider: Provider,
    api_key: Option<String>,
    base_url: Option<String>,
    retry: RetryConfig,
    timeout_secs: u64,
}

impl LlmClientBuilder {
    /// Create a new builder for a provider
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: None,
            retry: RetryConfig::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the API key (defaults to the provider's environment variable)
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the provider's endpoint)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let api_key = match self.api_key {
            Some(key) => key,
            None => self.provider.api_key()?,
        };

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| self.provider.base_url().to_string());

        Ok(LlmClient {
            http_client,
            provider: self.provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: self.retry,
        })
    }
}

impl LlmClient {
    /// Create a new builder for LlmClient
    pub fn builder(provider: Provider) -> LlmClientBuilder {
        LlmClientBuilder::new(provider)
    }

    /// Create a client for a provider using its environment API key
    pub fn from_env(provider: Provider, retry: RetryConfig, timeout_secs: u64) -> Result<Self> {
        LlmClientBuilder::new(provider)
            .retry(retry)
            .timeout_secs(timeout_secs)
            .build()
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a chat request with retry logic
    async fn execute_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let started = Instant::now();
        let mut attempts = 0;
        let mut backoff_ms_total = 0;

        loop {
            attempts += 1;

            match self.send_request(request).await {
                Ok(mut response) => {
                    response.meta = CallMeta {
                        attempts,
                        backoff_ms_total,
                        latency_ms: started.elapsed().as_millis() as u64,
                    };
                    info!(
                        provider = %self.provider,
                        model = %response.model,
                        attempts,
                        tokens = response.usage.total_tokens,
                        latency_ms = response.meta.latency_ms,
                        "Chat completion successful"
                    );
                    if response.finish_reason.is_cut_off() {
                        warn!(
                            provider = %self.provider,
                            model = %response.model,
                            finish_reason = ?response.finish_reason,
                            "Completion stopped early"
                        );
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempts < self.retry.max_attempts => {
                    let suggested_wait = match &e {
                        Error::RateLimited(secs) => *secs,
                        _ => 0,
                    };
                    let backoff = calculate_backoff(attempts, suggested_wait, &self.retry);
                    warn!(
                        provider = %self.provider,
                        attempt = attempts,
                        wait_ms = backoff,
                        error = %e,
                        "Retryable error, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    backoff_ms_total += backoff;
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        provider = %self.provider,
                        attempts,
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(Error::RetriesExhausted {
                        attempts,
                        backoff_ms_total,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            provider = %self.provider,
            model = %request.model,
            messages = request.messages.len(),
            json_mode = request.response_format.is_some(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            let header_wait = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_error(status.as_u16(), &body, header_wait));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }

    /// Map an error response onto an error kind
    fn classify_error(&self, status: u16, body: &str, header_wait: Option<u64>) -> Error {
        match status {
            401 | 403 => Error::Authentication {
                provider: self.provider.to_string(),
                message: format!(
                    "HTTP {}. Check the {} environment variable. {}",
                    status,
                    self.provider.api_key_env(),
                    body
                )
                .trim_end()
                .to_string(),
            },
            429 => {
                let wait_secs = extract_retry_after(body).or(header_wait).unwrap_or(0);
                Error::RateLimited(wait_secs)
            }
            413 => Error::ContextOverflow(format!("Payload too large: {}", body)),
            400 if is_context_overflow(body) => Error::ContextOverflow(body.to_string()),
            408 => Error::Transient(format!("Request timeout ({})", status)),
            500..=599 => Error::Transient(format!("Server error ({}): {}", status, body)),
            400 => Error::LLMError(format!("Bad request: {}", body)),
            404 => Error::LLMError(format!(
                "Model not found or endpoint unavailable: {}",
                body
            )),
            _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        self.execute_request(request).await
    }
}

/// Whether an error body describes a context-length rejection
fn is_context_overflow(body: &str) -> bool {
    let body = body.to_lowercase();
    CONTEXT_OVERFLOW_MARKERS
        .iter()
        .any(|marker| body.contains(marker))
}

/// Calculate backoff delay with jitter
///
/// `base * 2^(attempt-1)` capped at the configured maximum, never shorter
/// than a server-suggested wait, plus up to 10% jitter.
fn calculate_backoff(attempt: u32, suggested_wait_secs: u64, retry: &RetryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(31);
    let base = retry
        .backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(retry.backoff_max_ms);

    let delay = base.max(suggested_wait_secs.saturating_mul(1000));

    let jitter = delay / 10;
    if jitter == 0 {
        return delay;
    }
    delay + rand::thread_rng().gen_range(0..=jitter)
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    if let Some(retry_after) = json.get("retry_after").and_then(|v| v.as_u64()) {
        return Some(retry_after);
    }
    json.get("error")
        .and_then(|error| error.get("retry_after"))
        .and_then(|v| v.as_u64())
}
