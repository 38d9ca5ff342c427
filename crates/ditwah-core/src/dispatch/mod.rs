//! Call dispatch: router, token guard, client and run log in one chain
//!
//! Every model call in the pipeline goes through [`Dispatcher::dispatch`]:
//!
//! 1. The router picks the model and parameters for the technique
//! 2. The prompt is screened against the prompt ceiling
//! 3. The backend sends the request, retrying transient failures
//! 4. The outcome is appended to the run log, success or failure

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::{CallMeta, ChatBackend, ChatRequest, LlmClient, Message, Provider, Usage};
use crate::routing::{ModelRouter, ParamOverrides, RouteDecision, Technique};
use crate::runlog::{CallRecord, RunLogger};
use crate::tokens::{GuardDecision, GuardPolicy, TokenGuard};

/// A successful call
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Usage,
    pub meta: CallMeta,
    /// Run log row written for this call
    pub record: CallRecord,
}

/// Sends prompts to a model and records every call
pub struct Dispatcher {
    backend: Arc<dyn ChatBackend>,
    router: ModelRouter,
    prompt_guard: TokenGuard,
    logger: RunLogger,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("provider", &self.router.provider())
            .field("prompt_ceiling", &self.prompt_guard.ceiling())
            .field("log", &self.logger.path())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher around any backend
    pub fn new(backend: Arc<dyn ChatBackend>, logger: RunLogger, prompt_ceiling: usize) -> Self {
        let provider = backend.provider();
        Self {
            backend,
            router: ModelRouter::new(provider),
            prompt_guard: TokenGuard::new(provider, prompt_ceiling),
            logger,
        }
    }

    /// Create an HTTP-backed dispatcher from configuration
    ///
    /// Fails if the selected provider has no API key in the environment.
    pub fn from_config(config: &Config, provider: Provider) -> Result<Self> {
        let client = LlmClient::from_env(provider, config.retry.clone(), config.llm.timeout_secs)?;
        let logger = RunLogger::new(config.output.log_path());
        Ok(Self::new(
            Arc::new(client),
            logger,
            config.guard.prompt_ceiling,
        ))
    }

    /// Provider calls are sent to
    pub fn provider(&self) -> Provider {
        self.router.provider()
    }

    /// The model router
    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// The run logger
    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Build a token guard for this provider with the given ceiling
    pub fn guard(&self, ceiling: usize) -> TokenGuard {
        TokenGuard::with_tokenizer(self.prompt_guard.tokenizer(), ceiling)
    }

    /// Send a prompt using the technique's default parameters
    pub async fn dispatch(&self, technique: Technique, prompt: &str) -> Result<Completion> {
        self.dispatch_with(technique, prompt, ParamOverrides::default(), false)
            .await
    }

    /// Send a prompt with parameter overrides
    ///
    /// `overflow_handled` marks calls whose input was already cut down or
    /// summarized by the token guard.
    pub async fn dispatch_with(
        &self,
        technique: Technique,
        prompt: &str,
        overrides: ParamOverrides,
        overflow_handled: bool,
    ) -> Result<Completion> {
        let decision = self.router.route_with(technique, overrides);

        if let GuardDecision::Blocked {
            original_tokens,
            ceiling,
        } = self.prompt_guard.screen(prompt, GuardPolicy::Block)?
        {
            let error = Error::TokenBudgetExceeded {
                tokens: original_tokens,
                ceiling,
            };
            warn!(
                technique = %technique,
                tokens = original_tokens,
                ceiling,
                "Prompt over token ceiling, not sent"
            );
            self.logger
                .record_failure(&decision, &error, 0, overflow_handled);
            return Err(error);
        }

        let request = build_request(&decision, prompt);
        let started = Instant::now();

        match self.backend.chat(&request).await {
            Ok(response) => {
                let record = self
                    .logger
                    .record_success(&decision, &response, overflow_handled);
                info!(
                    technique = %technique,
                    model = %decision.model,
                    attempts = record.attempts,
                    tokens = response.usage.total_tokens,
                    cost_usd = record.cost_estimate_usd,
                    "Call complete"
                );
                Ok(Completion {
                    text: response.content,
                    model: response.model,
                    usage: response.usage,
                    meta: response.meta,
                    record,
                })
            }
            Err(error) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                warn!(
                    technique = %technique,
                    model = %decision.model,
                    code = error.code(),
                    error = %error,
                    "Call failed"
                );
                self.logger
                    .record_failure(&decision, &error, latency_ms, overflow_handled);
                Err(error)
            }
        }
    }
}

fn build_request(decision: &RouteDecision, prompt: &str) -> ChatRequest {
    ChatRequest::new(decision.model.clone(), vec![Message::user(prompt)])
        .with_temperature(decision.params.temperature)
        .with_max_tokens(decision.params.max_tokens)
        .with_json_mode(decision.params.json_mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::CallStatus;
    use crate::testing::ScriptedBackend;
    use tempfile::TempDir;

    fn dispatcher(backend: Arc<ScriptedBackend>, dir: &TempDir, ceiling: usize) -> Dispatcher {
        Dispatcher::new(backend, RunLogger::new(dir.path().join("llm_calls.csv")), ceiling)
    }

    #[tokio::test]
    async fn test_dispatch_routes_and_logs() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(Provider::Groq));
        backend.push_reply("District: Kandy | Intent: Supply | Priority: High");

        let dispatcher = dispatcher(backend.clone(), &dir, 4000);
        let completion = dispatcher
            .dispatch(Technique::Classification, "Need dry rations in Kandy")
            .await
            .unwrap();

        assert_eq!(
            completion.text,
            "District: Kandy | Intent: Supply | Priority: High"
        );

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llama-3.1-8b-instant");
        assert_eq!(requests[0].temperature, Some(0.0));
        assert_eq!(requests[0].max_tokens, Some(100));
        assert_eq!(requests[0].user_text(), "Need dry rations in Kandy");

        let records = RunLogger::read(dispatcher.logger().path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].technique, Technique::Classification);
        assert_eq!(records[0].status, CallStatus::Ok);
        assert_eq!(records[0], completion.record);
    }

    #[tokio::test]
    async fn test_extraction_requests_json_mode() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(Provider::OpenAi));
        backend.push_reply("{}");

        let dispatcher = dispatcher(backend.clone(), &dir, 4000);
        dispatcher
            .dispatch(Technique::Extraction, "news")
            .await
            .unwrap();

        assert!(backend.requests()[0].response_format.is_some());
    }

    #[tokio::test]
    async fn test_over_budget_prompt_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(Provider::Google));
        backend.push_reply("never used");

        let dispatcher = dispatcher(backend.clone(), &dir, 10);
        let err = dispatcher
            .dispatch(Technique::General, &"flood ".repeat(100))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenBudgetExceeded { ceiling: 10, .. }));
        assert!(backend.requests().is_empty());

        let records = RunLogger::read(dispatcher.logger().path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, CallStatus::Error("token_budget".into()));
        assert_eq!(records[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_failure_is_logged_with_attempts() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(Provider::Groq));
        backend.push_error(Error::RetriesExhausted {
            attempts: 3,
            backoff_ms_total: 3000,
            source: Box::new(Error::RateLimited(1)),
        });

        let dispatcher = dispatcher(backend, &dir, 4000);
        let err = dispatcher
            .dispatch(Technique::CotReasoning, "score this")
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 3);

        let records = RunLogger::read(dispatcher.logger().path()).unwrap();
        assert_eq!(records[0].status, CallStatus::Error("rate_limited".into()));
        assert_eq!(records[0].attempts, 3);
        assert_eq!(records[0].model, "llama-3.3-70b-versatile");
    }

    #[tokio::test]
    async fn test_overrides_and_overflow_flag() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::new(Provider::Groq));
        backend.push_reply("summary");

        let dispatcher = dispatcher(backend.clone(), &dir, 4000);
        let completion = dispatcher
            .dispatch_with(
                Technique::Summarization,
                "long text",
                ParamOverrides::max_tokens(42),
                true,
            )
            .await
            .unwrap();

        assert!(completion.record.overflow_handled);
        assert_eq!(backend.requests()[0].max_tokens, Some(42));
    }
}
