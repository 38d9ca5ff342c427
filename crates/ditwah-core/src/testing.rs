//! Scripted chat backend for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::llm::{CallMeta, ChatBackend, ChatRequest, FinishReason, LlmResponse, Provider, Usage};

/// Replays queued responses in order and remembers every request
pub struct ScriptedBackend {
    provider: Provider,
    script: Mutex<VecDeque<Result<LlmResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, content: &str) {
        self.push_response(reply(content, Usage::new(20, 5)));
    }

    pub fn push_response(&self, response: LlmResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: Error) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        let mut response = next.unwrap_or_else(|| Err(Error::Other("script exhausted".into())))?;
        response.model = request.model.clone();
        Ok(response)
    }
}

pub fn reply(content: &str, usage: Usage) -> LlmResponse {
    LlmResponse {
        content: content.to_string(),
        model: String::new(),
        usage,
        finish_reason: FinishReason::Stop,
        meta: CallMeta {
            attempts: 1,
            backoff_ms_total: 0,
            latency_ms: 5,
        },
    }
}
