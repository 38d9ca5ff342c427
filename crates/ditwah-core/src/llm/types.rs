//! Wire types for OpenAI-compatible chat completion endpoints
//!
//! OpenAI, the Gemini compatibility endpoint and Groq all accept the same
//! request body, so one set of types covers every provider.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Pipeline prompts are always sent as a single user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Requested response format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    /// Ask the model for a single JSON object
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// `POST /chat/completions` body
///
/// Unset sampling fields are omitted so the provider's defaults apply.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            response_format: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request a JSON object response
    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.response_format = enabled.then(ResponseFormat::json_object);
        self
    }

    /// Concatenated content of all user messages
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Billed token counts; Gemini sometimes leaves fields out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another call's usage into this one
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// Hit `max_tokens`; the answer may be cut off
    Length,
    ContentFilter,
    #[serde(other)]
    Unknown,
}

impl FinishReason {
    /// Whether the answer was cut short by the provider
    pub fn is_cut_off(&self) -> bool {
        matches!(self, FinishReason::Length | FinishReason::ContentFilter)
    }
}

/// Message returned inside a choice; content may be null
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: usize,
    pub message: ChoiceMessage,
    pub finish_reason: Option<FinishReason>,
}

/// `POST /chat/completions` reply; only the fields the pipeline reads
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

/// Bookkeeping about how a call was carried out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallMeta {
    /// HTTP attempts made, including the successful one
    pub attempts: u32,
    /// Total time spent sleeping between attempts
    pub backoff_ms_total: u64,
    /// Wall-clock time for the whole call
    pub latency_ms: u64,
}

/// First choice of a completion plus call bookkeeping
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    pub meta: CallMeta,
}

impl LlmResponse {
    /// `None` when the provider returned no choices
    pub fn from_chat_response(response: ChatResponse) -> Option<Self> {
        let choice = response.choices.into_iter().next()?;
        let mut usage = response.usage.unwrap_or_default();
        if usage.total_tokens == 0 {
            usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
        }

        Some(Self {
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            usage,
            finish_reason: choice.finish_reason.unwrap_or(FinishReason::Unknown),
            meta: CallMeta::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = ChatRequest::new("llama-3.1-8b-instant", vec![Message::user("Hello")])
            .with_temperature(0.0)
            .with_max_tokens(64);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"llama-3.1-8b-instant\""));
        assert!(json.contains("\"temperature\":0.0"));
        assert!(json.contains("\"max_tokens\":64"));
        assert!(!json.contains("response_format"));
    }

    #[test]
    fn test_json_mode_serialization() {
        let request = ChatRequest::new("gpt-4o-mini", vec![]).with_json_mode(true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");

        let request = request.with_json_mode(false);
        assert!(request.response_format.is_none());
    }

    #[test]
    fn test_user_text_skips_system_messages() {
        let request = ChatRequest::new(
            "m",
            vec![
                Message::new(MessageRole::System, "rules"),
                Message::user("a"),
                Message::user("b"),
            ],
        );
        assert_eq!(request.user_text(), "a\nb");
    }

    #[test]
    fn test_first_choice_becomes_response() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1234567890,
            "model": "llama-3.1-8b-instant",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "District: None | Intent: Rescue | Priority: High"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 14, "total_tokens": 134}
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let llm = LlmResponse::from_chat_response(response).unwrap();
        assert_eq!(llm.content, "District: None | Intent: Rescue | Priority: High");
        assert_eq!(llm.usage, Usage::new(120, 14));
        assert_eq!(llm.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_null_content_and_missing_total() {
        let json = r#"{
            "model": "gemini-1.5-flash",
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let llm = LlmResponse::from_chat_response(response).unwrap();
        assert_eq!(llm.content, "");
        assert_eq!(llm.usage.total_tokens, 15);
        assert_eq!(llm.finish_reason, FinishReason::Length);
        assert!(llm.finish_reason.is_cut_off());
    }

    #[test]
    fn test_empty_choices_is_none() {
        let json = r#"{"model": "m", "choices": []}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(LlmResponse::from_chat_response(response).is_none());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total.add(&Usage::new(10, 5));
        total.add(&Usage::new(3, 2));
        assert_eq!(total, Usage::new(13, 7));
    }
}
