//! LLM provider integration
//!
//! Chat completion access to OpenAI, Gemini and Groq through their
//! OpenAI-compatible endpoints, with retry and error classification.

mod backend;
mod client;
mod provider;
mod types;

pub use backend::ChatBackend;
pub use client::{LlmClient, LlmClientBuilder};
pub use provider::Provider;
pub use types::{
    CallMeta, ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, LlmResponse,
    Message, MessageRole, ResponseFormat, Usage,
};
