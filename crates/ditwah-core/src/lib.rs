//! Ditwah Core Library
//!
//! This crate provides the core functionality for Ditwah, a crisis message
//! pipeline over hosted LLM APIs, including:
//! - LLM integration (OpenAI, Gemini and Groq with retry)
//! - Model routing by prompting technique
//! - Token counting and budget enforcement
//! - Run logging and cost reports
//! - Pipeline commands (classify, temperature, allocate, spam, extract)
//! - Input readers and CSV/Excel reports

pub mod commands;
pub mod config;
pub mod cost;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod records;
pub mod routing;
pub mod runlog;
pub mod storage;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{Error, Result};
    pub use crate::llm::Provider;
    pub use crate::routing::Technique;
}
