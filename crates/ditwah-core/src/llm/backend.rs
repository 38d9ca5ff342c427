//! Chat backend abstraction
//!
//! The dispatcher talks to models through this trait so that the HTTP client
//! can be swapped for a scripted backend in tests.

use async_trait::async_trait;

use super::provider::Provider;
use super::types::{ChatRequest, LlmResponse};
use crate::error::Result;

/// Something that can answer a chat completion request
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Provider this backend talks to
    fn provider(&self) -> Provider;

    /// Send a request, retrying transient failures, and return the response
    ///
    /// The returned [`LlmResponse::meta`] describes every attempt made. On
    /// failure the error's `attempts()` reports how many were made.
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse>;
}
