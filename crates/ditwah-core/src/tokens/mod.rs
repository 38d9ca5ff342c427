//! Token counting and budget enforcement
//!
//! This module provides:
//! - Provider-appropriate token estimation (BPE or character heuristic)
//! - A stateless pre-flight guard that passes, blocks, truncates, or asks for
//!   a summary of messages over a token ceiling

mod guard;
mod tokenizer;

pub use guard::{GuardDecision, GuardPolicy, TRUNCATION_MARKER, TokenGuard};
pub use tokenizer::{CHARS_PER_TOKEN, Tokenizer};
