//! Provider-appropriate token counting
//!
//! OpenAI and Groq-hosted models are counted with the `cl100k_base` BPE. Gemini
//! models use a SentencePiece vocabulary we do not ship, so they fall back to a
//! character heuristic of roughly four characters per token.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::error::Result;
use crate::llm::Provider;

/// Average characters per token used by the heuristic estimator
pub const CHARS_PER_TOKEN: usize = 4;

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn cl100k() -> Option<&'static CoreBPE> {
    CL100K
        .get_or_init(|| match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!(error = %e, "Failed to load cl100k_base, using character heuristic");
                None
            }
        })
        .as_ref()
}

/// Token counter for a given provider
#[derive(Clone, Copy)]
pub enum Tokenizer {
    /// Byte-pair encoding tables
    Bpe(&'static CoreBPE),
    /// ~4 characters per token
    Heuristic,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Tokenizer {
    /// Pick the tokenizer that best approximates the provider's models
    pub fn for_provider(provider: Provider) -> Self {
        if provider.uses_bpe_tokenizer() {
            if let Some(bpe) = cl100k() {
                return Tokenizer::Bpe(bpe);
            }
        }
        Tokenizer::Heuristic
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Tokenizer::Bpe(_) => "cl100k_base",
            Tokenizer::Heuristic => "heuristic",
        }
    }

    /// Count tokens in text
    pub fn count(&self, text: &str) -> usize {
        match self {
            Tokenizer::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Tokenizer::Heuristic => text.chars().count().div_ceil(CHARS_PER_TOKEN),
        }
    }

    /// Return the longest prefix of `text` holding at most `max_tokens` tokens
    pub fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
        match self {
            Tokenizer::Bpe(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text);
                if tokens.len() <= max_tokens {
                    return Ok(text.to_string());
                }
                let mut keep = max_tokens;
                while keep > 0 {
                    // A cut inside a multi-byte character does not decode
                    if let Ok(prefix) = bpe.decode(tokens[..keep].to_vec()) {
                        // Re-encoding a decoded prefix can merge differently at the cut
                        if self.count(&prefix) <= max_tokens {
                            return Ok(prefix);
                        }
                    }
                    keep -= 1;
                }
                Ok(String::new())
            }
            Tokenizer::Heuristic => Ok(text
                .chars()
                .take(max_tokens * CHARS_PER_TOKEN)
                .collect()),
        }
    }
}
