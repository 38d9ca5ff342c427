//! Hosted LLM providers
//!
//! All three providers expose an OpenAI-compatible chat completions endpoint,
//! so they differ only in base URL, credential variable, and tokenizer.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A hosted LLM provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini (OpenAI-compatible endpoint)
    Google,
    /// Groq
    Groq,
}

impl Provider {
    /// All supported providers
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Google, Provider::Groq];

    /// Provider identifier as used in config and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Google => "google",
            Provider::Groq => "groq",
        }
    }

    /// Default base URL for the chat completions API
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Google => "GEMINI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    /// Whether the provider's models tokenize close to `cl100k_base`
    pub fn uses_bpe_tokenizer(&self) -> bool {
        matches!(self, Provider::OpenAi | Provider::Groq)
    }

    /// Read the API key from the environment
    pub fn api_key(&self) -> Result<String> {
        match env::var(self.api_key_env()) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::MissingApiKey {
                provider: self.as_str().to_string(),
                env_var: self.api_key_env(),
            }),
        }
    }

    /// Providers with a key present in the environment
    pub fn available() -> Vec<Provider> {
        Self::ALL
            .into_iter()
            .filter(|p| p.api_key().is_ok())
            .collect()
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "google" | "gemini" => Ok(Provider::Google),
            "groq" => Ok(Provider::Groq),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}
