//! Error types for Ditwah

use thiserror::Error;

/// Result type alias using Ditwah's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Ditwah error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Network and provider errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Provider temporarily unavailable: {0}")]
    Transient(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Authentication failed for provider '{provider}': {message}")]
    Authentication { provider: String, message: String },

    #[error("Context overflow: {0}. Truncate or summarize the input before retrying.")]
    ContextOverflow(String),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        backoff_ms_total: u64,
        #[source]
        source: Box<Error>,
    },

    // Budget errors (E200-E299)
    #[error("Prompt is {tokens} tokens, over the {ceiling} token ceiling.")]
    TokenBudgetExceeded { tokens: usize, ceiling: usize },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No API key for provider '{provider}'. Set the {env_var} environment variable.")]
    MissingApiKey {
        provider: String,
        env_var: &'static str,
    },

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    // Routing errors (E1100-E1199)
    #[error("Unknown technique '{0}'. Run `ditwah route` to see available techniques.")]
    UnknownTechnique(String),

    #[error("Unknown provider '{0}'. Valid providers: openai, google, groq")]
    UnknownProvider(String),

    // Validation and output errors (E1200-E1299)
    #[error("Model output failed validation: {0}")]
    ValidationFailed(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::Transient(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::Authentication { .. } => "E103",
            Self::ContextOverflow(_) => "E104",
            Self::LLMError(_) => "E105",
            Self::RetriesExhausted { .. } => "E106",
            Self::TokenBudgetExceeded { .. } => "E200",
            Self::Tokenizer(_) => "E201",
            Self::ConfigError(_) => "E600",
            Self::MissingApiKey { .. } => "E601",
            Self::InvalidInput(_) => "E800",
            Self::InputNotFound(_) => "E801",
            Self::UnknownTechnique(_) => "E1100",
            Self::UnknownProvider(_) => "E1101",
            Self::ValidationFailed(_) => "E1200",
            Self::Spreadsheet(_) => "E1201",
            Self::Csv(_) => "E1202",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::Authentication { .. } => Some("ditwah doctor".to_string()),
            Self::MissingApiKey { env_var, .. } => Some(format!("export {}=<key>", env_var)),
            Self::TokenBudgetExceeded { .. } => {
                Some("ditwah config set guard.prompt_ceiling <tokens>".to_string())
            }
            Self::UnknownTechnique(_) => Some("ditwah route".to_string()),
            Self::UnknownProvider(_) => Some("ditwah config set llm.provider groq".to_string()),
            Self::RetriesExhausted { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Whether the request may succeed if sent again unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Transient(_) | Self::RateLimited(_) => true,
            _ => false,
        }
    }

    /// Whether a batch must stop instead of moving on to the next item
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::RetriesExhausted { source, .. } => source.is_fatal(),
            Self::Authentication { .. }
            | Self::MissingApiKey { .. }
            | Self::ConfigError(_)
            | Self::UnknownProvider(_) => true,
            _ => false,
        }
    }

    /// Number of HTTP attempts this error represents
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// Time spent sleeping between attempts before giving up
    pub fn backoff_ms_total(&self) -> u64 {
        match self {
            Self::RetriesExhausted {
                backoff_ms_total, ..
            } => *backoff_ms_total,
            _ => 0,
        }
    }

    /// Short kind label used in the run log status column
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RetriesExhausted { source, .. } => source.kind(),
            Self::NetworkError(_) => "network",
            Self::Transient(_) => "transient",
            Self::RateLimited(_) => "rate_limited",
            Self::Authentication { .. } | Self::MissingApiKey { .. } => "authentication",
            Self::ContextOverflow(_) => "context_overflow",
            Self::TokenBudgetExceeded { .. } => "token_budget",
            Self::ValidationFailed(_) => "validation",
            _ => "api",
        }
    }
}
