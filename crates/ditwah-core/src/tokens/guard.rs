//! Pre-flight token ceiling checks

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tokenizer::Tokenizer;
use crate::error::{Error, Result};
use crate::llm::Provider;

/// Suffix appended to truncated messages
pub const TRUNCATION_MARKER: &str = "... [TRUNCATED]";

/// What to do with a message that is over the ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardPolicy {
    /// Refuse the message
    Block,
    /// Cut the message down to the ceiling
    #[default]
    Truncate,
    /// Replace the message with a model-written summary
    Summarize,
}

impl std::fmt::Display for GuardPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardPolicy::Block => write!(f, "block"),
            GuardPolicy::Truncate => write!(f, "truncate"),
            GuardPolicy::Summarize => write!(f, "summarize"),
        }
    }
}

impl std::str::FromStr for GuardPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(GuardPolicy::Block),
            "truncate" => Ok(GuardPolicy::Truncate),
            "summarize" | "summarise" => Ok(GuardPolicy::Summarize),
            other => Err(Error::InvalidInput(format!(
                "Unknown guard policy '{}'. Valid options: block, truncate, summarize",
                other
            ))),
        }
    }
}

/// Outcome of screening a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Within budget, send unchanged
    Pass { text: String, tokens: usize },
    /// Over budget and cut down to fit
    Truncated {
        text: String,
        original_tokens: usize,
        tokens: usize,
    },
    /// Over budget and refused
    Blocked {
        original_tokens: usize,
        ceiling: usize,
    },
    /// Over budget; the caller should run this summarization prompt instead
    Summarize {
        prompt: String,
        original_tokens: usize,
        ceiling: usize,
    },
}

impl GuardDecision {
    /// Token count of the text as received
    pub fn original_tokens(&self) -> usize {
        match self {
            GuardDecision::Pass { tokens, .. } => *tokens,
            GuardDecision::Truncated {
                original_tokens, ..
            }
            | GuardDecision::Blocked {
                original_tokens, ..
            }
            | GuardDecision::Summarize {
                original_tokens, ..
            } => *original_tokens,
        }
    }

    /// Whether the message goes out unchanged
    pub fn is_pass(&self) -> bool {
        matches!(self, GuardDecision::Pass { .. })
    }
}

/// Stateless token ceiling check
#[derive(Debug, Clone, Copy)]
pub struct TokenGuard {
    tokenizer: Tokenizer,
    ceiling: usize,
}

impl TokenGuard {
    /// Create a guard for a provider with the given ceiling
    pub fn new(provider: Provider, ceiling: usize) -> Self {
        Self {
            tokenizer: Tokenizer::for_provider(provider),
            ceiling,
        }
    }

    /// Create a guard with an explicit tokenizer
    pub fn with_tokenizer(tokenizer: Tokenizer, ceiling: usize) -> Self {
        Self { tokenizer, ceiling }
    }

    /// The token ceiling
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// The tokenizer in use
    pub fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    /// Estimate the token count of text
    pub fn count(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    /// Screen text against the ceiling using the given policy
    pub fn screen(&self, text: &str, policy: GuardPolicy) -> Result<GuardDecision> {
        let tokens = self.count(text);

        if tokens <= self.ceiling {
            return Ok(GuardDecision::Pass {
                text: text.to_string(),
                tokens,
            });
        }

        debug!(
            tokens,
            ceiling = self.ceiling,
            policy = %policy,
            tokenizer = self.tokenizer.name(),
            "Message over token ceiling"
        );

        match policy {
            GuardPolicy::Block => Ok(GuardDecision::Blocked {
                original_tokens: tokens,
                ceiling: self.ceiling,
            }),
            GuardPolicy::Truncate => self.truncate(text, tokens),
            GuardPolicy::Summarize => Ok(GuardDecision::Summarize {
                prompt: crate::prompts::overflow_summarize(text, self.ceiling),
                original_tokens: tokens,
                ceiling: self.ceiling,
            }),
        }
    }

    /// Cut text to fit the ceiling, marker included
    fn truncate(&self, text: &str, original_tokens: usize) -> Result<GuardDecision> {
        let marker_tokens = self.count(TRUNCATION_MARKER);
        if marker_tokens >= self.ceiling {
            return Ok(GuardDecision::Blocked {
                original_tokens,
                ceiling: self.ceiling,
            });
        }

        let mut budget = self.ceiling - marker_tokens;
        loop {
            let prefix = self.tokenizer.truncate(text, budget)?;
            let candidate = format!("{}{}", prefix.trim_end(), TRUNCATION_MARKER);
            let tokens = self.count(&candidate);
            if tokens <= self.ceiling {
                return Ok(GuardDecision::Truncated {
                    text: candidate,
                    original_tokens,
                    tokens,
                });
            }
            if budget == 0 {
                return Ok(GuardDecision::Blocked {
                    original_tokens,
                    ceiling: self.ceiling,
                });
            }
            budget -= 1;
        }
    }

    /// Bound already-processed text (e.g. a summary) to the ceiling
    pub fn enforce(&self, text: &str) -> Result<GuardDecision> {
        self.screen(text, GuardPolicy::Truncate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristic_guard(ceiling: usize) -> TokenGuard {
        TokenGuard::with_tokenizer(Tokenizer::Heuristic, ceiling)
    }

    #[test]
    fn test_under_ceiling_passes_for_every_policy() {
        let guard = heuristic_guard(150);
        let message = "We are trapped on the roof with 3 kids!";

        for policy in [GuardPolicy::Block, GuardPolicy::Truncate, GuardPolicy::Summarize] {
            let decision = guard.screen(message, policy).unwrap();
            assert_eq!(
                decision,
                GuardDecision::Pass {
                    text: message.to_string(),
                    tokens: guard.count(message)
                }
            );
        }
    }

    #[test]
    fn test_exactly_at_ceiling_passes() {
        let guard = heuristic_guard(10);
        let message = "a".repeat(40);
        assert!(guard.screen(&message, GuardPolicy::Block).unwrap().is_pass());
    }

    #[test]
    fn test_over_ceiling_never_passes() {
        let message = "SOS flood water rising help needed now. ".repeat(30);

        for ceiling in [5, 20, 64, 150] {
            let guard = heuristic_guard(ceiling);
            for policy in [GuardPolicy::Block, GuardPolicy::Truncate, GuardPolicy::Summarize] {
                let decision = guard.screen(&message, policy).unwrap();
                assert!(!decision.is_pass(), "ceiling {} policy {}", ceiling, policy);
                assert_eq!(decision.original_tokens(), guard.count(&message));
            }
        }
    }

    #[test]
    fn test_block_policy() {
        let guard = heuristic_guard(10);
        let decision = guard.screen(&"x".repeat(100), GuardPolicy::Block).unwrap();
        assert_eq!(
            decision,
            GuardDecision::Blocked {
                original_tokens: 25,
                ceiling: 10
            }
        );
    }

    #[test]
    fn test_truncate_stays_within_ceiling() {
        let guard = heuristic_guard(20);
        let message = "Kalutara bridge collapsed, families stranded. ".repeat(20);

        match guard.screen(&message, GuardPolicy::Truncate).unwrap() {
            GuardDecision::Truncated {
                text,
                original_tokens,
                tokens,
            } => {
                assert!(tokens <= 20);
                assert!(original_tokens > 20);
                assert!(text.ends_with(TRUNCATION_MARKER));
                assert!(text.starts_with("Kalutara bridge"));
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_with_bpe_stays_within_ceiling() {
        let guard = TokenGuard::new(Provider::OpenAi, 30);
        let message = "Forward this to everyone!!! Flood relief donations needed in Ratnapura. "
            .repeat(25);

        let decision = guard.screen(&message, GuardPolicy::Truncate).unwrap();
        match decision {
            GuardDecision::Truncated { tokens, text, .. } => {
                assert!(tokens <= 30);
                assert!(guard.count(&text) <= 30);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_non_ascii_with_bpe_never_errors() {
        let message = "ගංවතුර ජලය ඉහළ යයි, උදව් ඕනෑ 🚨🌊 ".repeat(20);

        for ceiling in 6..120 {
            let guard = TokenGuard::new(Provider::OpenAi, ceiling);
            let decision = guard.screen(&message, GuardPolicy::Truncate).unwrap();
            match decision {
                GuardDecision::Truncated { text, tokens, .. } => {
                    assert!(tokens <= ceiling, "ceiling {}", ceiling);
                    assert!(text.ends_with(TRUNCATION_MARKER));
                }
                GuardDecision::Blocked { .. } => {}
                other => panic!("ceiling {}: unexpected {:?}", ceiling, other),
            }
        }
    }

    #[test]
    fn test_ceiling_too_small_for_marker_blocks() {
        let guard = heuristic_guard(2);
        let decision = guard.screen(&"y".repeat(50), GuardPolicy::Truncate).unwrap();
        assert!(matches!(decision, GuardDecision::Blocked { ceiling: 2, .. }));
    }

    #[test]
    fn test_summarize_returns_prompt_with_original_text() {
        let guard = heuristic_guard(10);
        let message = "Long rambling post about the floods in Galle district. ".repeat(5);
        match guard.screen(&message, GuardPolicy::Summarize).unwrap() {
            GuardDecision::Summarize {
                prompt, ceiling, ..
            } => {
                assert_eq!(ceiling, 10);
                assert!(prompt.contains("Galle district"));
            }
            other => panic!("expected summarize, got {:?}", other),
        }
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!("block".parse::<GuardPolicy>().unwrap(), GuardPolicy::Block);
        assert_eq!(
            "Summarise".parse::<GuardPolicy>().unwrap(),
            GuardPolicy::Summarize
        );
        assert!("drop".parse::<GuardPolicy>().is_err());
        assert_eq!(GuardPolicy::Truncate.to_string(), "truncate");
    }
}
