//! Static model router
//!
//! Maps a (provider, technique) pair onto a concrete model and its sampling
//! parameters. There is no learning or fallback; the table is fixed.

use tracing::debug;

use super::types::{ParamOverrides, RouteDecision, Technique, Tier};
use crate::error::Result;
use crate::llm::Provider;

/// Model used by a provider for a tier
pub fn model_for(provider: Provider, tier: Tier) -> &'static str {
    match (provider, tier) {
        (Provider::OpenAi, Tier::General) => "gpt-4o-mini",
        (Provider::OpenAi, Tier::Reason) => "gpt-4o",
        (Provider::Google, Tier::General) => "gemini-1.5-flash",
        (Provider::Google, Tier::Reason) => "gemini-1.5-pro",
        (Provider::Groq, Tier::General) => "llama-3.1-8b-instant",
        (Provider::Groq, Tier::Reason) => "llama-3.3-70b-versatile",
    }
}

/// Picks provider, model and parameters for each technique
#[derive(Debug, Clone, Copy)]
pub struct ModelRouter {
    provider: Provider,
}

impl ModelRouter {
    /// Create a router for a provider
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Provider all routes go to
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Route a technique with its default parameters
    pub fn route(&self, technique: Technique) -> RouteDecision {
        self.route_with(technique, ParamOverrides::default())
    }

    /// Route a technique with caller overrides layered on top
    pub fn route_with(&self, technique: Technique, overrides: ParamOverrides) -> RouteDecision {
        let tier = technique.tier();
        let decision = RouteDecision {
            provider: self.provider,
            model: model_for(self.provider, tier).to_string(),
            technique,
            tier,
            params: overrides.apply(technique.default_params()),
        };

        debug!(
            provider = %decision.provider,
            model = %decision.model,
            technique = %technique,
            temperature = decision.params.temperature,
            max_tokens = decision.params.max_tokens,
            "Routed technique"
        );

        decision
    }

    /// Route a technique given by label; unknown labels are an error
    pub fn route_label(&self, label: &str) -> Result<RouteDecision> {
        Ok(self.route(label.parse()?))
    }

    /// Every route for this provider
    pub fn table(&self) -> Vec<RouteDecision> {
        Technique::ALL.into_iter().map(|t| self.route(t)).collect()
    }
}
