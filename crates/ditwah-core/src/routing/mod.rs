//! Model routing
//!
//! Each pipeline step declares a [`Technique`]. The router turns it into a
//! concrete model for the configured provider plus default sampling
//! parameters, which callers may override.
//!
//! ## Example
//!
//! ```rust
//! use ditwah_core::llm::Provider;
//! use ditwah_core::routing::{ModelRouter, Technique};
//!
//! let router = ModelRouter::new(Provider::Groq);
//! let decision = router.route(Technique::CotReasoning);
//! assert_eq!(decision.model, "llama-3.3-70b-versatile");
//! ```

mod router;
mod types;

pub use router::{ModelRouter, model_for};
pub use types::{CallParams, ParamOverrides, RouteDecision, Technique, Tier};
