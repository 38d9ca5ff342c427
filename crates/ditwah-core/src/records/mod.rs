//! Records produced by the pipeline
//!
//! Every record here is built by parsing or validating model output. Parsing
//! is forgiving where a sensible default exists (classification labels,
//! priority scores); validation is strict where a downstream report depends
//! on the shape (crisis events).

mod classified;
mod event;
mod incident;

pub use classified::{ClassifiedMessage, Intent, Priority};
pub use event::{CrisisEvent, District, EventStatus, strip_code_fences};
pub use incident::{
    DEFAULT_SCORE, Incident, MAX_SCORE, RoutePlan, RouteStrategy, ScoredIncident, parse_score,
};
