//! Resource allocation: chain-of-thought scoring, tree-of-thought routing

use serde::Serialize;
use tracing::{debug, info};

use super::{BatchSummary, Outcome, skip_unless_fatal};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::prompts;
use crate::records::{Incident, RoutePlan, ScoredIncident, parse_score};
use crate::routing::Technique;

/// Result of scoring a list of incidents
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoringBatch {
    pub scored: Vec<ScoredIncident>,
    /// Incidents whose call failed
    pub failed: Vec<Incident>,
    pub summary: BatchSummary,
}

/// Score one incident from 0 to 10
pub async fn score_incident(
    dispatcher: &Dispatcher,
    incident: &Incident,
) -> Result<Outcome<ScoredIncident>> {
    let prompt = prompts::cot_priority(incident);
    let completion = dispatcher
        .dispatch(Technique::CotReasoning, &prompt)
        .await?;

    let score = parse_score(&completion.text);
    debug!(location = %incident.location, score, "Incident scored");

    let scored = ScoredIncident {
        incident: incident.clone(),
        score,
        reasoning: completion.text.clone(),
    };
    Ok(Outcome::new(scored, &completion))
}

/// Score incidents one after another
pub async fn score_batch(dispatcher: &Dispatcher, incidents: &[Incident]) -> Result<ScoringBatch> {
    let mut batch = ScoringBatch::default();

    for (index, incident) in incidents.iter().enumerate() {
        match score_incident(dispatcher, incident).await {
            Ok(outcome) => {
                batch.summary.add(&outcome);
                batch.scored.push(outcome.value);
            }
            Err(e) => {
                skip_unless_fatal(e, index)?;
                batch.summary.add_failure();
                batch.failed.push(incident.clone());
            }
        }
    }

    info!(
        scored = batch.scored.len(),
        failed = batch.failed.len(),
        "Scoring batch complete"
    );

    Ok(batch)
}

/// Plan a rescue route over scored incidents
///
/// The model weighs three strategies; the plan records which one it chose
/// and visits incidents by descending score from the start location.
pub async fn plan_route(
    dispatcher: &Dispatcher,
    start: &str,
    scored: &[ScoredIncident],
    travel_times: Option<&str>,
) -> Result<Outcome<RoutePlan>> {
    if scored.is_empty() {
        return Err(Error::InvalidInput(
            "No scored incidents to plan a route for".to_string(),
        ));
    }
    if start.trim().is_empty() {
        return Err(Error::InvalidInput(
            "A start location is required".to_string(),
        ));
    }

    let prompt = prompts::tot_route(start.trim(), scored, travel_times);
    let completion = dispatcher
        .dispatch(Technique::TotReasoning, &prompt)
        .await?;

    let plan = RoutePlan::build(start.trim(), scored, completion.text.clone());
    info!(
        strategy = %plan.strategy,
        stops = plan.route.len(),
        total_priority_score = plan.total_priority_score,
        "Route planned"
    );

    Ok(Outcome::new(plan, &completion))
}
