//! Prompt templates for each technique

use crate::records::{CrisisEvent, Incident, ScoredIncident};

/// Worked examples for few-shot classification, one per intent
pub const FEW_SHOT_EXAMPLES: &str = r#"Input: "SOS: 5 people trapped on a roof in Ja-Ela. Water rising fast. Need boat immediately."
Output: District: Gampaha | Intent: Rescue | Priority: High

Input: "Gampaha hospital is requesting drinking water for patients."
Output: District: Gampaha | Intent: Supply | Priority: High

Input: "BREAKING: Water levels in Kelani River have reached 9.5 meters. Critical flood warning issued."
Output: District: Colombo | Intent: Info | Priority: Low

Input: "Please share this post to help the victims."
Output: District: None | Intent: Other | Priority: Low"#;

/// Travel times used when none are supplied
pub const DEFAULT_TRAVEL_TIMES: &str =
    "Ragama -> Ja-Ela (10 min), Ja-Ela -> Gampaha (40 min), Ragama -> Gampaha (30 min)";

/// Longest description excerpt quoted per incident in route prompts
const DESCRIPTION_EXCERPT_CHARS: usize = 80;

/// Few-shot classification prompt
pub fn classification(message: &str) -> String {
    format!(
        "Role: Crisis Message Classifier for the Sri Lanka Disaster Management Center.\n\
         \n\
         Classify each message by location (district), intent (Rescue/Supply/Info/Other) \
         and priority (High/Low).\n\
         \n\
         Examples:\n\
         {examples}\n\
         \n\
         Input: \"{message}\"\n\
         Respond with exactly one line in this format:\n\
         District: [Name or None] | Intent: [Category] | Priority: [High/Low]",
        examples = FEW_SHOT_EXAMPLES,
        message = message,
    )
}

/// Open-ended scenario prompt used to compare temperatures
pub fn temperature_probe(scenario: &str) -> String {
    format!(
        "Role: Disaster response coordinator.\n\
         \n\
         Scenario:\n\
         {scenario}\n\
         \n\
         In one short sentence, state the single most important action to take first.",
    )
}

/// Chain-of-thought priority scoring prompt
pub fn cot_priority(incident: &Incident) -> String {
    let mut details = format!(
        "Location: {}\nDescription: {}",
        incident.location, incident.description
    );
    if let Some(people) = incident.people_affected {
        details.push_str(&format!("\nPeople Affected: {}", people));
    }
    if let Some(need) = &incident.need_type {
        details.push_str(&format!("\nNeed Type: {}", need));
    }
    if let Some(age) = &incident.age_info {
        details.push_str(&format!("\nAge Information: {}", age));
    }

    format!(
        "Role: Crisis Priority Analyst.\n\
         \n\
         Score this incident using the following logic:\n\
         Base Score: 5\n\
         +2 if Age > 60 or < 5 (vulnerable populations)\n\
         +3 if Need == \"Rescue\" (life-threatening)\n\
         +1 if Need == \"Medicine\" or \"Insulin\" (medical emergency)\n\
         Result: Score X/10\n\
         \n\
         Incident:\n\
         {details}\n\
         \n\
         Think step by step, then give the final score on its own line.\n\
         Answer format: Score: X/10",
    )
}

/// Tree-of-thought route planning prompt
pub fn tot_route(start: &str, scored: &[ScoredIncident], travel_times: Option<&str>) -> String {
    let incidents = scored
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "Incident {}: {} - {} | Score: {}/10",
                i + 1,
                s.incident.location,
                excerpt(&s.incident.description, DESCRIPTION_EXCERPT_CHARS),
                s.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Role: Crisis Logistics Optimizer.\n\
         \n\
         Optimize the rescue boat route to maximize total priority score in the shortest time.\n\
         \n\
         Setup:\n\
         - ONE rescue boat stationed at {start}\n\
         - Travel times: {travel}\n\
         \n\
         Incidents with scores:\n\
         {incidents}\n\
         \n\
         Explore these 3 strategies:\n\
         Branch 1: Highest priority first (greedy approach)\n\
         Branch 2: Closest location first (minimize travel time)\n\
         Branch 3: Furthest location first (logistics efficiency)\n\
         \n\
         For each branch, calculate the total priority score achieved and the total time \
         taken, and weigh the trade-offs.\n\
         Finish with one line: \"Best strategy: Branch N\" and explain why.",
        travel = travel_times.unwrap_or(DEFAULT_TRAVEL_TIMES),
    )
}

/// Structured extraction prompt
pub fn extraction(text: &str) -> String {
    format!(
        "Extract a single crisis event from the news item below.\n\
         Return ONLY a JSON object matching this schema, with no commentary:\n\
         {schema}\n\
         \n\
         Use null for flood_level_meters when no level is reported. Use \"Other\" for \
         districts not in the list.\n\
         \n\
         News item:\n\
         {text}",
        schema = CrisisEvent::schema_description(),
    )
}

/// Prompt asking for a summary that fits a token ceiling
pub fn overflow_summarize(text: &str, ceiling: usize) -> String {
    format!(
        "The message below is too long to process (limit: about {ceiling} tokens).\n\
         Extract and preserve ONLY critical crisis information: location, district, \
         emergency type, number of people, urgency level and contact info.\n\
         Reply with a concise summary of 2-3 sentences maximum.\n\
         \n\
         Message:\n\
         {text}",
    )
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
