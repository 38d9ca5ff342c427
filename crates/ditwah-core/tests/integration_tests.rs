//! Ditwah Core Integration Tests
//!
//! Drive the pipeline commands through the real HTTP client against a mock
//! OpenAI-compatible server.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ditwah_core::{
    Error,
    commands::{allocate, classify, extract, spam},
    config::RetryConfig,
    dispatch::Dispatcher,
    llm::{LlmClient, Provider},
    records::{District, Incident, Intent, Priority, RouteStrategy},
    routing::ParamOverrides,
    runlog::{CallStatus, RunLogger},
    storage,
    tokens::GuardPolicy,
};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "llama-3.1-8b-instant",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 100, "completion_tokens": 10, "total_tokens": 110}
    })
}

fn dispatcher(server: &MockServer, dir: &TempDir, max_attempts: u32) -> Dispatcher {
    let client = LlmClient::builder(Provider::Groq)
        .api_key("test-key")
        .base_url(server.uri())
        .retry(RetryConfig {
            max_attempts,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        })
        .timeout_secs(5)
        .build()
        .unwrap();

    Dispatcher::new(
        Arc::new(client),
        RunLogger::new(dir.path().join("llm_calls.csv")),
        4000,
    )
}

async fn reply_when(server: &MockServer, fragment: &str, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(fragment))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_classification_pipeline_writes_reports_and_log() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    reply_when(
        &server,
        "trapped on the roof",
        "District: None | Intent: Rescue | Priority: High",
    )
    .await;
    reply_when(
        &server,
        "dry rations",
        "District: Kandy | Intent: Supply | Priority: Low",
    )
    .await;

    let input = dir.path().join("messages.txt");
    std::fs::write(
        &input,
        "We are trapped on the roof with 3 kids!\n\nNeed dry rations in Kandy\n",
    )
    .unwrap();
    let messages = storage::read_lines(&input).unwrap();

    let dispatcher = dispatcher(&server, &dir, 3);
    let batch = classify::classify_batch(&dispatcher, &messages, ParamOverrides::default())
        .await
        .unwrap();

    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.results[0].district, None);
    assert_eq!(batch.results[0].intent, Intent::Rescue);
    assert_eq!(batch.results[0].priority, Priority::High);
    assert_eq!(batch.results[1].district.as_deref(), Some("Kandy"));
    assert_eq!(batch.summary.usage.total_tokens, 220);

    let out = dir.path().join("output");
    let csv = storage::write_classified_csv(&out, &batch.results).unwrap();
    assert_eq!(csv.rows, 2);
    storage::write_classified_xlsx(&out, &batch.results).unwrap();

    let records = RunLogger::read(dispatcher.logger().path()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == CallStatus::Ok));
    assert!(records.iter().all(|r| r.attempts == 1));

    let report = RunLogger::summarize(dispatcher.logger().path()).unwrap();
    assert_eq!(report.total_calls, 2);
    assert_eq!(report.failed_calls, 0);
    assert!(report.total_cost_usd > 0.0);
}

#[tokio::test]
async fn test_transient_failures_leave_one_record_with_all_attempts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(3)
        .with_priority(1)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "District: Galle | Intent: Supply | Priority: High",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, &dir, 4);
    let outcome = classify::classify_message(
        &dispatcher,
        "Need water in Galle",
        ParamOverrides::default(),
    )
    .await
    .unwrap();
    assert_eq!(outcome.value.priority, Priority::High);

    let records = RunLogger::read(dispatcher.logger().path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CallStatus::Ok);
    assert_eq!(records[0].attempts, 4);
    assert!(records[0].backoff_ms_total >= 3);
}

#[tokio::test]
async fn test_authentication_failure_stops_batch_after_one_attempt() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, &dir, 3);
    let messages = vec!["first".to_string(), "second".to_string()];
    let err = classify::classify_batch(&dispatcher, &messages, ParamOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Authentication { .. }));
    assert!(err.is_fatal());

    let records = RunLogger::read(dispatcher.logger().path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].status,
        CallStatus::Error("authentication".to_string())
    );
    assert_eq!(records[0].attempts, 1);
}

#[tokio::test]
async fn test_extraction_drops_invalid_events() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    reply_when(
        &server,
        "Kelani river",
        r#"{"district": "Colombo", "flood_level": 2.4, "victim_count": "150", "main_need": "Boats", "status": "Critical"}"#,
    )
    .await;
    reply_when(&server, "Rumour", "I could not find an event in this text.").await;
    reply_when(
        &server,
        "Landslide",
        r#"{"district": "Ratnapura", "main_need": "Search and rescue", "status": "Warning"}"#,
    )
    .await;

    let news = vec![
        "Kelani river at 2.4m, 150 displaced in Colombo".to_string(),
        "Rumour of a dam break, unconfirmed".to_string(),
        "Landslide blocks road in Ratnapura".to_string(),
    ];

    let dispatcher = dispatcher(&server, &dir, 3);
    let batch = extract::extract_batch(&dispatcher, &news).await.unwrap();

    assert_eq!(batch.total, 3);
    assert_eq!(batch.successful, 2);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.events[0].district, District::Colombo);
    assert_eq!(batch.events[0].flood_level_meters, Some(2.4));
    assert_eq!(batch.events[0].victim_count, 150);
    assert_eq!(batch.events[1].flood_level_meters, None);

    let report = storage::write_flood_report_csv(&dir.path().join("output"), &batch.events).unwrap();
    assert_eq!(report.rows, 2);

    let records = RunLogger::read(dispatcher.logger().path()).unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_allocation_scores_and_routes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    reply_when(&server, "Family of 4", "Base Score: 5\nScore: 6/10").await;
    reply_when(&server, "insulin", "Base Score: 5\nMedical: +3\nScore: 8/10").await;
    // The route prompt quotes both incidents, so it must win over the score mocks
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Branch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Branch 1: highest priority first\nBranch 2: closest first\nBranch 3: furthest first\nBest strategy: Branch 1",
        )))
        .with_priority(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, &dir, 3);
    let incidents = vec![
        Incident::parse_line("Gampaha: Family of 4 needs food"),
        Incident::parse_line("Ja-Ela: Diabetic patient needs insulin"),
    ];

    let batch = allocate::score_batch(&dispatcher, &incidents).await.unwrap();
    assert_eq!(batch.scored.len(), 2);
    assert_eq!(batch.scored[0].score, 6);
    assert_eq!(batch.scored[1].score, 8);

    let plan = allocate::plan_route(&dispatcher, "Ragama", &batch.scored, None)
        .await
        .unwrap()
        .value;
    assert_eq!(plan.route, vec!["Ragama", "Ja-Ela", "Gampaha"]);
    assert_eq!(plan.total_priority_score, 14);
    assert_eq!(plan.strategy, RouteStrategy::HighestPriorityFirst);
}

#[tokio::test]
async fn test_spam_truncation_makes_no_call() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, &dir, 3);
    let message = "URGENT!!! Share with everyone, donations needed now. ".repeat(30);
    let result = spam::check(&dispatcher, &message, 40, GuardPolicy::Truncate)
        .await
        .unwrap();

    assert_eq!(result.status, spam::FilterStatus::Truncated);
    assert!(result.processed_token_count <= 40);
}
