//! CLI integration tests for ditwah
//!
//! Tests the ditwah CLI commands end-to-end using assert_cmd. None of these
//! reach a model provider.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const LOG_HEADER: &str = "call_id,timestamp,provider,model,technique,prompt_tokens,completion_tokens,cost_estimate_usd,status,attempts,backoff_ms_total,latency_ms,overflow_handled";

/// Command isolated from the user's config, keys and provider choice
#[allow(deprecated)]
fn ditwah_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ditwah").unwrap();
    cmd.current_dir(home.path());
    cmd.env("DITWAH_CONFIG_DIR", home.path().join("config"));
    for var in [
        "DITWAH_PROVIDER",
        "DEFAULT_PROVIDER",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "GROQ_API_KEY",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_route_table_for_groq() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["route", "--provider", "groq"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llama-3.1-8b-instant"))
        .stdout(predicate::str::contains("llama-3.3-70b-versatile"))
        .stdout(predicate::str::contains("summarization"));
}

#[test]
fn test_route_accepts_alias() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["route", "json_extract", "--provider", "openai"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extraction"))
        .stdout(predicate::str::contains("gpt-4o-mini"))
        .stdout(predicate::str::contains("json"));
}

#[test]
fn test_route_rejects_unknown_technique() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["route", "poetry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown technique"));
}

#[test]
fn test_route_json_output() {
    let home = TempDir::new().unwrap();

    let output = ditwah_cmd(&home)
        .args(["route", "--format", "json", "--provider", "google"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let decisions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let decisions = decisions.as_array().unwrap();
    assert_eq!(decisions.len(), 7);
    assert_eq!(decisions[0]["provider"], "google");
    assert_eq!(decisions[0]["model"], "gemini-1.5-flash");
}

#[test]
fn test_provider_from_environment() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .env("DITWAH_PROVIDER", "google")
        .args(["route", "cot_reasoning"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-1.5-pro"));
}

#[test]
fn test_config_set_get_and_reset() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["config", "set", "guard.max_tokens", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set guard.max_tokens = 200"));

    ditwah_cmd(&home)
        .args(["config", "get", "guard.max_tokens"])
        .assert()
        .success()
        .stdout(predicate::str::diff("200\n"));

    assert!(home.path().join("config/config.toml").exists());

    ditwah_cmd(&home).args(["config", "reset"]).assert().success();

    ditwah_cmd(&home)
        .args(["config", "get", "guard.max_tokens"])
        .assert()
        .success()
        .stdout(predicate::str::diff("150\n"));
}

#[test]
fn test_config_rejects_unknown_key_and_api_keys() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["config", "set", "llm.colour", "blue"])
        .assert()
        .failure();

    ditwah_cmd(&home)
        .args(["config", "set", "llm.api_key", "sk-secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be stored"));
}

#[test]
fn test_config_list_and_path() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llm.provider = groq"))
        .stdout(predicate::str::contains("guard.policy = truncate"))
        .stdout(predicate::str::contains("output.log_file = llm_calls.csv"));

    ditwah_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_tokens_truncates_long_message() {
    let home = TempDir::new().unwrap();
    let message = "URGENT flood relief donations needed, forward to everyone! ".repeat(20);

    ditwah_cmd(&home)
        .args([
            "tokens",
            "--provider",
            "google",
            "--policy",
            "truncate",
            "--ceiling",
            "40",
            "--message",
            &message,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[TRUNCATED]"))
        .stdout(predicate::str::contains("Tokenizer: heuristic"));
}

#[test]
fn test_tokens_block_and_accept() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("messages.txt");
    std::fs::write(
        &input,
        format!("Need water in Galle\n\n{}\n", "spam ".repeat(200)),
    )
    .unwrap();

    let output = ditwah_cmd(&home)
        .args([
            "tokens",
            "--provider",
            "groq",
            "--policy",
            "block",
            "--ceiling",
            "50",
            "--format",
            "json",
            "--input",
        ])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = &results["results"];
    assert_eq!(results[0]["status"], "ACCEPTED");
    assert_eq!(results[0]["processed_message"], "Need water in Galle");
    assert_eq!(results[1]["status"], "BLOCKED");
    assert_eq!(results[1]["processed_message"], "");
}

#[test]
fn test_tokens_rejects_unknown_policy() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["tokens", "--policy", "shred", "--message", "hello"])
        .assert()
        .failure();
}

#[test]
fn test_classify_without_api_key_fails_with_hint() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["classify", "--provider", "groq", "--message", "SOS in Kandy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GROQ_API_KEY"));
}

#[test]
fn test_missing_input_file() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["extract", "--input", "no-such-news.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_costs_without_log() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["costs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No calls logged yet"));
}

#[test]
fn test_costs_summarizes_log() {
    let home = TempDir::new().unwrap();
    let log = home.path().join("llm_calls.csv");
    std::fs::write(
        &log,
        format!(
            "{}\n\
             a1,2026-10-18T09:00:00Z,groq,llama-3.1-8b-instant,classification,1000000,0,0.05,ok,1,0,120,false\n\
             a2,2026-10-18T09:05:00Z,groq,llama-3.3-70b-versatile,cot_reasoning,0,0,0.0,error:transient,3,3000,9000,false\n\
             a3,2026-10-19T08:00:00Z,openai,gpt-4o-mini,extraction,0,1000000,0.6,ok,2,1000,800,true\n",
            LOG_HEADER
        ),
    )
    .unwrap();

    ditwah_cmd(&home)
        .args(["costs", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-10-18"))
        .stdout(predicate::str::contains("2026-10-19"))
        .stdout(predicate::str::contains("gpt-4o-mini"))
        .stdout(predicate::str::contains("3 calls (1 failed, 6 HTTP attempts)"));

    let output = ditwah_cmd(&home)
        .args(["costs", "--format", "json", "--log"])
        .arg(&log)
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_calls"], 3);
    assert_eq!(report["failed_calls"], 1);
    let total = report["total_cost_usd"].as_f64().unwrap();
    assert!((total - 0.65).abs() < 1e-9);
}

#[test]
fn test_doctor_reports_missing_key() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .args(["doctor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ditwah Health Check"))
        .stdout(predicate::str::contains("[OK] Provider: groq"))
        .stdout(predicate::str::contains("GROQ_API_KEY not set"))
        .stdout(predicate::str::contains("Some checks failed"));
}

#[test]
fn test_doctor_passes_with_key() {
    let home = TempDir::new().unwrap();

    ditwah_cmd(&home)
        .env("GROQ_API_KEY", "gsk_test_key")
        .args(["doctor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All checks passed!"));
}
