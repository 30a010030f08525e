//! Integration tests for the compliance-web server.
//!
//! These tests start a real axum server on a random port, backed by a
//! scripted reasoning engine, and exercise every route over HTTP.

use std::sync::Arc;

use compliance_core::reasoning::{ReasoningError, ScriptedExchange, ScriptedReasoner};
use compliance_core::tools::ToolRegistry;
use compliance_core::tools::scanning::ScanForSecrets;
use compliance_web::{WebConfig, spawn_web};
use tempfile::TempDir;

/// Helper: spawn a test server on port 0 with its own upload directory.
async fn spawn_test_server(engine: ScriptedReasoner) -> (String, TempDir) {
    let uploads = tempfile::tempdir().unwrap();
    let config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
        upload_dir: uploads.path().to_path_buf(),
        ..Default::default()
    };
    let tools = ToolRegistry::new().with(ScanForSecrets);
    let addr = spawn_web(Arc::new(engine), Arc::new(tools), config)
        .await
        .unwrap();
    (format!("http://{addr}"), uploads)
}

async fn upload(client: &reqwest::Client, base: &str) -> serde_json::Value {
    upload_texts(client, base, "A.9 Access control".into(), "Passwords rotate yearly".into()).await
}

async fn upload_texts(
    client: &reqwest::Client,
    base: &str,
    norm: String,
    pssi: String,
) -> serde_json::Value {
    let form = reqwest::multipart::Form::new()
        .part("norm", reqwest::multipart::Part::text(norm).file_name("norm.txt"))
        .part("pssi", reqwest::multipart::Part::text(pssi).file_name("pssi.txt"));
    let resp = client
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

// ── Basic routes ─────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let json: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn upload_stores_both_documents() {
    let (base, dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let client = reqwest::Client::new();
    let json = upload(&client, &base).await;

    let norm_id = json["norm_id"].as_str().unwrap();
    assert!(norm_id.ends_with(".txt"));
    assert!(json["uploaded_at"].is_string());
    let stored = std::fs::read_to_string(dir.path().join(norm_id)).unwrap();
    assert_eq!(stored, "A.9 Access control");
}

#[tokio::test]
async fn upload_without_pssi_is_400() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let form = reqwest::multipart::Form::new()
        .part("norm", reqwest::multipart::Part::text("x").file_name("n.txt"));
    let resp = reqwest::Client::new()
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["kind"], "invalid_input");
}

// ── Analysis routes ──────────────────────────────────────────────────

#[tokio::test]
async fn analyze_runs_both_passes() {
    let engine = ScriptedReasoner::new()
        .with_exchange(ScriptedExchange::text("## Compliance Score\n**40/100**"))
        .with_exchange(ScriptedExchange::text("## Infrastructure Compliance Score\n**90/100**"));
    let (base, _dir) = spawn_test_server(engine).await;
    let client = reqwest::Client::new();
    let ids = upload(&client, &base).await;

    let resp = client
        .post(format!("{base}/analyze"))
        .form(&[
            ("norm_id", ids["norm_id"].as_str().unwrap()),
            ("pssi_id", ids["pssi_id"].as_str().unwrap()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["document_analysis"]["score"], serde_json::json!({"parsed": 40}));
    assert_eq!(json["infrastructure_analysis"]["score"], serde_json::json!({"parsed": 90}));
    assert_eq!(json["document_analysis"]["status"], "completed");
}

#[tokio::test]
async fn analyze_unknown_document_is_404() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/analyze"))
        .form(&[("norm_id", "missing.txt"), ("pssi_id", "missing.txt")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn analyze_rejects_path_traversal() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/analyze"))
        .form(&[("norm_id", "../Cargo.toml"), ("pssi_id", "x.txt")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn reflect_analyze_returns_final_report() {
    let engine = ScriptedReasoner::new()
        .with_exchange(ScriptedExchange::text("Checked the policy"))
        .with_completion("NO")
        .with_completion("## Compliance Score\n**75/100**");
    let (base, _dir) = spawn_test_server(engine).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/reflect_analyze"))
        .form(&[("policy", "All buckets must be private")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["cycles"], 1);
    assert_eq!(json["halt_reason"], "reflection_declined");
    assert_eq!(json["score"], serde_json::json!({"parsed": 75}));
    assert_eq!(json["token_usage"]["max_limit"], 60_000);
    assert_eq!(json["truncated"], false);
}

#[tokio::test]
async fn context_overflow_is_413() {
    let engine = ScriptedReasoner::new()
        .with_exchange_error(ReasoningError::ContextLength("maximum context length exceeded".into()));
    let (base, _dir) = spawn_test_server(engine).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/reflect_analyze"))
        .form(&[("policy", "policy text")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["kind"], "resource_exhausted");
    assert!(json["message"].as_str().unwrap().contains("reduce its size"));
}

#[tokio::test]
async fn reasoning_failure_is_500() {
    let engine = ScriptedReasoner::new().with_exchange_error(ReasoningError::Request("HTTP 503".into()));
    let (base, _dir) = spawn_test_server(engine).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/reflect_analyze"))
        .form(&[("policy", "policy text")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn fast_analyze_with_no_inventory_tools() {
    let engine = ScriptedReasoner::new()
        .with_completion(r#"{"checks": ["storage"], "priority": "critical"}"#)
        .with_completion("Nothing could be checked.");
    let (base, _dir) = spawn_test_server(engine).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/fast_analyze"))
        .form(&[("policy", "Buckets must be private")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["priority"], "critical");
    assert_eq!(json["summary"], "Nothing could be checked.");
    // No storage tool is registered, so nothing runs and nothing is ticketed.
    assert!(json["findings"].as_array().unwrap().is_empty());
    assert!(json["tickets"].as_array().unwrap().is_empty());
    assert_eq!(json["truncated"], false);
}

#[tokio::test]
async fn fast_analyze_flags_truncated_policy() {
    let engine = ScriptedReasoner::new()
        .with_completion(r#"{"checks": ["database"]}"#)
        .with_completion("summary");
    let (base, _dir) = spawn_test_server(engine).await;
    let policy = "p".repeat(50_000);
    let resp = reqwest::Client::new()
        .post(format!("{base}/fast_analyze"))
        .form(&[("policy", policy.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["truncated"], true);
    assert_eq!(json["original_token_estimate"], 12_500);
    assert!(json["truncation_notice"].as_str().unwrap().contains("12500"));
}

#[tokio::test]
async fn analyze_flags_truncated_documents() {
    let engine = ScriptedReasoner::new()
        .with_exchange(ScriptedExchange::text("documents"))
        .with_exchange(ScriptedExchange::text("infrastructure"));
    let (base, _dir) = spawn_test_server(engine).await;
    let client = reqwest::Client::new();
    let ids = upload_texts(&client, &base, "n".repeat(50_000), "Passwords rotate yearly".into()).await;

    let resp = client
        .post(format!("{base}/analyze"))
        .form(&[
            ("norm_id", ids["norm_id"].as_str().unwrap()),
            ("pssi_id", ids["pssi_id"].as_str().unwrap()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["document_analysis"]["truncated"], true);
    assert!(json["document_analysis"]["truncation_notice"].is_string());
    // Only the norm was oversized.
    assert_eq!(json["infrastructure_analysis"]["truncated"], false);
}

#[tokio::test]
async fn missing_form_field_is_400() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/fast_analyze"))
        .form(&[("wrong", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// ── Tickets ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_ticket_reports_tool_failure_in_body() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/create-ticket"))
        .json(&serde_json::json!({"summary": "Public bucket", "description": "logs bucket"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "failure");
    assert!(json["result"].as_str().unwrap().contains("not registered"));
}

#[tokio::test]
async fn create_ticket_requires_summary() {
    let (base, _dir) = spawn_test_server(ScriptedReasoner::new()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/create-ticket"))
        .json(&serde_json::json!({"summary": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
