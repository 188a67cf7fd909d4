//! Integration tests for the public endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{cost_row, user, TestHarness};

#[tokio::test]
async fn root_returns_banner() {
    let harness = TestHarness::new();

    let response = harness.server.get("/").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "This is Credit Service API.");
}

#[tokio::test]
async fn health_needs_no_api_key() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "egg-credit");
    assert_eq!(body["missedEventAppends"], 0);
    assert_eq!(body["unconfirmedDebits"], 0);
}

#[tokio::test]
async fn health_reports_missed_event_appends() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 500, 0, None).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 100)]);
    harness.store.fail_appends(true);

    let (name, value) = harness.api_key_header();
    harness
        .server
        .post("/api/v1/token_used")
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await
        .assert_status(StatusCode::CREATED);

    let body: Value = harness.server.get("/health").await.json();
    assert_eq!(body["missedEventAppends"], 1);
}
