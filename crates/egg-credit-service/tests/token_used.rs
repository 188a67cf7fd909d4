//! Integration tests for usage debits.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use common::{cost_row, user, TestHarness, MAIN_PACKAGE};
use egg_credit_service::CostRow;
use egg_credit_store::Store;

const TOKEN_USED: &str = "/api/v1/token_used";

// =============================================================================
// Successful debits
// =============================================================================

#[tokio::test]
async fn debit_spends_topup_first_below_threshold() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 0, 200, None).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 500)]);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1", "agentId": "agent-7"}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let event: Value = response.json();
    assert_eq!(event["eventType"], "Token Used");
    assert_eq!(event["eggToken"], -175);
    assert_eq!(event["chatToken"], -175);
    assert_eq!(event["websearchToken"], 0);
    assert_eq!(event["traceId"], "trace-1");
    assert_eq!(event["aiModel"], "gpt-4o");
    assert_eq!(event["agentId"], "agent-7");
    assert_eq!(event["packageId"], MAIN_PACKAGE);
    assert_eq!(event["subscriptionId"], "sub-1");

    let balance = harness.balance(&user_id).await.unwrap();
    assert_eq!(balance.main_token_balance, 0);
    assert_eq!(balance.topup_token_balance, 25);
    assert_eq!(balance.remaining_token_balance, 25);
    assert_eq!(balance.total_token, 825);

    let events = harness.store.list_events(&user_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].egg_token, -175);
}

#[tokio::test]
async fn debit_spends_main_at_threshold_and_adds_websearch() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 500, 0, None).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 100)]);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1", "websearchCost": 0.5}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let event: Value = response.json();
    assert_eq!(event["eggToken"], -53);
    assert_eq!(event["chatToken"], -35);
    assert_eq!(event["websearchToken"], -18);

    let balance = harness.balance(&user_id).await.unwrap();
    assert_eq!(balance.main_token_balance, 447);
    assert_eq!(balance.topup_token_balance, 0);
    assert_eq!(balance.remaining_token_balance, 447);
}

#[tokio::test]
async fn debit_divides_by_package_ratio() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 500, 0, Some(Decimal::from(5))).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 200)]);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let event: Value = response.json();
    assert_eq!(event["eggToken"], -14);
}

#[tokio::test]
async fn debit_sums_rows_and_names_first_model() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 500, 0, None).await;
    harness.costs.set_rows(vec![
        CostRow::new(None, Decimal::from(40)),
        cost_row("claude", 30),
        cost_row("gpt-4o", 30),
    ]);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let event: Value = response.json();
    assert_eq!(event["eggToken"], -35);
    assert_eq!(event["aiModel"], "claude");
}

// =============================================================================
// Preconditions
// =============================================================================

#[tokio::test]
async fn exhausted_balance_skips_cost_lookup() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 0, 0, None).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 500)]);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["detail"], "No token balance remaining.");
    assert_eq!(body["code"], "balance_exhausted");
    assert_eq!(harness.costs.calls(), 0);
}

#[tokio::test]
async fn missing_main_package_is_forbidden() {
    let harness = TestHarness::new();

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "nobody", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["detail"], "User has no main package.");
    assert_eq!(body["code"], "no_main_package");
    assert_eq!(harness.costs.calls(), 0);
}

#[tokio::test]
async fn missing_balance_document_is_forbidden() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    common::seed_main_package(&harness.store.inner, &user_id, None).await;

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "no_balance");
}

#[tokio::test]
async fn no_cost_found_leaves_balance_untouched() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 0, 200, None).await;

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["detail"], "No Portkey cost found for traceId.");

    let balance = harness.balance(&user_id).await.unwrap();
    assert_eq!(balance.remaining_token_balance, 200);
    assert_eq!(balance.topup_token_balance, 200);
    assert!(harness.store.list_events(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn zero_cost_rows_count_as_no_cost() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 0, 200, None).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 0)]);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// Upstream failures
// =============================================================================

#[tokio::test]
async fn provider_rejection_passes_status_and_payload() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 0, 200, None).await;
    harness.costs.reject_with(429);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Portkey API error (status 429)");
    assert_eq!(body["error"], json!({"error": {"message": "rate limited"}}));

    let balance = harness.balance(&user_id).await.unwrap();
    assert_eq!(balance.remaining_token_balance, 200);
}

#[tokio::test]
async fn failed_increment_records_nothing() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 0, 200, None).await;
    harness.costs.set_rows(vec![cost_row("gpt-4o", 500)]);
    harness.store.fail_increments(true);

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(harness.store.list_events(&user_id).await.unwrap().is_empty());
}

// =============================================================================
// Request validation and auth
// =============================================================================

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let harness = TestHarness::new();

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Invalid request body");
}

#[tokio::test]
async fn blank_user_id_is_bad_request() {
    let harness = TestHarness::new();

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "  ", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.costs.calls(), 0);
}

#[tokio::test]
async fn negative_websearch_cost_is_bad_request() {
    let harness = TestHarness::new();
    let user_id = user("user-1");
    harness.seed_user(&user_id, 500, 0, None).await;

    let (name, value) = harness.api_key_header();
    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(name, value)
        .json(&json!({"userId": "user-1", "traceId": "trace-1", "websearchCost": -1}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.costs.calls(), 0);
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(TOKEN_USED)
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(TOKEN_USED)
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("wrong-key"),
        )
        .json(&json!({"userId": "user-1", "traceId": "trace-1"}))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(harness.costs.calls(), 0);
}
