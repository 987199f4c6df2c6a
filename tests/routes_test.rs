// ABOUTME: Integration tests for the HTTP routes and middleware stack
// ABOUTME: Tests response contracts, error envelopes, history reset, health, and request IDs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use common::{create_test_server_resources, row, FakeBackend, Reply, ScriptedLlm, Stage};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use text2sql_server::models::OutputFormat;
use text2sql_server::routes::ProcessTextResponse;
use text2sql_server::server::build_router;

// ============================================================================
// Test Helpers
// ============================================================================

fn setup_router(llm: &Arc<ScriptedLlm>, backend: &Arc<FakeBackend>) -> Router {
    let resources = create_test_server_resources(llm, backend);
    build_router(&resources, &["*".to_owned()])
}

fn count_script(llm: &ScriptedLlm) {
    llm.push(Stage::Format, Reply::format("text"))
        .push(
            Stage::Generation,
            Reply::sql("SELECT COUNT(*) AS transaction_count FROM transactions"),
        )
        .push(Stage::Summary, Reply::text("Всего 7 транзакций."));
}

// ============================================================================
// POST /process-text
// ============================================================================

#[tokio::test]
async fn test_process_text_text_answer() {
    let llm = ScriptedLlm::new();
    count_script(&llm);
    let backend = FakeBackend::with_rows(vec![row(json!({ "transaction_count": 7 }))]);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::post("/process-text")
        .json(&json!({
            "natural_language_query": "Сколько транзакций?",
            "user_id": "u1",
            "model": "api"
        }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let request_id = response.header("x-request-id").unwrap();
    assert!(request_id.starts_with("req_"));

    let body: ProcessTextResponse = response.json();
    assert_eq!(body.content, "Всего 7 транзакций.");
    assert_eq!(body.output_format, OutputFormat::Text);
    assert_eq!(body.row_count, 1);
    assert_eq!(body.data.unwrap()[0]["text"], json!("Всего 7 транзакций."));
    assert!(!body.metadata.pipeline.requires_clarification);
    assert_eq!(body.metadata.row_count, 1);
    assert_eq!(
        body.metadata.pipeline.sql_query.as_deref(),
        Some("SELECT COUNT(*) AS transaction_count FROM transactions")
    );
}

#[tokio::test]
async fn test_process_text_defaults_to_api_engine() {
    let llm = ScriptedLlm::new();
    count_script(&llm);
    let backend = FakeBackend::with_rows(vec![row(json!({ "transaction_count": 7 }))]);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::post("/process-text")
        .json(&json!({
            "natural_language_query": "Сколько транзакций?",
            "user_id": "u1"
        }))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["metadata"]["engine"], "api");
    assert_eq!(body["metadata"]["language"], "ru");
}

#[tokio::test]
async fn test_clarification_response_shape() {
    let llm = ScriptedLlm::new();
    llm.push(Stage::Clarity, Reply::unclear("За какой период?"));
    let backend = FakeBackend::numbered(1);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::post("/process-text")
        .json(&json!({
            "natural_language_query": "Покажи транзакции",
            "user_id": "u1"
        }))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["content"], "За какой период?");
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["row_count"], 0);
    assert_eq!(body["execution_time_ms"], 0.0);
    assert_eq!(body["metadata"]["requires_clarification"], true);
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let llm = ScriptedLlm::new();
    let backend = FakeBackend::numbered(1);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::post("/process-text")
        .json(&json!({ "natural_language_query": "", "user_id": "u1" }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_unsafe_sql_is_forbidden() {
    let llm = ScriptedLlm::new();
    llm.push(Stage::Format, Reply::format("table")).always(
        Stage::Generation,
        Reply::sql("SELECT * FROM transactions; DROP TABLE transactions;"),
    );
    let backend = FakeBackend::numbered(1);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::post("/process-text")
        .json(&json!({
            "natural_language_query": "Покажи транзакции",
            "user_id": "u1"
        }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Query violates security policy:"));
    assert!(backend.statements().is_empty());
}

#[tokio::test]
async fn test_unconfigured_engine_is_server_error() {
    let llm = ScriptedLlm::new();
    let backend = FakeBackend::numbered(1);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::post("/process-text")
        .json(&json!({
            "natural_language_query": "Сколько транзакций?",
            "user_id": "u1",
            "model": "llm"
        }))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFIG_MISSING");
}

#[tokio::test]
async fn test_incoming_request_id_is_propagated() {
    let llm = ScriptedLlm::new();
    let backend = FakeBackend::numbered(1);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::get("/health")
        .header("x-request-id", "req_from_client")
        .send(router)
        .await;

    assert_eq!(response.header("x-request-id").as_deref(), Some("req_from_client"));
}

// ============================================================================
// POST /clear-history
// ============================================================================

#[tokio::test]
async fn test_clear_history_route() {
    let llm = ScriptedLlm::new();
    llm.push(Stage::Clarity, Reply::unclear("За какой период?"));
    let backend = FakeBackend::numbered(1);
    let resources = create_test_server_resources(&llm, &backend);
    let router = build_router(&resources, &[]);

    AxumTestRequest::post("/process-text")
        .json(&json!({ "natural_language_query": "Покажи транзакции", "user_id": "u7" }))
        .send(router.clone())
        .await;
    assert_eq!(resources.pipeline.store().get("u7").await.len(), 2);

    for _ in 0..2 {
        let response = AxumTestRequest::post("/clear-history")
            .json(&json!({ "user_id": "u7" }))
            .send(router.clone())
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json();
        assert_eq!(body["message"], "History cleared for user u7");
    }
    assert!(resources.pipeline.store().get("u7").await.is_empty());
}

// ============================================================================
// GET /health
// ============================================================================

#[tokio::test]
async fn test_health_reports_components() {
    let llm = ScriptedLlm::new();
    let backend = FakeBackend::numbered(1);
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::get("/health").send(router).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "text2sql-server");
    assert_eq!(body["database"], true);
    assert_eq!(body["engines"], json!({ "api": true }));
    assert_eq!(body["history_store"], "memory");
}

#[tokio::test]
async fn test_health_degraded_without_database() {
    let llm = ScriptedLlm::new();
    let backend = FakeBackend::failing("connection refused");
    let router = setup_router(&llm, &backend);

    let response = AxumTestRequest::get("/health").send(router).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
}
