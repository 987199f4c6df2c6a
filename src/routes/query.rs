// ABOUTME: Query route handlers: natural-language questions and history reset
// ABOUTME: Maps pipeline results onto the public JSON response contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Query routes
//!
//! - `POST /process-text` answers one question
//! - `POST /clear-history` forgets a user's conversation

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use text2sql_core::models::{EngineKind, FinalResponse, OutputFormat, ResponseMetadata, Row};
use tracing::{info, Span};

use crate::errors::AppError;
use crate::pipeline::QueryRequest;
use crate::server::ServerResources;

/// Body of `POST /process-text`
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessTextRequest {
    /// Question in Russian, Kazakh or English
    pub natural_language_query: String,
    /// Caller key for conversation history
    pub user_id: String,
    /// Engine selector, `"api"` by default
    #[serde(default)]
    pub model: EngineKind,
}

/// Metadata block of a query response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponseMetadata {
    /// Pipeline metadata
    #[serde(flatten)]
    pub pipeline: ResponseMetadata,
    /// Execution time, repeated for clients that only read metadata
    pub execution_time_ms: f64,
    /// Row count, repeated for clients that only read metadata
    pub row_count: usize,
}

/// Body returned by `POST /process-text`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTextResponse {
    /// Answer text, SQL, or clarification question
    pub content: String,
    /// Presentation format of `data`
    pub output_format: OutputFormat,
    /// Rows, or `null` for a clarification
    pub data: Option<Vec<Row>>,
    /// Number of rows in `data`
    pub row_count: usize,
    /// Query execution time in milliseconds
    pub execution_time_ms: f64,
    /// Request metadata
    pub metadata: QueryResponseMetadata,
}

impl From<FinalResponse> for ProcessTextResponse {
    fn from(response: FinalResponse) -> Self {
        let row_count = response.row_count();
        Self {
            content: response.content,
            output_format: response.output_format,
            data: response.data_preview,
            row_count,
            execution_time_ms: response.execution_time_ms,
            metadata: QueryResponseMetadata {
                pipeline: response.metadata,
                execution_time_ms: response.execution_time_ms,
                row_count,
            },
        }
    }
}

/// Body of `POST /clear-history`
#[derive(Debug, Clone, Deserialize)]
pub struct ClearHistoryRequest {
    /// Caller key whose history is removed
    pub user_id: String,
}

/// Query route handlers
pub struct QueryRoutes;

impl QueryRoutes {
    /// Create the query routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/process-text", post(Self::process_text))
            .route("/clear-history", post(Self::clear_history))
            .with_state(resources)
    }

    async fn process_text(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<ProcessTextRequest>,
    ) -> Result<Response, AppError> {
        Span::current().record("user_id", request.user_id.as_str());
        info!(engine = %request.model, "Received query");

        let query = QueryRequest {
            query: request.natural_language_query,
            user_id: request.user_id.clone(),
            engine: request.model,
        };
        let response = resources
            .pipeline
            .process(&query)
            .await
            .map_err(|e| e.with_user_id(request.user_id))?;

        Ok((StatusCode::OK, Json(ProcessTextResponse::from(response))).into_response())
    }

    async fn clear_history(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<ClearHistoryRequest>,
    ) -> Result<Response, AppError> {
        Span::current().record("user_id", request.user_id.as_str());
        resources.pipeline.clear_history(&request.user_id).await?;

        let body = serde_json::json!({
            "message": format!("History cleared for user {}", request.user_id)
        });
        Ok((StatusCode::OK, Json(body)).into_response())
    }
}
