// ABOUTME: Health check route handler for service monitoring
// ABOUTME: Reports database reachability, configured engines, and the history backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes for service monitoring

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Map, Value};
use text2sql_core::constants::service;

use crate::server::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .with_state(resources)
    }

    async fn health(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
        let pipeline = &resources.pipeline;
        let database = pipeline
            .executor()
            .backend()
            .health_check()
            .await
            .unwrap_or(false);

        let engines: Map<String, Value> = pipeline
            .engines()
            .health()
            .await
            .into_iter()
            .map(|(kind, healthy)| (kind.to_string(), Value::Bool(healthy)))
            .collect();

        let status = if database { "healthy" } else { "degraded" };
        Json(json!({
            "status": status,
            "service": service::NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "engines": engines,
            "history_store": pipeline.store().backend(),
            "timestamp": Utc::now().to_rfc3339()
        }))
    }
}
