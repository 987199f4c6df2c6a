// ABOUTME: HTTP server assembly: shared resources, router, middleware stack, and serve loop
// ABOUTME: Binds the configured address and shuts down gracefully on Ctrl-C
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # HTTP Server
//!
//! Routes are merged from [`QueryRoutes`] and [`HealthRoutes`] and wrapped
//! in request-id propagation, request tracing, and CORS.

use std::future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::middleware::{create_request_span, setup_cors, MakeRequestUuid, REQUEST_ID_HEADER};
use crate::pipeline::QueryPipeline;
use crate::routes::{HealthRoutes, QueryRoutes};

/// State shared by every route handler
pub struct ServerResources {
    /// The request pipeline and its collaborators
    pub pipeline: QueryPipeline,
}

impl ServerResources {
    /// Wrap a pipeline for sharing across handlers
    #[must_use]
    pub const fn new(pipeline: QueryPipeline) -> Self {
        Self { pipeline }
    }
}

/// Build the application router with its middleware stack
#[must_use]
pub fn build_router(resources: &Arc<ServerResources>, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(QueryRoutes::routes(Arc::clone(resources)))
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .layer(setup_cors(cors_origins))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http().make_span_with(create_request_span))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
}

/// Serve HTTP until Ctrl-C
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run(config: &ServerConfig, resources: Arc<ServerResources>) -> AppResult<()> {
    let app = build_router(&resources, &config.cors_origins);
    let address = config.bind_address();

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::config(format!("Failed to bind {address}: {e}")))?;
    info!(%address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("HTTP server failed: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            future::pending::<()>().await;
        }
    }
}
