// ABOUTME: Route module organization for the text-to-SQL HTTP endpoints
// ABOUTME: Query routes and health checks, each a thin layer over the pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the query API
//!
//! Each domain module contains only route definitions and thin handlers that
//! delegate to the pipeline.

/// Health check and system status routes
pub mod health;
/// Question answering and history routes
pub mod query;

/// Health route handlers
pub use health::HealthRoutes;
/// Query route handlers and wire types
pub use query::{
    ClearHistoryRequest, ProcessTextRequest, ProcessTextResponse, QueryResponseMetadata,
    QueryRoutes,
};
