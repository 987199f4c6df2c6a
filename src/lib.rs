// ABOUTME: Main library entry point for the multilingual text-to-SQL analytics service
// ABOUTME: Turns Russian, Kazakh, and English questions into validated read-only SQL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// Crate-level attributes:
// - recursion_limit: Increased from default 128 to 256 for json! macros and
//   nested serde derives on response types
// - deny(unsafe_code): Zero-tolerance unsafe policy
#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Text2SQL Server
//!
//! Natural-language analytics over a single `transactions` table. A question
//! in Russian, Kazakh or English is classified, turned into one read-only
//! SQL statement by an LLM, validated against a denylist, executed with
//! paging, and returned as a table, a chart-ready dataset, or a short
//! natural-language answer.
//!
//! ## Features
//!
//! - **Two engines**: a cloud model (`api`) and a local Ollama model (`llm`)
//! - **Safety validation**: generated SQL is checked before and at execution
//! - **Conversation memory**: short answers to clarifying questions are expanded
//! - **Localized results**: column names follow the question's language
//!
//! ## Architecture
//!
//! - **Pipeline**: per-user serialized stages with time budgets
//! - **Intent**: clarity check, output-format decision, short-answer expansion
//! - **SQL generation**: prompt rendering, extraction strategies, bounded retries
//! - **Executor**: re-validation, `LIMIT`/`OFFSET` paging, streaming
//! - **Conversation**: in-memory or Redis history behind one trait
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use text2sql_server::config::ServerConfig;
//! use text2sql_server::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Text2SQL server configured on {}", config.bind_address());
//!     Ok(())
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// These modules are used by binary crates (src/bin/) and integration tests (tests/).

/// Environment-based configuration
pub mod config;

/// Per-user conversation history stores
pub mod conversation;

/// Unified error handling
pub mod errors;

/// Read-only SQL execution with paging
pub mod executor;

/// Clarity checks, output format decisions, and short-answer expansion
pub mod intent;

/// Deterministic language detection
pub mod language;

/// LLM providers and prompt templates
pub mod llm;

/// Structured logging setup
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// End-to-end request pipeline
pub mod pipeline;

/// Post-execution response shaping
pub mod response;

/// HTTP route handlers
pub mod routes;

/// Static description of the analytics table
pub mod schema;

/// HTTP server assembly
pub mod server;

/// SQL generation with retries
pub mod sql_generation;

/// SQL safety validation
pub mod validator;

pub use text2sql_core::{constants, models};
