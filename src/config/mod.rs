// ABOUTME: Configuration module root with environment parsing helpers
// ABOUTME: Groups server, database, LLM, history store, and pipeline settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-only configuration.
//!
//! Every setting is read from process environment variables (optionally
//! seeded from a `.env` file by the binaries). Each config struct offers
//! `from_env()` for production and `Default` for tests.

/// PostgreSQL connection settings
pub mod database;
/// Top-level server configuration
pub mod environment;
/// Conversation history store settings
pub mod history;
/// LLM engine settings
pub mod llm;
/// Pipeline limits, budgets, and strategies
pub mod pipeline;

pub use database::{DatabaseConfig, PostgresPoolConfig};
pub use environment::{LogLevel, ServerConfig};
pub use history::{HistoryStoreConfig, RedisConnectionConfig};
pub use llm::{GeminiConfig, LlmConfig, OllamaConfig};
pub use pipeline::{FormatStrategy, PipelineConfig, StageTimeouts};

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

/// Get environment variable or default value
pub(crate) fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Get a non-empty environment variable
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset
///
/// # Errors
///
/// Returns an error if the variable is set but does not parse as `T`.
pub(crate) fn env_parse_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::invalid_input(format!("Invalid value for {key}: '{raw}' ({e})"))
        }),
        None => Ok(default),
    }
}
