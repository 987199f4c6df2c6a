// ABOUTME: Conversation history store configuration (in-memory or Redis)
// ABOUTME: Controls retained turn pairs and Redis connection/retry behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use text2sql_core::constants::history;

use super::{env_parse_or, env_var_opt};
use crate::errors::{AppError, AppResult};

/// Conversation history store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStoreConfig {
    /// Pairs retained per user (N)
    pub max_pairs: usize,
    /// Redis URL; in-memory store when unset
    pub redis_url: Option<String>,
    /// Redis connection behavior
    pub redis_connection: RedisConnectionConfig,
}

impl Default for HistoryStoreConfig {
    fn default() -> Self {
        Self {
            max_pairs: history::DEFAULT_MAX_PAIRS,
            redis_url: None,
            redis_connection: RedisConnectionConfig::default(),
        }
    }
}

impl HistoryStoreConfig {
    /// Load history store configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric setting is malformed or `MAX_HISTORY_PAIRS` is zero.
    pub fn from_env() -> AppResult<Self> {
        let max_pairs = env_parse_or("MAX_HISTORY_PAIRS", history::DEFAULT_MAX_PAIRS)?;
        if max_pairs == 0 {
            return Err(AppError::invalid_input(
                "MAX_HISTORY_PAIRS must be at least 1",
            ));
        }
        Ok(Self {
            max_pairs,
            redis_url: env_var_opt("REDIS_URL"),
            redis_connection: RedisConnectionConfig::from_env()?,
        })
    }

    /// Maximum turns kept per user
    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_pairs * 2
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response/command timeout in seconds
    pub response_timeout_secs: u64,
    /// Number of reconnection retries after connection drop
    pub reconnection_retries: usize,
    /// Exponential backoff base for retry delays
    pub retry_exponent_base: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Number of retries for initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 5,
            response_timeout_secs: 2,
            reconnection_retries: 3,
            retry_exponent_base: 2,
            max_retry_delay_ms: 5_000,
            initial_connection_retries: 3,
            initial_retry_delay_ms: 500,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a number.
    pub fn from_env() -> AppResult<Self> {
        let d = Self::default();
        Ok(Self {
            connection_timeout_secs: env_parse_or(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                d.connection_timeout_secs,
            )?,
            response_timeout_secs: env_parse_or(
                "REDIS_RESPONSE_TIMEOUT_SECS",
                d.response_timeout_secs,
            )?,
            reconnection_retries: env_parse_or(
                "REDIS_RECONNECTION_RETRIES",
                d.reconnection_retries,
            )?,
            retry_exponent_base: env_parse_or("REDIS_RETRY_EXPONENT_BASE", d.retry_exponent_base)?,
            max_retry_delay_ms: env_parse_or("REDIS_MAX_RETRY_DELAY_MS", d.max_retry_delay_ms)?,
            initial_connection_retries: env_parse_or(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                d.initial_connection_retries,
            )?,
            initial_retry_delay_ms: env_parse_or(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                d.initial_retry_delay_ms,
            )?,
        })
    }
}
