// ABOUTME: PostgreSQL connection configuration for the analytics database
// ABOUTME: Handles the connection URL and connection pool sizing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use super::{env_parse_or, env_var_opt};
use crate::errors::{AppError, AppResult};

/// Analytics database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection string (`DATABASE_URL`)
    pub url: Option<String>,
    /// Connection pool configuration
    pub pool: PostgresPoolConfig,
}

impl DatabaseConfig {
    /// Load database configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a pool setting is present but malformed.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            url: env_var_opt("DATABASE_URL"),
            pool: PostgresPoolConfig::from_env()?,
        })
    }

    /// The connection URL, validated as a `PostgreSQL` URL
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `DATABASE_URL` is unset or is not a
    /// `postgres://` / `postgresql://` URL.
    pub fn require_url(&self) -> AppResult<&str> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| AppError::config("DATABASE_URL environment variable not set"))?;
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(url)
        } else {
            Err(AppError::config(
                "DATABASE_URL must be a postgres:// or postgresql:// URL",
            ))
        }
    }
}

impl Display for DatabaseConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        // Credentials never leave the process through logs
        match self.url.as_deref().and_then(|u| u.rsplit_once('@')) {
            Some((_, host)) => write!(f, "postgresql://***@{host}"),
            None if self.url.is_some() => f.write_str("postgresql://(configured)"),
            None => f.write_str("(not configured)"),
        }
    }
}

/// `PostgreSQL` connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresPoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
        }
    }
}

impl PostgresPoolConfig {
    /// Load pool configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a number.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_connections: env_parse_or("POSTGRES_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_parse_or("POSTGRES_MIN_CONNECTIONS", defaults.min_connections)?,
            acquire_timeout_secs: env_parse_or(
                "POSTGRES_ACQUIRE_TIMEOUT",
                defaults.acquire_timeout_secs,
            )?,
        })
    }
}
