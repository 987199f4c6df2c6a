// ABOUTME: Top-level server configuration assembled from environment variables
// ABOUTME: Listener address, CORS origins, log level, and nested subsystem configs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::Level;

use super::{
    env_parse_or, env_var_or, DatabaseConfig, HistoryStoreConfig, LlmConfig, PipelineConfig,
};
use crate::errors::AppResult;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational (default)
    #[default]
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP listener port
    pub http_port: u16,
    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Log level
    pub log_level: LogLevel,
    /// Analytics database
    pub database: DatabaseConfig,
    /// LLM engines
    pub llm: LlmConfig,
    /// Conversation history store
    pub history: HistoryStoreConfig,
    /// Pipeline tuning
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            http_port: 8000,
            cors_origins: vec!["*".to_owned()],
            log_level: LogLevel::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            history: HistoryStoreConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load the full configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but malformed.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            host: env_var_or("HOST", "0.0.0.0"),
            http_port: env_parse_or("HTTP_PORT", 8000)?,
            cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")),
            log_level: LogLevel::from_str_or_default(&env_var_or("RUST_LOG", "info")),
            database: DatabaseConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            history: HistoryStoreConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
        })
    }

    /// Socket address string for the listener
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Human-readable summary without secrets
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Text2SQL Server Configuration:\n\
             - HTTP: {}\n\
             - Log Level: {}\n\
             - Database: {}\n\
             - Cloud LLM: {} ({})\n\
             - Local LLM: {} at {}\n\
             - History Store: {} (max {} pairs)\n\
             - Format Strategy: {}\n\
             - Max Retries: {}\n\
             - Max Result Rows: {}\n\
             - CORS Origins: {}",
            self.bind_address(),
            self.log_level,
            self.database,
            self.llm.gemini.model,
            if self.llm.gemini.api_key.is_some() {
                "configured"
            } else {
                "missing API key"
            },
            self.llm.ollama.model,
            self.llm.ollama.base_url,
            if self.history.redis_url.is_some() {
                "Redis"
            } else {
                "in-memory"
            },
            self.history.max_pairs,
            self.pipeline.format_strategy,
            self.pipeline.max_retries,
            self.pipeline.max_result_rows,
            self.cors_origins.join(", "),
        )
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("http://localhost:3000, https://bi.example.kz,"),
            vec!["http://localhost:3000", "https://bi.example.kz"]
        );
    }

    #[test]
    fn test_summary_hides_secrets() {
        let mut config = ServerConfig::default();
        config.llm.gemini.api_key = Some("AIza-very-secret".to_owned());
        let summary = config.summary();
        assert!(!summary.contains("AIza-very-secret"));
        assert!(summary.contains("0.0.0.0:8000"));
    }

    #[test]
    fn test_log_level_fallback() {
        assert_eq!(LogLevel::from_str_or_default("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("verbose"), LogLevel::Info);
    }
}
