// ABOUTME: Pipeline tuning: retry budgets, paging limits, intent threshold, stage timeouts
// ABOUTME: All heuristics that used to be hard constants are configurable here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use text2sql_core::constants::{execution, generation, timeouts};

use super::{env_parse_or, env_var_or};
use crate::errors::{AppError, AppResult};

/// How the output format is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStrategy {
    /// Ask the LLM (with clarification support)
    #[default]
    Llm,
    /// Keyword heuristics only
    Keywords,
}

impl FromStr for FormatStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "keywords" | "keyword" => Ok(Self::Keywords),
            other => Err(AppError::invalid_input(format!(
                "Unknown FORMAT_STRATEGY '{other}' (expected 'llm' or 'keywords')"
            ))),
        }
    }
}

impl Display for FormatStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Llm => f.write_str("llm"),
            Self::Keywords => f.write_str("keywords"),
        }
    }
}

/// Time budget for each pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimeouts {
    /// Clarity and format classification (fail-open)
    pub classifier: Duration,
    /// SQL generation loop (hard failure)
    pub generation: Duration,
    /// Query execution (hard failure)
    pub execution: Duration,
    /// Column translation and text summary (fail-open)
    pub assembly: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            classifier: Duration::from_secs(timeouts::CLASSIFIER_SECS),
            generation: Duration::from_secs(timeouts::GENERATION_SECS),
            execution: Duration::from_secs(timeouts::EXECUTION_SECS),
            assembly: Duration::from_secs(timeouts::ASSEMBLY_SECS),
        }
    }
}

impl StageTimeouts {
    /// Load stage budgets from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a budget is malformed.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            classifier: Duration::from_secs(env_parse_or(
                "CLASSIFIER_TIMEOUT_SECS",
                timeouts::CLASSIFIER_SECS,
            )?),
            generation: Duration::from_secs(env_parse_or(
                "GENERATION_TIMEOUT_SECS",
                timeouts::GENERATION_SECS,
            )?),
            execution: Duration::from_secs(env_parse_or(
                "EXECUTION_TIMEOUT_SECS",
                timeouts::EXECUTION_SECS,
            )?),
            assembly: Duration::from_secs(env_parse_or(
                "ASSEMBLY_TIMEOUT_SECS",
                timeouts::ASSEMBLY_SECS,
            )?),
        })
    }
}

/// Tunable pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retries per failure kind in the generation loop
    pub max_retries: u32,
    /// Rows fetched per page when the SQL has no LIMIT
    pub batch_size: usize,
    /// Hard cap on returned rows
    pub max_result_rows: usize,
    /// Rows per batch in the streaming executor
    pub stream_batch_size: usize,
    /// Minimum keyword overlap for `matches_intent`
    pub intent_threshold: f64,
    /// Format decision strategy
    pub format_strategy: FormatStrategy,
    /// Stage time budgets
    pub timeouts: StageTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: generation::DEFAULT_MAX_RETRIES,
            batch_size: execution::DEFAULT_BATCH_SIZE,
            max_result_rows: execution::DEFAULT_MAX_RESULT_ROWS,
            stream_batch_size: execution::DEFAULT_STREAM_BATCH_SIZE,
            intent_threshold: generation::DEFAULT_INTENT_THRESHOLD,
            format_strategy: FormatStrategy::default(),
            timeouts: StageTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed or out of range.
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            max_retries: env_parse_or("MAX_RETRIES", generation::DEFAULT_MAX_RETRIES)?,
            batch_size: env_parse_or("QUERY_BATCH_SIZE", execution::DEFAULT_BATCH_SIZE)?,
            max_result_rows: env_parse_or("MAX_RESULT_ROWS", execution::DEFAULT_MAX_RESULT_ROWS)?,
            stream_batch_size: env_parse_or(
                "STREAM_BATCH_SIZE",
                execution::DEFAULT_STREAM_BATCH_SIZE,
            )?,
            intent_threshold: env_parse_or(
                "INTENT_MATCH_THRESHOLD",
                generation::DEFAULT_INTENT_THRESHOLD,
            )?,
            format_strategy: env_var_or("FORMAT_STRATEGY", "llm").parse()?,
            timeouts: StageTimeouts::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range value.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_retries == 0 {
            return Err(AppError::invalid_input("MAX_RETRIES must be at least 1"));
        }
        if self.batch_size == 0 || self.stream_batch_size == 0 {
            return Err(AppError::invalid_input("Batch sizes must be at least 1"));
        }
        if self.max_result_rows == 0 {
            return Err(AppError::invalid_input("MAX_RESULT_ROWS must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.intent_threshold) {
            return Err(AppError::invalid_input(
                "INTENT_MATCH_THRESHOLD must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.batch_size, 50_000);
        assert_eq!(config.max_result_rows, 10_000);
        assert!((config.intent_threshold - 0.3).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let config = PipelineConfig {
            intent_threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_strategy_parsing() {
        assert_eq!(
            "Keywords".parse::<FormatStrategy>().unwrap(),
            FormatStrategy::Keywords
        );
        assert!("magic".parse::<FormatStrategy>().is_err());
    }
}
