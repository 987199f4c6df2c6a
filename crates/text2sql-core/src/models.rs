// ABOUTME: Value models flowing through the text-to-SQL pipeline
// ABOUTME: Languages, output formats, conversation turns, validation and execution results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Request-scoped data carried between pipeline stages.
//!
//! Everything here is plain data: the conversation store owns history, and
//! every other value lives only for the duration of one request.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

/// A single result row keyed by column name
pub type Row = Map<String, Value>;

// ============================================================================
// Language
// ============================================================================

/// Language of a user request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Russian
    Ru,
    /// Kazakh
    Kk,
    /// English
    En,
}

impl Language {
    /// ISO 639-1 tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::Kk => "kk",
            Self::En => "en",
        }
    }

    /// Human-readable language name used inside prompts
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Ru => "Russian",
            Self::Kk => "Kazakh",
            Self::En => "English",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Output format
// ============================================================================

/// Presentation format chosen for a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Natural-language summary
    Text,
    /// Tabular rows
    #[default]
    Table,
    /// Line or bar chart
    Graph,
    /// Pie or other diagram
    Diagram,
}

impl OutputFormat {
    /// Wire name of the format
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::Graph => "graph",
            Self::Diagram => "diagram",
        }
    }

    /// Formats whose numeric cells are rounded for display
    #[must_use]
    pub const fn is_visual(self) -> bool {
        matches!(self, Self::Table | Self::Graph | Self::Diagram)
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "table" => Ok(Self::Table),
            "graph" => Ok(Self::Graph),
            "diagram" => Ok(Self::Diagram),
            other => Err(AppError::invalid_input(format!(
                "Unknown output format '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Engine selection
// ============================================================================

/// Which LLM engine serves a request (`model` field of the request body)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Locally hosted model
    Llm,
    /// Cloud API model
    #[default]
    Api,
}

impl EngineKind {
    /// Wire name of the engine
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Api => "api",
        }
    }
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The person asking questions
    User,
    /// The system's reply
    Assistant,
}

/// One immutable turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced the turn
    pub role: TurnRole,
    /// Turn text
    #[serde(alias = "content")]
    pub text: String,
}

impl ConversationTurn {
    /// A user turn
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    /// An assistant turn
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }

    /// Whether this turn was written by the user
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == TurnRole::User
    }
}

// ============================================================================
// Stage results
// ============================================================================

/// Result of the format decision stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDecision {
    /// Chosen presentation format
    pub output_format: OutputFormat,
    /// Confidence in `[0, 1]`
    #[serde(alias = "confidence_score")]
    pub confidence: f64,
    /// Question to ask back instead of answering
    #[serde(default)]
    pub clarification_question: Option<String>,
    /// Request rewritten with prior turns folded in
    pub refined_query: String,
}

impl FormatDecision {
    /// Fallback decision used whenever the classifier output cannot be parsed
    #[must_use]
    pub fn fallback(query: impl Into<String>) -> Self {
        Self {
            output_format: OutputFormat::Table,
            confidence: 0.7,
            clarification_question: None,
            refined_query: query.into(),
        }
    }
}

/// Outcome of validating a SQL string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlValidation {
    /// The validated SQL
    pub sql_query: String,
    /// No denylisted pattern matched
    pub is_safe: bool,
    /// Heuristic keyword overlap with the request
    pub matches_intent: bool,
    /// Human-readable validator notes
    pub validation_notes: String,
    /// Suggested replacement query, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_query: Option<String>,
}

impl SqlValidation {
    /// Validation result for a generation loop that never produced SQL
    #[must_use]
    pub fn failed(notes: impl Into<String>) -> Self {
        Self {
            sql_query: String::new(),
            is_safe: false,
            matches_intent: false,
            validation_notes: notes.into(),
            alternative_query: None,
        }
    }
}

/// Why a generation attempt did not end the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Safe SQL was produced
    Accepted,
    /// SQL was produced but failed the denylist
    Unsafe,
    /// The LLM call failed or returned nothing usable
    GenerationError,
}

/// One entry of the generation loop's diagnostic trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// 1-based attempt number across both budgets
    pub attempt: u32,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
    /// Extracted SQL, empty on generation errors
    pub sql_query: String,
    /// Validator notes or error text
    pub notes: String,
}

/// Rows returned by the executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Result rows
    #[serde(rename = "data")]
    pub rows: Vec<Row>,
    /// Number of rows in `rows`
    pub row_count: usize,
    /// Wall-clock execution time
    pub execution_time_ms: f64,
}

impl ExecutionResult {
    /// Build a result, deriving the row count
    #[must_use]
    pub fn new(rows: Vec<Row>, execution_time_ms: f64) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            execution_time_ms,
        }
    }
}

/// Metadata attached to every final response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// The response is a clarifying question
    pub requires_clarification: bool,
    /// SQL that produced the data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    /// Validator notes for that SQL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_notes: Option<String>,
    /// Language the request was answered in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Request after short-answer expansion and refinement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_query: Option<String>,
    /// Engine that served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineKind>,
}

/// Pipeline result handed to the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    /// Human-readable content
    pub content: String,
    /// Format of `data_preview`
    pub output_format: OutputFormat,
    /// Rows shaped for the chosen format
    pub data_preview: Option<Vec<Row>>,
    /// Wall-clock execution time of the SQL
    pub execution_time_ms: f64,
    /// Request metadata
    pub metadata: ResponseMetadata,
}

impl FinalResponse {
    /// A clarification response: no data, zero rows, zero time
    #[must_use]
    pub fn clarification(question: impl Into<String>, output_format: OutputFormat) -> Self {
        Self {
            content: question.into(),
            output_format,
            data_preview: None,
            execution_time_ms: 0.0,
            metadata: ResponseMetadata {
                requires_clarification: true,
                ..ResponseMetadata::default()
            },
        }
    }

    /// Number of rows in the preview
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data_preview.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("Graph".parse::<OutputFormat>().unwrap(), OutputFormat::Graph);
        assert!("pie".parse::<OutputFormat>().is_err());
        assert!(!OutputFormat::Text.is_visual());
        assert!(OutputFormat::Diagram.is_visual());
    }

    #[test]
    fn test_format_decision_accepts_confidence_score_alias() {
        let decision: FormatDecision = serde_json::from_str(
            r#"{"output_format":"text","confidence_score":0.9,"refined_query":"q"}"#,
        )
        .unwrap();
        assert_eq!(decision.output_format, OutputFormat::Text);
        assert!(decision.clarification_question.is_none());
    }

    #[test]
    fn test_clarification_response_is_empty() {
        let response = FinalResponse::clarification("За какой период?", OutputFormat::Table);
        assert!(response.metadata.requires_clarification);
        assert_eq!(response.row_count(), 0);
        assert!(response.data_preview.is_none());
    }

    #[test]
    fn test_engine_kind_defaults_to_api() {
        assert_eq!(EngineKind::default(), EngineKind::Api);
        let parsed: EngineKind = serde_json::from_str("\"llm\"").unwrap();
        assert_eq!(parsed, EngineKind::Llm);
    }
}
