// ABOUTME: Request pipeline wiring history, classification, generation, execution, and assembly
// ABOUTME: Serializes turns per user and enforces a time budget on every stage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Query Pipeline
//!
//! Stage order for one request:
//!
//! 1. load the user's history and detect the language;
//! 2. expand a bare short answer to a clarifying question;
//! 3. clarity check, then format decision (either may short-circuit with a
//!    clarification);
//! 4. SQL generation with bounded retries, recorded in history;
//! 5. execution with re-validation and paging;
//! 6. response assembly for the chosen format.
//!
//! Turns of the same user are serialized by a per-user lock held for the
//! whole request; different users proceed in parallel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use text2sql_core::constants::history::SQL_PREVIEW_CHARS;
use text2sql_core::models::{
    ConversationTurn, EngineKind, FinalResponse, FormatDecision, Language, OutputFormat,
    ResponseMetadata, SqlValidation,
};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::config::{PipelineConfig, StageTimeouts};
use crate::conversation::{ConversationStore, UserLocks};
use crate::errors::{AppError, AppResult};
use crate::executor::QueryExecutor;
use crate::intent::{assess_clarity, expand_short_answer, format_decider, FormatDecider};
use crate::language::{KeywordLanguageClassifier, LanguageClassifier};
use crate::llm::{Engine, EngineSet};
use crate::response::{round_numbers, ResponseAssembler};
use crate::sql_generation::{GenerationOutcome, SqlGenerator};
use crate::validator::SqlValidator;

/// One analytics request
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Natural-language question
    pub query: String,
    /// Opaque caller key for history
    pub user_id: String,
    /// Engine that serves the request
    pub engine: EngineKind,
}

/// Assistant history entry for generated SQL
#[must_use]
pub fn sql_history_entry(sql: &str, notes: &str) -> String {
    let preview: String = sql.chars().take(SQL_PREVIEW_CHARS).collect();
    format!("SQL: {preview}... {notes}")
}

/// Message returned and recorded when SQL is rejected
#[must_use]
pub fn security_message(notes: &str) -> String {
    format!("Query violates security policy: {notes}")
}

/// Run a fail-open stage, substituting `fallback` on timeout
async fn with_fallback<T>(
    budget: Duration,
    stage: &str,
    future: impl Future<Output = T>,
    fallback: impl FnOnce() -> T,
) -> T {
    if let Ok(value) = timeout(budget, future).await {
        value
    } else {
        warn!(stage, budget_secs = budget.as_secs(), "Stage timed out, continuing with fallback");
        fallback()
    }
}

/// Run a hard stage, failing with `STAGE_TIMEOUT` when over budget
async fn with_deadline<T>(
    budget: Duration,
    stage: &str,
    future: impl Future<Output = T>,
) -> AppResult<T> {
    timeout(budget, future)
        .await
        .map_err(|_| AppError::stage_timeout(stage, budget.as_secs()))
}

/// The end-to-end text-to-SQL pipeline
pub struct QueryPipeline {
    engines: EngineSet,
    store: Arc<dyn ConversationStore>,
    executor: QueryExecutor,
    generator: SqlGenerator,
    format_decider: Box<dyn FormatDecider>,
    classifier: Box<dyn LanguageClassifier>,
    assembler: ResponseAssembler,
    locks: UserLocks,
    timeouts: StageTimeouts,
}

impl QueryPipeline {
    /// Assemble a pipeline from its collaborators
    #[must_use]
    pub fn new(
        engines: EngineSet,
        store: Arc<dyn ConversationStore>,
        executor: QueryExecutor,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            engines,
            store,
            executor,
            generator: SqlGenerator::new(
                SqlValidator::new(config.intent_threshold),
                config.max_retries,
            ),
            format_decider: format_decider(config.format_strategy),
            classifier: Box::new(KeywordLanguageClassifier),
            assembler: ResponseAssembler::new(config.timeouts.assembly),
            locks: UserLocks::new(),
            timeouts: config.timeouts,
        }
    }

    /// Replace the language classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Box<dyn LanguageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Configured engines
    #[must_use]
    pub const fn engines(&self) -> &EngineSet {
        &self.engines
    }

    /// Conversation store
    #[must_use]
    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    /// Query executor
    #[must_use]
    pub const fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Users with a live turn slot
    #[must_use]
    pub fn active_users(&self) -> usize {
        self.locks.len()
    }

    /// Answer one request
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty query
    /// - `ConfigMissing` when the requested engine is not configured
    /// - `GenerationFailed` when no SQL could be produced
    /// - `PermissionDenied` when the SQL fails validation
    /// - `DatabaseError` when execution fails
    /// - `StageTimeout` when generation or execution exceed their budgets
    #[instrument(skip(self, request), fields(user_id = %request.user_id, engine = %request.engine))]
    pub async fn process(&self, request: &QueryRequest) -> AppResult<FinalResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::invalid_input(
                "Field 'natural_language_query' is required",
            ));
        }
        let engine = self.engines.get(request.engine)?;

        let turn = self.locks.acquire(&request.user_id).await;
        let answered = self.answer(engine, request, query).await;
        drop(turn);
        self.locks.prune();
        answered
    }

    /// Stages after the user's turn lock is held
    async fn answer(
        &self,
        engine: &Engine,
        request: &QueryRequest,
        query: &str,
    ) -> AppResult<FinalResponse> {
        let history = self.store.get(&request.user_id).await;
        let language = self.classifier.classify(query);

        let effective_query = expand_short_answer(query, &history).unwrap_or_else(|| query.to_owned());

        let metadata = ResponseMetadata {
            language: Some(language),
            engine: Some(request.engine),
            ..ResponseMetadata::default()
        };

        let decision = match self
            .classify(engine, &effective_query, language, &history)
            .await
        {
            Ok(decision) => decision,
            Err((question, output_format)) => {
                info!("Returning clarification");
                self.store
                    .append(&request.user_id, query, &question)
                    .await?;
                let mut response = FinalResponse::clarification(question, output_format);
                response.metadata.language = metadata.language;
                response.metadata.engine = metadata.engine;
                response.metadata.refined_query = Some(effective_query);
                return Ok(response);
            }
        };

        let outcome = with_deadline(
            self.timeouts.generation,
            "generation",
            self.generator
                .generate(engine, &decision.refined_query, language, &history),
        )
        .await?;
        let validation = self.record_generation(&request.user_id, query, outcome).await?;

        let result = with_deadline(
            self.timeouts.execution,
            "execution",
            self.executor.execute(&validation.sql_query, query),
        )
        .await??;

        let metadata = ResponseMetadata {
            sql_query: Some(validation.sql_query.clone()),
            validation_notes: Some(validation.validation_notes),
            refined_query: Some(decision.refined_query.clone()),
            ..metadata
        };

        let response = match decision.output_format {
            OutputFormat::Text => {
                let answer = self
                    .assembler
                    .format_text_response(engine, query, language, &result.rows, &history)
                    .await;
                let mut row = Map::new();
                row.insert("text".to_owned(), Value::String(answer.clone()));
                FinalResponse {
                    content: answer,
                    output_format: OutputFormat::Text,
                    data_preview: Some(vec![row]),
                    execution_time_ms: result.execution_time_ms,
                    metadata,
                }
            }
            output_format => {
                let mut rows = self
                    .assembler
                    .translate_column_names(engine, result.rows, language)
                    .await;
                round_numbers(&mut rows);
                FinalResponse {
                    content: validation.sql_query,
                    output_format,
                    data_preview: Some(rows),
                    execution_time_ms: result.execution_time_ms,
                    metadata,
                }
            }
        };

        info!(
            row_count = response.row_count(),
            format = %response.output_format,
            "Request answered"
        );
        Ok(response)
    }

    /// Clarity check and format decision; `Err` carries a clarification
    async fn classify(
        &self,
        engine: &Engine,
        query: &str,
        language: Language,
        history: &[ConversationTurn],
    ) -> Result<FormatDecision, (String, OutputFormat)> {
        let budget = self.timeouts.classifier;

        let clarification = with_fallback(
            budget,
            "clarity",
            assess_clarity(engine, query, language, history),
            || None,
        )
        .await;
        if let Some(question) = clarification {
            return Err((question, OutputFormat::default()));
        }

        let mut decision = with_fallback(
            budget,
            "format",
            self.format_decider.decide(engine, query, language, history),
            || FormatDecision::fallback(query),
        )
        .await;

        match decision.clarification_question.take() {
            Some(question) => Err((question, decision.output_format)),
            None => Ok(decision),
        }
    }

    /// Record the generation result in history and turn failures into errors
    async fn record_generation(
        &self,
        user_id: &str,
        query: &str,
        outcome: GenerationOutcome,
    ) -> AppResult<SqlValidation> {
        let validation = outcome.validation;

        if validation.sql_query.is_empty() {
            self.store
                .append(user_id, query, &validation.validation_notes)
                .await?;
            return Err(AppError::generation_failed(validation.validation_notes)
                .with_details(serde_json::to_value(&outcome.attempts)?));
        }

        if !validation.is_safe {
            let message = security_message(&validation.validation_notes);
            self.store.append(user_id, query, &message).await?;
            return Err(AppError::security_violation(message));
        }

        if !validation.matches_intent {
            warn!(sql = %validation.sql_query, "Generated SQL may not match the request");
        }

        self.store
            .append(
                user_id,
                query,
                &sql_history_entry(&validation.sql_query, &validation.validation_notes),
            )
            .await?;
        Ok(validation)
    }

    /// Forget a user's conversation; idempotent
    ///
    /// # Errors
    ///
    /// Returns a storage error from an external history store.
    pub async fn clear_history(&self, user_id: &str) -> AppResult<()> {
        let turn = self.locks.acquire(user_id).await;
        self.store.clear(user_id).await?;
        drop(turn);
        self.locks.prune();
        info!(user_id, "History cleared");
        Ok(())
    }
}
