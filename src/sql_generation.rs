// ABOUTME: SQL generation orchestrator: prompt assembly, response extraction, bounded retries
// ABOUTME: Turns a refined request into validated SQL with a per-attempt diagnostic trail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SQL Generation
//!
//! One generation attempt renders the prompt, calls the engine, runs the
//! response through an ordered chain of [`SqlExtractor`]s and validates the
//! result. The loop keeps two independent retry budgets: unsafe SQL consumes
//! an unsafe retry, an LLM error or an empty extraction consumes a generation
//! retry. Whichever budget runs out first ends the loop, so a budget of `n`
//! allows `n + 1` attempts of one kind.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use text2sql_core::constants::history::PROMPT_CONTEXT_QUERIES;
use text2sql_core::models::{
    AttemptOutcome, ConversationTurn, GenerationAttempt, Language, SqlValidation,
};
use tracing::{debug, info, instrument, warn};

use crate::llm::prompts::{self, PriorQuery};
use crate::llm::{parse_json_reply, Engine};
use crate::validator::SqlValidator;

/// Characters of a previous question rendered into the prompt
const CONTEXT_QUESTION_CHARS: usize = 100;

/// Characters of a previous SQL statement rendered into the prompt
const CONTEXT_SQL_CHARS: usize = 200;

static HISTORY_SQL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(r"SQL[:\s]+(SELECT.+?)(?:;|\.\.\.|$)")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
});

static STATEMENT_START: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(r"\b(SELECT|WITH)\b")
        .case_insensitive(true)
        .build()
        .ok()
});

static PARAGRAPH_BREAK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").ok());

// ============================================================================
// Prompt context
// ============================================================================

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Previous questions, newest last, each paired with the SQL that answered it
#[must_use]
pub fn prior_queries(history: &[ConversationTurn]) -> Vec<PriorQuery> {
    let mut prior: Vec<PriorQuery> = history
        .iter()
        .enumerate()
        .filter(|(_, turn)| turn.is_user())
        .map(|(idx, turn)| {
            let sql = history
                .get(idx + 1)
                .filter(|next| !next.is_user())
                .and_then(|answer| sql_from_history_entry(&answer.text))
                .map(|sql| truncate_chars(&sql, CONTEXT_SQL_CHARS));
            PriorQuery {
                question: truncate_chars(&turn.text, CONTEXT_QUESTION_CHARS),
                sql,
            }
        })
        .collect();

    let skip = prior.len().saturating_sub(PROMPT_CONTEXT_QUERIES);
    prior.drain(..skip);
    prior
}

/// SQL recorded in an assistant history entry
///
/// The statement ends at a `;`, at the `...` that closes a truncated
/// preview, or at the end of the text.
#[must_use]
pub fn sql_from_history_entry(text: &str) -> Option<String> {
    HISTORY_SQL
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

// ============================================================================
// Extraction chain
// ============================================================================

/// One way of pulling a SQL statement out of a model response
pub trait SqlExtractor: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Extract a statement from cleaned response text
    fn extract(&self, cleaned: &str) -> Option<String>;
}

/// Strict JSON with a `sql_query` field
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFieldExtractor;

impl SqlExtractor for JsonFieldExtractor {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extract(&self, cleaned: &str) -> Option<String> {
        let value: Value = parse_json_reply(cleaned)?;
        value
            .get("sql_query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|sql| !sql.is_empty())
            .map(str::to_owned)
    }
}

/// First `SELECT` or `WITH` statement, up to `;` or a paragraph break
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementExtractor;

impl SqlExtractor for StatementExtractor {
    fn name(&self) -> &'static str {
        "statement"
    }

    fn extract(&self, cleaned: &str) -> Option<String> {
        let start = STATEMENT_START.as_ref()?.find(cleaned)?.start();
        let tail = &cleaned[start..];

        let semicolon = tail.find(';').map(|idx| idx + 1);
        let paragraph = PARAGRAPH_BREAK
            .as_ref()
            .and_then(|re| re.find(tail))
            .map(|m| m.start());
        let end = match (semicolon, paragraph) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => tail.len(),
        };

        let statement = tail[..end].trim();
        (!statement.is_empty()).then(|| statement.to_owned())
    }
}

/// The cleaned response as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTextExtractor;

impl SqlExtractor for RawTextExtractor {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn extract(&self, cleaned: &str) -> Option<String> {
        let text = cleaned.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

/// Remove Markdown fences and a leading `json` tag
#[must_use]
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(open) = text.find("```") {
        let after = &text[open + 3..];
        let body = after.find("```").map_or(after, |close| &after[..close]);
        text = body
            .strip_prefix("sql")
            .or_else(|| body.strip_prefix("SQL"))
            .unwrap_or(body)
            .trim();
    }

    if text.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
        text = text.get(4..).unwrap_or_default().trim_start();
    }

    text.trim().to_owned()
}

/// Ordered extraction chain; the first strategy that yields a statement wins
pub struct ExtractionChain {
    strategies: Vec<Box<dyn SqlExtractor>>,
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(JsonFieldExtractor),
                Box::new(StatementExtractor),
                Box::new(RawTextExtractor),
            ],
        }
    }
}

impl ExtractionChain {
    /// Extract SQL from a raw model response
    ///
    /// A single trailing `;` is removed. Returns `None` when nothing usable
    /// remains.
    #[must_use]
    pub fn extract(&self, raw: &str) -> Option<String> {
        let cleaned = clean_response(raw);
        self.strategies.iter().find_map(|strategy| {
            let sql = strategy.extract(&cleaned)?;
            let sql = strip_trailing_semicolon(&sql);
            if sql.is_empty() {
                return None;
            }
            debug!(strategy = strategy.name(), "Extracted SQL from model response");
            Some(sql.to_owned())
        })
    }
}

/// Trim whitespace and one trailing `;`
#[must_use]
pub fn strip_trailing_semicolon(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

// ============================================================================
// Generation loop
// ============================================================================

/// Final validation plus the diagnostic trail of every attempt
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Validation of the last produced SQL, or a failure record
    pub validation: SqlValidation,
    /// One entry per LLM call
    pub attempts: Vec<GenerationAttempt>,
}

/// Bounded generate-and-validate loop
pub struct SqlGenerator {
    validator: SqlValidator,
    extraction: ExtractionChain,
    max_retries: u32,
}

impl SqlGenerator {
    /// Create a generator with a retry budget per failure kind
    #[must_use]
    pub fn new(validator: SqlValidator, max_retries: u32) -> Self {
        Self {
            validator,
            extraction: ExtractionChain::default(),
            max_retries,
        }
    }

    /// Generate validated SQL for a refined request
    ///
    /// Never fails: an exhausted generation budget is reported as a failed
    /// [`SqlValidation`] with empty SQL.
    #[instrument(skip(self, engine, history), fields(language = %language))]
    pub async fn generate(
        &self,
        engine: &Engine,
        question: &str,
        language: Language,
        history: &[ConversationTurn],
    ) -> GenerationOutcome {
        let prompt = prompts::sql_generation_prompt(question, language, &prior_queries(history));
        let request = engine.request(prompts::SQL_SYSTEM_INSTRUCTION, &[], &prompt);

        let mut attempts = Vec::new();
        let mut unsafe_retries = 0_u32;
        let mut generation_failures = 0_u32;
        let mut last_unsafe: Option<SqlValidation> = None;

        loop {
            let attempt = attempts.len() as u32 + 1;

            let failure = match engine.complete_text(&request).await {
                Ok(text) => match self.extraction.extract(&text) {
                    Some(sql) => {
                        let validation = self.validator.validate(&sql, question);
                        if validation.is_safe {
                            info!(attempt, "SQL generated");
                            attempts.push(GenerationAttempt {
                                attempt,
                                outcome: AttemptOutcome::Accepted,
                                sql_query: sql,
                                notes: validation.validation_notes.clone(),
                            });
                            return GenerationOutcome {
                                validation,
                                attempts,
                            };
                        }

                        warn!(attempt, notes = %validation.validation_notes, "Generated SQL rejected");
                        attempts.push(GenerationAttempt {
                            attempt,
                            outcome: AttemptOutcome::Unsafe,
                            sql_query: sql,
                            notes: validation.validation_notes.clone(),
                        });
                        unsafe_retries += 1;
                        if unsafe_retries > self.max_retries {
                            return GenerationOutcome {
                                validation,
                                attempts,
                            };
                        }
                        last_unsafe = Some(validation);
                        continue;
                    }
                    None => (
                        "Could not extract SQL query from response".to_owned(),
                        true,
                    ),
                },
                Err(e) => (e.message.clone(), e.is_retryable()),
            };

            let (message, retryable) = failure;
            warn!(attempt, error = %message, "SQL generation attempt failed");
            attempts.push(GenerationAttempt {
                attempt,
                outcome: AttemptOutcome::GenerationError,
                sql_query: String::new(),
                notes: message.clone(),
            });
            generation_failures += 1;

            if !retryable || generation_failures > self.max_retries {
                let validation = last_unsafe
                    .take()
                    .unwrap_or_else(|| SqlValidation::failed(format!("Ошибка генерации: {message}")));
                return GenerationOutcome {
                    validation,
                    attempts,
                };
            }
        }
    }
}
