// ABOUTME: Read-only query execution with re-validation, paging, and a hard row cap
// ABOUTME: Backend trait separates paging policy from the PostgreSQL driver
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Query Executor
//!
//! SQL whose outer query already carries a `LIMIT` runs once as written.
//! Anything else is paged with `LIMIT <batch> OFFSET <n>` on a single held
//! connection until a short page arrives or the row cap is reached. Either
//! way the result never exceeds the row cap. Every statement is validated
//! again before it touches the database.

mod postgres;

pub use postgres::PgBackend;

use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::Stream;
use regex::{Match, Regex, RegexBuilder};
use text2sql_core::models::{ExecutionResult, Row};
use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::errors::{AppError, AppResult};
use crate::sql_generation::strip_trailing_semicolon;
use crate::validator::SqlValidator;

/// Batches of rows from a streaming query
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = AppResult<Vec<Row>>> + Send + 'a>>;

static LIMIT_CLAUSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(r"\bLIMIT\s+\d+")
        .case_insensitive(true)
        .build()
        .ok()
});

static OFFSET_CLAUSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(r"^\s+OFFSET\s+\d+")
        .case_insensitive(true)
        .build()
        .ok()
});

/// A connection held for the duration of one paging loop
#[async_trait]
pub trait QuerySession: Send {
    /// Run a statement and return every row, cells already coerced to JSON
    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>>;
}

/// Database driver behind the executor
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Check out one connection
    async fn session(&self) -> AppResult<Box<dyn QuerySession>>;

    /// Stream a statement's rows in batches of `batch_size`
    fn stream<'a>(&'a self, sql: &'a str, batch_size: usize) -> RowStream<'a>;

    /// Verify the database is reachable
    async fn health_check(&self) -> AppResult<bool>;
}

/// Whether the outer statement carries its own `LIMIT n`
///
/// Only the last `LIMIT` at parenthesis depth 0 outside string literals
/// counts; a limit inside a subquery leaves the outer query unbounded.
#[must_use]
pub fn has_limit(sql: &str) -> bool {
    last_top_level_limit(sql).is_some()
}

fn last_top_level_limit(sql: &str) -> Option<Match<'_>> {
    LIMIT_CLAUSE
        .as_ref()?
        .find_iter(sql)
        .filter(|m| is_top_level(sql, m.start()))
        .last()
}

fn is_top_level(sql: &str, at: usize) -> bool {
    let mut depth = 0_i32;
    let mut in_literal = false;
    for c in sql[..at].chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => depth -= 1,
            _ => {}
        }
    }
    depth == 0 && !in_literal
}

/// Drop `--` comments trailing the statement so appended clauses stay live
#[must_use]
pub fn strip_trailing_comment(sql: &str) -> &str {
    let mut sql = sql.trim_end();
    loop {
        let line_start = sql.rfind('\n').map_or(0, |idx| idx + 1);
        let Some(cut) = line_comment_start(&sql[line_start..]) else {
            return sql;
        };
        sql = sql[..line_start + cut].trim_end();
    }
}

fn line_comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_literal = false;
    for (idx, &byte) in bytes.iter().enumerate() {
        match byte {
            b'\'' => in_literal = !in_literal,
            b'-' if !in_literal && bytes.get(idx + 1) == Some(&b'-') => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Replace the outer `LIMIT n [OFFSET m]` pair (if any) with a new page window
#[must_use]
pub fn add_limit_offset(sql: &str, limit: usize, offset: usize) -> String {
    let sql = strip_trailing_comment(sql);
    let mut base = sql.to_owned();

    if let Some(last) = last_top_level_limit(sql) {
        let rest = &sql[last.end()..];
        let offset_len = OFFSET_CLAUSE
            .as_ref()
            .and_then(|re| re.find(rest))
            .map_or(0, |m| m.end());
        base = format!("{}{}", &sql[..last.start()], &rest[offset_len..]);
    }

    let base = base.trim_end().trim_end_matches(';').trim_end();
    format!("{base} LIMIT {limit} OFFSET {offset}")
}

/// Whether a statement starts with `SELECT` or `WITH`
#[must_use]
pub fn is_read_statement(sql: &str) -> bool {
    let head: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    head.eq_ignore_ascii_case("select") || head.eq_ignore_ascii_case("with")
}

/// Validating, paging executor
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
    validator: SqlValidator,
    batch_size: usize,
    max_result_rows: usize,
    stream_batch_size: usize,
}

impl QueryExecutor {
    /// Create an executor with the configured paging limits
    #[must_use]
    pub fn new(backend: Arc<dyn QueryBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            validator: SqlValidator::new(config.intent_threshold),
            batch_size: config.batch_size,
            max_result_rows: config.max_result_rows,
            stream_batch_size: config.stream_batch_size,
        }
    }

    /// Underlying backend
    #[must_use]
    pub fn backend(&self) -> &dyn QueryBackend {
        self.backend.as_ref()
    }

    /// Validate and run a statement
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the statement fails validation, or a
    /// database error from the backend.
    #[instrument(skip(self, user_intent), fields(backend = self.backend.name()))]
    pub async fn execute(&self, sql: &str, user_intent: &str) -> AppResult<ExecutionResult> {
        let sql = strip_trailing_semicolon(strip_trailing_comment(sql));
        let validation = self.validator.validate(sql, user_intent);
        if !validation.is_safe {
            return Err(AppError::security_violation(validation.validation_notes));
        }

        let started = Instant::now();
        let mut session = self.backend.session().await?;

        let mut rows = if has_limit(sql) {
            session.fetch_all(sql).await?
        } else {
            self.fetch_paged(session.as_mut(), sql).await?
        };
        rows.truncate(self.max_result_rows);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(row_count = rows.len(), elapsed_ms, "Query executed");
        Ok(ExecutionResult::new(rows, elapsed_ms))
    }

    async fn fetch_paged(&self, session: &mut dyn QuerySession, sql: &str) -> AppResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let page_sql = add_limit_offset(sql, self.batch_size, offset);
            let page = session.fetch_all(&page_sql).await?;
            let page_len = page.len();
            debug!(offset, page_len, "Fetched page");

            rows.extend(page);
            offset += self.batch_size;

            if page_len < self.batch_size || rows.len() >= self.max_result_rows {
                break;
            }
        }

        Ok(rows)
    }

    /// Stream a read statement's rows in batches, without paging or a cap
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` for statements that do not start with
    /// `SELECT` or `WITH`, or that fail validation.
    pub fn stream<'a>(&'a self, sql: &'a str) -> AppResult<RowStream<'a>> {
        let sql = strip_trailing_semicolon(strip_trailing_comment(sql));
        if !is_read_statement(sql) {
            return Err(AppError::security_violation(
                "Only SELECT or WITH statements can be streamed",
            ));
        }
        let validation = self.validator.validate(sql, "");
        if !validation.is_safe {
            return Err(AppError::security_violation(validation.validation_notes));
        }
        Ok(self.backend.stream(sql, self.stream_batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_limit_offset_appends_window() {
        assert_eq!(
            add_limit_offset("SELECT * FROM transactions;", 50_000, 0),
            "SELECT * FROM transactions LIMIT 50000 OFFSET 0"
        );
    }

    #[test]
    fn test_add_limit_offset_replaces_last_pair() {
        let sql = "SELECT * FROM (SELECT id FROM transactions LIMIT 5) t LIMIT 10 OFFSET 20";
        assert_eq!(
            add_limit_offset(sql, 100, 200),
            "SELECT * FROM (SELECT id FROM transactions LIMIT 5) t LIMIT 100 OFFSET 200"
        );
        assert_eq!(
            add_limit_offset("select id from transactions limit 3;", 1, 2),
            "select id from transactions LIMIT 1 OFFSET 2"
        );
    }

    #[test]
    fn test_has_limit() {
        assert!(has_limit("SELECT * FROM transactions limit 10"));
        assert!(!has_limit("SELECT unlimited FROM transactions"));
    }

    #[test]
    fn test_has_limit_ignores_subqueries_and_literals() {
        assert!(!has_limit(
            "SELECT t.id FROM transactions t WHERE EXISTS (SELECT 1 FROM transactions s WHERE s.id = t.id LIMIT 1)"
        ));
        assert!(!has_limit("SELECT id FROM transactions WHERE merchant_name = 'LIMIT 5'"));
        assert!(has_limit("SELECT * FROM (SELECT id FROM transactions LIMIT 5) t LIMIT 3"));
    }

    #[test]
    fn test_add_limit_offset_keeps_subquery_limit() {
        assert_eq!(
            add_limit_offset("SELECT * FROM (SELECT id FROM transactions LIMIT 5) t", 100, 0),
            "SELECT * FROM (SELECT id FROM transactions LIMIT 5) t LIMIT 100 OFFSET 0"
        );
    }

    #[test]
    fn test_add_limit_offset_drops_trailing_comment() {
        assert_eq!(
            add_limit_offset("SELECT id FROM transactions -- every row", 100, 200),
            "SELECT id FROM transactions LIMIT 100 OFFSET 200"
        );
        assert_eq!(
            strip_trailing_comment("SELECT '--' AS dash\n-- note\n"),
            "SELECT '--' AS dash"
        );
    }

    #[test]
    fn test_read_statement_guard() {
        assert!(is_read_statement("  with x as (select 1) select * from x"));
        assert!(is_read_statement("SELECT 1"));
        assert!(!is_read_statement("EXPLAIN SELECT 1"));
        assert!(!is_read_statement("selection"));
    }
}
