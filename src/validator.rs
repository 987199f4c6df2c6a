// ABOUTME: Static SQL safety denylist and heuristic intent matching
// ABOUTME: Pure validation applied after generation and again before execution
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SQL Validator
//!
//! Safety is a case-insensitive pattern denylist, not a parser: any match
//! marks the statement unsafe and is reported in `validation_notes`. Intent
//! matching is a keyword-overlap heuristic and never blocks a query.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use text2sql_core::constants::generation;
use text2sql_core::models::SqlValidation;

/// Denylisted patterns, checked in order
pub const DANGEROUS_PATTERNS: [&str; 5] = [
    r"\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE)\b",
    r";\s*(\w|\s)*$",
    r"\b(COPY|GRANT|REVOKE|EXEC)\b",
    r"(\bUNION\b.*\bSELECT\b)",
    r"\b(SLEEP|BENCHMARK|WAITFOR)\b",
];

/// Notes for a statement that matched nothing
pub const VALID_NOTE: &str = "Запрос валиден";

const DANGEROUS_NOTE_PREFIX: &str = "Обнаружен опасный паттерн: ";

/// Words ignored when extracting intent keywords
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "как", "что", "где", "когда", "какой", "какая", "какие", "какое", "какую", "какого",
];

/// Compiled denylist paired with its source text
static COMPILED_PATTERNS: LazyLock<Vec<(&'static str, Option<Regex>)>> = LazyLock::new(|| {
    DANGEROUS_PATTERNS
        .iter()
        .map(|pattern| {
            let compiled = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .ok();
            (*pattern, compiled)
        })
        .collect()
});

static WORD_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b\w+\b").ok());

/// Validator for generated SQL
#[derive(Debug, Clone, Copy)]
pub struct SqlValidator {
    intent_threshold: f64,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new(generation::DEFAULT_INTENT_THRESHOLD)
    }
}

impl SqlValidator {
    /// Create a validator with a keyword-overlap threshold in `[0, 1]`
    #[must_use]
    pub const fn new(intent_threshold: f64) -> Self {
        Self { intent_threshold }
    }

    /// Validate a statement against the denylist and the request text
    #[must_use]
    pub fn validate(&self, sql: &str, user_intent: &str) -> SqlValidation {
        let notes = dangerous_patterns_in(sql)
            .into_iter()
            .map(|pattern| format!("{DANGEROUS_NOTE_PREFIX}{pattern}"))
            .collect::<Vec<_>>();

        let is_safe = notes.is_empty();
        let validation_notes = if is_safe {
            VALID_NOTE.to_owned()
        } else {
            notes.join("; ")
        };

        SqlValidation {
            sql_query: sql.to_owned(),
            is_safe,
            matches_intent: self.matches_intent(sql, user_intent),
            validation_notes,
            alternative_query: None,
        }
    }

    /// Keyword-overlap check between the request and the SQL text
    #[must_use]
    pub fn matches_intent(&self, sql: &str, user_intent: &str) -> bool {
        let keywords = extract_keywords(user_intent);
        if keywords.len() < generation::MIN_INTENT_KEYWORDS {
            return true;
        }

        let sql_lower = sql.to_lowercase();
        let matched = keywords
            .iter()
            .filter(|keyword| sql_lower.contains(keyword.as_str()))
            .count();

        matched as f64 >= keywords.len() as f64 * self.intent_threshold
    }
}

/// Denylist patterns that match the statement, in denylist order
#[must_use]
pub fn dangerous_patterns_in(sql: &str) -> Vec<&'static str> {
    COMPILED_PATTERNS
        .iter()
        .filter_map(|(source, compiled)| {
            // An uncompilable pattern fails closed
            let hit = compiled.as_ref().is_none_or(|re| re.is_match(sql));
            hit.then_some(*source)
        })
        .collect()
}

/// Meaningful lowercase words of the request
fn extract_keywords(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let Some(word_re) = WORD_PATTERN.as_ref() else {
        return HashSet::new();
    };
    word_re
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_is_safe() {
        let validation = SqlValidator::default().validate(
            "SELECT COUNT(*) as total FROM transactions",
            "Сколько транзакций?",
        );
        assert!(validation.is_safe);
        assert_eq!(validation.validation_notes, VALID_NOTE);
    }

    #[test]
    fn test_stacked_drop_reports_each_pattern() {
        let validation = SqlValidator::default().validate(
            "SELECT * FROM transactions; DROP TABLE transactions;",
            "show transactions",
        );
        assert!(!validation.is_safe);
        assert!(validation
            .validation_notes
            .contains("Обнаружен опасный паттерн: \\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE)\\b"));
        assert!(validation.validation_notes.contains("; "));
    }

    #[test]
    fn test_each_denylisted_family() {
        for sql in [
            "delete from transactions",
            "SELECT 1; ",
            "COPY transactions TO '/tmp/x'",
            "SELECT id FROM transactions UNION ALL SELECT 1",
            "SELECT pg_sleep(1), SLEEP(5)",
        ] {
            assert!(!dangerous_patterns_in(sql).is_empty(), "{sql} should be unsafe");
        }
    }

    #[test]
    fn test_word_boundaries_avoid_false_positives() {
        assert!(dangerous_patterns_in("SELECT created_at, updated_by FROM transactions").is_empty());
    }

    #[test]
    fn test_intent_with_few_keywords_always_matches() {
        let validator = SqlValidator::default();
        assert!(validator.matches_intent("SELECT 1", "как дела"));
    }

    #[test]
    fn test_intent_threshold() {
        let validator = SqlValidator::new(0.5);
        let sql = "SELECT merchant_city, COUNT(*) FROM transactions GROUP BY merchant_city";
        assert!(validator.matches_intent(sql, "transactions by merchant_city"));
        assert!(!validator.matches_intent(sql, "average salary payments yesterday"));
    }
}
