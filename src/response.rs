// ABOUTME: Response assembly: localized column names, natural-language answers, numeric rounding
// ABOUTME: Every LLM-backed step here fails open to the untouched data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Response Assembler
//!
//! Runs after execution. Column translation and the text summary are
//! cosmetic: a failed, malformed or slow LLM call leaves the rows as they
//! are and the answer falls back to the first row's values.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use text2sql_core::constants::response::{ROUND_DECIMALS, TEXT_SUMMARY_ROWS};
use text2sql_core::models::{ConversationTurn, Language, Row};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::language::{detect_language, has_cyrillic};
use crate::llm::prompts;
use crate::llm::{parse_json_reply, Engine};

/// Language a column name is written in; `None` for Latin identifiers
#[must_use]
pub fn column_language(name: &str) -> Option<Language> {
    has_cyrillic(name).then(|| detect_language(name))
}

/// Round every float cell to the display precision
pub fn round_numbers(rows: &mut [Row]) {
    let factor = 10_f64.powi(ROUND_DECIMALS);
    for value in rows.iter_mut().flat_map(Map::values_mut) {
        if let Value::Number(number) = value {
            if number.is_f64() {
                if let Some(f) = number.as_f64() {
                    *value = Value::from((f * factor).round() / factor);
                }
            }
        }
    }
}

/// Render a cell for plain-text output
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Answer used when the text summary cannot be produced
#[must_use]
pub fn fallback_text(rows: &[Row], language: Language) -> String {
    let joined = rows
        .first()
        .map(|row| {
            row.values()
                .filter_map(cell_text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    if joined.is_empty() {
        prompts::data_not_found(language).to_owned()
    } else {
        joined
    }
}

/// Rows shown to the model when it writes a text answer
#[must_use]
pub fn data_summary(rows: &[Row], language: Language) -> String {
    if rows.is_empty() {
        return prompts::no_data(language).to_owned();
    }
    let shown = &rows[..rows.len().min(TEXT_SUMMARY_ROWS)];
    let mut summary = serde_json::to_string_pretty(shown).unwrap_or_default();
    if rows.len() > TEXT_SUMMARY_ROWS {
        summary.push('\n');
        summary.push_str(&prompts::more_rows_note(language, rows.len() - TEXT_SUMMARY_ROWS));
    }
    summary
}

/// Post-execution shaping of results
#[derive(Debug, Clone, Copy)]
pub struct ResponseAssembler {
    budget: Duration,
}

impl ResponseAssembler {
    /// Create an assembler whose LLM calls share one time budget each
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Rename result columns into the request's language
    pub async fn translate_column_names(
        &self,
        engine: &Engine,
        rows: Vec<Row>,
        language: Language,
    ) -> Vec<Row> {
        if language == Language::En {
            return rows;
        }
        let Some(columns) = rows.first().map(|row| row.keys().cloned().collect::<Vec<_>>()) else {
            return rows;
        };

        let languages: Vec<Option<Language>> =
            columns.iter().map(|c| column_language(c)).collect();
        if languages.iter().all(|l| *l == Some(language)) {
            return rows;
        }
        let source = languages
            .iter()
            .flatten()
            .copied()
            .find(|l| *l != language);

        let mapping = match timeout(self.budget, self.column_mapping(engine, &columns, language, source)).await {
            Ok(Some(mapping)) => mapping,
            Ok(None) => return rows,
            Err(_) => {
                warn!(budget_secs = self.budget.as_secs(), "Column translation timed out");
                return rows;
            }
        };

        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(key, value)| match mapping.get(&key) {
                        Some(translated) => (translated.clone(), value),
                        None => (key, value),
                    })
                    .collect()
            })
            .collect()
    }

    async fn column_mapping(
        &self,
        engine: &Engine,
        columns: &[String],
        target: Language,
        source: Option<Language>,
    ) -> Option<HashMap<String, String>> {
        let columns_json = serde_json::to_string(columns).ok()?;
        let (system, prompt) = prompts::column_translation_prompts(target, source, &columns_json);
        let request = engine.json_request(&system, &[], &prompt);

        let reply = match engine.complete_text(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Column translation failed");
                return None;
            }
        };

        let Some(raw) = parse_json_reply::<Map<String, Value>>(&reply) else {
            warn!("Column translation reply was not a JSON object");
            return None;
        };
        let mapping: HashMap<String, String> = raw
            .into_iter()
            .filter_map(|(key, value)| {
                let translated = value.as_str()?.trim();
                (!translated.is_empty()).then(|| (key, translated.to_owned()))
            })
            .collect();
        debug!(mapped = mapping.len(), "Column names translated");
        Some(mapping)
    }

    /// Natural-language answer for a `text` response
    pub async fn format_text_response(
        &self,
        engine: &Engine,
        question: &str,
        language: Language,
        rows: &[Row],
        history: &[ConversationTurn],
    ) -> String {
        let (system, prompt) =
            prompts::text_summary_prompts(language, question, &data_summary(rows, language));
        let request = engine.request(system, history, &prompt);

        match timeout(self.budget, engine.complete_text(&request)).await {
            Ok(Ok(answer)) if !answer.is_empty() => answer,
            Ok(Ok(_)) => fallback_text(rows, language),
            Ok(Err(e)) => {
                warn!(error = %e, "Text summary failed, using raw values");
                fallback_text(rows, language)
            }
            Err(_) => {
                warn!(budget_secs = self.budget.as_secs(), "Text summary timed out");
                fallback_text(rows, language)
            }
        }
    }
}
