// ABOUTME: Intent classification: clarity check, output format decision, short-answer expansion
// ABOUTME: LLM-backed stages fail open; keyword heuristics need no model at all
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Intent Classification
//!
//! Nothing in this module returns an error. A malformed or failed clarity
//! check means "clear", a malformed format decision falls back to
//! [`FormatDecision::fallback`], and a clarification that only asks about
//! presentation is dropped.

use async_trait::async_trait;
use serde::Deserialize;
use text2sql_core::constants::history::FORMAT_CONTEXT_TURNS;
use text2sql_core::models::{ConversationTurn, FormatDecision, Language, OutputFormat};
use tracing::{debug, warn};

use crate::config::FormatStrategy;
use crate::llm::prompts;
use crate::llm::{parse_json_reply, Engine};

/// Clarifications containing these phrases only ask about presentation
const FORMAT_ONLY_MARKERS: &[&str] = &[
    "as a table",
    "as a graph",
    "as a chart",
    "as a diagram",
    "в виде таблицы",
    "в виде графика",
    "в виде диаграммы",
    "таблицей или графиком",
    "кесте түрінде",
    "график түрінде",
    "диаграмма түрінде",
];

/// Last `n` turns of a history
fn recent(history: &[ConversationTurn], n: usize) -> &[ConversationTurn] {
    &history[history.len().saturating_sub(n)..]
}

/// Whether a clarification only asks how to present the answer
#[must_use]
pub fn is_format_only_clarification(question: &str) -> bool {
    let lower = question.to_lowercase();
    FORMAT_ONLY_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Drop empty and presentation-only clarifications
fn effective_clarification(question: Option<String>) -> Option<String> {
    let question = question?.trim().to_owned();
    if question.is_empty() {
        return None;
    }
    if is_format_only_clarification(&question) {
        debug!(%question, "Suppressed format-only clarification");
        return None;
    }
    Some(question)
}

// ============================================================================
// Clarity
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClarityVerdict {
    is_clear: bool,
    #[serde(default)]
    clarification_question: Option<String>,
}

/// Ask the engine whether the request can be executed as stated
///
/// Returns the clarifying question, or `None` when the request is clear or
/// the verdict could not be obtained.
pub async fn assess_clarity(
    engine: &Engine,
    query: &str,
    language: Language,
    history: &[ConversationTurn],
) -> Option<String> {
    let request = engine.json_request(
        &prompts::clarity_system_prompt(language),
        recent(history, FORMAT_CONTEXT_TURNS),
        &prompts::clarity_user_prompt(query),
    );

    let reply = match engine.complete_text(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Clarity check failed, treating request as clear");
            return None;
        }
    };

    let Some(verdict) = parse_json_reply::<ClarityVerdict>(&reply) else {
        warn!("Clarity verdict was not valid JSON, treating request as clear");
        return None;
    };

    if verdict.is_clear {
        None
    } else {
        effective_clarification(verdict.clarification_question)
    }
}

// ============================================================================
// Format decision
// ============================================================================

/// Strategy for choosing the output format and refining the request
#[async_trait]
pub trait FormatDecider: Send + Sync {
    /// Decide the format; implementations never fail
    async fn decide(
        &self,
        engine: &Engine,
        query: &str,
        language: Language,
        history: &[ConversationTurn],
    ) -> FormatDecision;
}

/// Build the decider configured for the deployment
#[must_use]
pub fn format_decider(strategy: FormatStrategy) -> Box<dyn FormatDecider> {
    match strategy {
        FormatStrategy::Llm => Box::new(LlmFormatDecider),
        FormatStrategy::Keywords => Box::new(KeywordFormatDecider),
    }
}

#[derive(Debug, Deserialize)]
struct RawFormatDecision {
    output_format: String,
    #[serde(default, alias = "confidence_score")]
    confidence: Option<f64>,
    #[serde(default)]
    clarification_question: Option<String>,
    #[serde(default)]
    refined_query: Option<String>,
}

/// Interpret a format classifier reply, falling back on any parse problem
#[must_use]
pub fn parse_format_decision(reply: &str, query: &str) -> FormatDecision {
    let Some(raw) = parse_json_reply::<RawFormatDecision>(reply) else {
        return FormatDecision::fallback(query);
    };
    let Ok(output_format) = raw.output_format.parse::<OutputFormat>() else {
        return FormatDecision::fallback(query);
    };

    let refined_query = raw
        .refined_query
        .map(|q| q.trim().to_owned())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| query.to_owned());

    FormatDecision {
        output_format,
        confidence: raw.confidence.unwrap_or(0.7).clamp(0.0, 1.0),
        clarification_question: effective_clarification(raw.clarification_question),
        refined_query,
    }
}

/// LLM classifier with the last few turns as context
#[derive(Debug, Clone, Copy, Default)]
pub struct LlmFormatDecider;

#[async_trait]
impl FormatDecider for LlmFormatDecider {
    async fn decide(
        &self,
        engine: &Engine,
        query: &str,
        language: Language,
        history: &[ConversationTurn],
    ) -> FormatDecision {
        let request = engine.json_request(
            prompts::FORMAT_SYSTEM_PROMPT,
            recent(history, FORMAT_CONTEXT_TURNS),
            &prompts::format_user_prompt(query, language),
        );
        match engine.complete_text(&request).await {
            Ok(reply) => parse_format_decision(&reply, query),
            Err(e) => {
                warn!(error = %e, "Format decision failed, using default");
                FormatDecision::fallback(query)
            }
        }
    }
}

/// Keyword heuristics; never calls the engine
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordFormatDecider;

const GRAPH_KEYWORDS: &[&str] = &[
    "график",
    "диаграмма",
    "graph",
    "chart",
    "визуализация",
    "көрсет",
    "покажи график",
];
const TABLE_KEYWORDS: &[&str] = &["список", "таблица", "list", "table", "тізім", "кесте"];
const TEXT_KEYWORDS: &[&str] = &["сколько", "количество", "how many", "count", "қанша", "саны"];

impl KeywordFormatDecider {
    /// Format implied by the request's wording
    #[must_use]
    pub fn classify(query: &str) -> OutputFormat {
        let lower = query.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(GRAPH_KEYWORDS) {
            OutputFormat::Graph
        } else if has(TABLE_KEYWORDS) {
            OutputFormat::Table
        } else if has(TEXT_KEYWORDS) {
            OutputFormat::Text
        } else {
            OutputFormat::Table
        }
    }
}

#[async_trait]
impl FormatDecider for KeywordFormatDecider {
    async fn decide(
        &self,
        _engine: &Engine,
        query: &str,
        _language: Language,
        _history: &[ConversationTurn],
    ) -> FormatDecision {
        FormatDecision {
            output_format: Self::classify(query),
            confidence: 0.8,
            clarification_question: None,
            refined_query: query.to_owned(),
        }
    }
}

// ============================================================================
// Short-answer expansion
// ============================================================================

struct ShortAnswers {
    language: Language,
    tokens: &'static [&'static str],
    /// (topic stems, extra stems, expansion); extras empty means topic alone suffices
    expansions: &'static [(&'static [&'static str], &'static [&'static str], &'static str)],
}

const SHORT_ANSWERS: &[ShortAnswers] = &[
    ShortAnswers {
        language: Language::Ru,
        tokens: &["все", "всё", "да", "все время", "за все время"],
        expansions: &[
            (&["транзакц"], &["сколько", "количеств"], "количество всех транзакций"),
            (&["транзакц"], &["сумм", "объем", "объём"], "общая сумма всех транзакций"),
            (&["транзакц"], &[], "все транзакции"),
            (&["мерчант"], &[], "все мерчанты"),
        ],
    },
    ShortAnswers {
        language: Language::Kk,
        tokens: &["барлығы", "иә", "бәрі"],
        expansions: &[
            (&["транзакц"], &["қанша", "саны"], "барлық транзакциялар саны"),
            (&["транзакц"], &["сома", "көлем"], "барлық транзакциялардың жалпы сомасы"),
            (&["транзакц"], &[], "барлық транзакциялар"),
            (&["мерчант"], &[], "барлық мерчанттар"),
        ],
    },
    ShortAnswers {
        language: Language::En,
        tokens: &["all", "yes", "all time", "everything"],
        expansions: &[
            (&["transaction"], &["how many", "count", "number"], "count of all transactions"),
            (&["transaction"], &["sum", "total", "volume"], "total amount of all transactions"),
            (&["transaction"], &[], "all transactions"),
            (&["merchant"], &[], "all merchants"),
        ],
    },
];

const CLARIFY_MARKERS: &[&str] = &["?", "уточн", "нақтыл", "clarify", "specify"];

/// Rewrite a bare "all"/"yes" answer to a clarifying question
///
/// Returns `None` when the text is not a short answer, when the previous
/// assistant turn was not a question, or when no keyword rule matches the
/// previous exchange.
#[must_use]
pub fn expand_short_answer(text: &str, history: &[ConversationTurn]) -> Option<String> {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase();
    let table = SHORT_ANSWERS
        .iter()
        .find(|entry| entry.tokens.contains(&normalized.as_str()))?;

    let last_assistant = history.iter().rev().find(|turn| !turn.is_user())?;
    let assistant_lower = last_assistant.text.to_lowercase();
    if !CLARIFY_MARKERS.iter().any(|m| assistant_lower.contains(m)) {
        return None;
    }

    let last_user = history.iter().rev().find(|turn| turn.is_user());
    let context = format!(
        "{} {assistant_lower}",
        last_user.map(|t| t.text.to_lowercase()).unwrap_or_default()
    );

    let expansion = table.expansions.iter().find_map(|(topic, extra, expansion)| {
        let topic_hit = topic.iter().any(|stem| context.contains(stem));
        let extra_hit = extra.is_empty() || extra.iter().any(|stem| context.contains(stem));
        (topic_hit && extra_hit).then_some(*expansion)
    })?;

    debug!(language = %table.language, %expansion, "Expanded short answer");
    Some(expansion.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clarifying_exchange(user: &str, assistant: &str) -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user(user),
            ConversationTurn::assistant(assistant),
        ]
    }

    #[test]
    fn test_all_expands_to_all_transactions() {
        let history = clarifying_exchange("Покажи транзакции", "За какой период?");
        assert_eq!(
            expand_short_answer("все", &history).as_deref(),
            Some("все транзакции")
        );
    }

    #[test]
    fn test_count_question_expands_to_count() {
        let history = clarifying_exchange("Сколько транзакций?", "Уточните период");
        assert_eq!(
            expand_short_answer("За все время", &history).as_deref(),
            Some("количество всех транзакций")
        );
    }

    #[test]
    fn test_english_and_kazakh_tables() {
        let history = clarifying_exchange("How many transactions?", "Which period?");
        assert_eq!(
            expand_short_answer("all", &history).as_deref(),
            Some("count of all transactions")
        );
        let history = clarifying_exchange("Транзакциялар қанша?", "Кезеңді нақтылаңыз");
        assert_eq!(
            expand_short_answer("бәрі", &history).as_deref(),
            Some("барлық транзакциялар саны")
        );
    }

    #[test]
    fn test_no_expansion_without_clarifying_question() {
        let history = clarifying_exchange("Покажи транзакции", "SQL: SELECT * FROM transactions LIMIT 10;... Запрос валиден");
        assert_eq!(expand_short_answer("все", &history), None);
        assert_eq!(expand_short_answer("все", &[]), None);
    }

    #[test]
    fn test_longer_text_is_not_a_short_answer() {
        let history = clarifying_exchange("Покажи транзакции", "За какой период?");
        assert_eq!(expand_short_answer("все транзакции в Алматы", &history), None);
    }

    #[test]
    fn test_format_only_clarification_is_suppressed() {
        assert!(is_format_only_clarification("Показать в виде таблицы или графика?"));
        assert!(is_format_only_clarification("Would you like it as a chart?"));
        assert!(!is_format_only_clarification("За какой период?"));
    }

    #[test]
    fn test_parse_format_decision_falls_back() {
        let decision = parse_format_decision("not json", "Сколько транзакций?");
        assert_eq!(decision, FormatDecision::fallback("Сколько транзакций?"));

        let decision = parse_format_decision(r#"{"output_format": "pie"}"#, "q");
        assert_eq!(decision.output_format, OutputFormat::Table);
        assert!((decision.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_format_decision_drops_format_question() {
        let reply = r#"{"output_format":"graph","confidence":0.9,"clarification_question":"Показать в виде графика?","refined_query":"транзакции по месяцам"}"#;
        let decision = parse_format_decision(reply, "по месяцам");
        assert_eq!(decision.output_format, OutputFormat::Graph);
        assert_eq!(decision.clarification_question, None);
        assert_eq!(decision.refined_query, "транзакции по месяцам");
    }

    #[test]
    fn test_keyword_classifier() {
        assert_eq!(KeywordFormatDecider::classify("Покажи график по месяцам"), OutputFormat::Graph);
        assert_eq!(KeywordFormatDecider::classify("Список мерчантов"), OutputFormat::Table);
        assert_eq!(KeywordFormatDecider::classify("Сколько транзакций?"), OutputFormat::Text);
        assert_eq!(KeywordFormatDecider::classify("Средний чек"), OutputFormat::Table);
    }
}
