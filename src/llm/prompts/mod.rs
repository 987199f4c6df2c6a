// ABOUTME: Prompt templates for every LLM-backed pipeline stage, loaded at compile time
// ABOUTME: Localized instructions and messages for Russian, Kazakh, and English requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Prompts
//!
//! Long templates live in markdown files next to this module and are embedded
//! with `include_str!`. Placeholders use `{name}` and are filled with plain
//! string replacement; the user's question is always substituted last so its
//! text is never re-scanned for placeholders.

use std::fmt::Write as _;

use text2sql_core::models::Language;

use crate::schema::schema;

/// SQL generation template
pub const SQL_GENERATION_TEMPLATE: &str = include_str!("sql_generation.md");

/// Safety and style rules embedded in the generation prompt
pub const SQL_RULES_TEMPLATE: &str = include_str!("sql_rules.md");

/// Clarity check system instruction
pub const CLARITY_TEMPLATE: &str = include_str!("clarity.md");

/// Format decision system instruction
pub const FORMAT_SYSTEM_PROMPT: &str = include_str!("format.md");

const EXAMPLES_RU: &str = include_str!("examples_ru.md");
const EXAMPLES_KK: &str = include_str!("examples_kk.md");
const EXAMPLES_EN: &str = include_str!("examples_en.md");

/// System instruction for SQL generation
pub const SQL_SYSTEM_INSTRUCTION: &str = "You are an expert PostgreSQL database architect. \
     Generate only valid SQL SELECT queries. Follow all rules strictly.";

// ============================================================================
// Localized strings
// ============================================================================

/// Message the model returns for questions unrelated to the data
#[must_use]
pub const fn off_topic_message(language: Language) -> &'static str {
    match language {
        Language::Ru => "Этот вопрос не о запросах к базе данных. Пожалуйста, задайте вопрос о данных транзакций.",
        Language::Kk => "Бұл сұрақ дерекқор сұраулары туралы емес. Транзакция деректері туралы сұраңыз.",
        Language::En => "This question is not about database queries. Please ask about transaction data.",
    }
}

const fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::Ru => "Отвечай на русском языке в объяснениях, но SQL запросы генерируй на английском.",
        Language::Kk => "Түсіндірмелерде қазақ тілінде жауап бер, бірақ SQL сұрауларын ағылшын тілінде құрастыр.",
        Language::En => "Respond in English, but generate SQL queries in English.",
    }
}

const fn examples(language: Language) -> &'static str {
    match language {
        Language::Ru => EXAMPLES_RU,
        Language::Kk => EXAMPLES_KK,
        Language::En => EXAMPLES_EN,
    }
}

/// Note appended when rows were left out of the text summary
#[must_use]
pub fn more_rows_note(language: Language, remaining: usize) -> String {
    match language {
        Language::Ru => format!("... и еще {remaining} строк(и)"),
        Language::Kk => format!("... және тағы {remaining} жол(дар)"),
        Language::En => format!("... and {remaining} more row(s)"),
    }
}

/// Placeholder for an empty result inside the summary prompt
#[must_use]
pub const fn no_data(language: Language) -> &'static str {
    match language {
        Language::Ru => "Нет данных",
        Language::Kk => "Деректер жоқ",
        Language::En => "No data",
    }
}

/// Fallback answer when the summary cannot be produced and there are no rows
#[must_use]
pub const fn data_not_found(language: Language) -> &'static str {
    match language {
        Language::Ru => "Данные не найдены",
        Language::Kk => "Деректер табылмады",
        Language::En => "Data not found",
    }
}

// ============================================================================
// SQL generation
// ============================================================================

/// A previous question with the SQL it produced, rendered as context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorQuery {
    /// User question, already truncated
    pub question: String,
    /// SQL recovered from the assistant turn, already truncated
    pub sql: Option<String>,
}

fn render_context(language: Language, prior: &[PriorQuery]) -> String {
    if prior.is_empty() {
        return String::new();
    }
    let (label, question_label) = match language {
        Language::Ru => (
            "КОНТЕКСТ ПРЕДЫДУЩИХ ЗАПРОСОВ (для понимания контекста беседы):",
            "Вопрос",
        ),
        Language::Kk => (
            "АЛДЫҢҒЫ СҰРАУЛАР КОНТЕКСТІ (әңгіме контекстін түсіну үшін):",
            "Сұрау",
        ),
        Language::En => (
            "PREVIOUS QUERIES CONTEXT (for understanding conversation context):",
            "Question",
        ),
    };

    let mut out = format!("\n{label}\n");
    for (idx, query) in prior.iter().enumerate() {
        let _ = write!(
            out,
            "{}. {question_label}: {}\n   SQL: {}\n\n",
            idx + 1,
            query.question,
            query.sql.as_deref().unwrap_or("N/A")
        );
    }
    out
}

/// Full generation prompt for one question
#[must_use]
pub fn sql_generation_prompt(question: &str, language: Language, prior: &[PriorQuery]) -> String {
    let off_topic = off_topic_message(language);
    let rules = SQL_RULES_TEMPLATE.replace("{off_topic}", off_topic);

    SQL_GENERATION_TEMPLATE
        .replace("{language_instruction}", language_instruction(language))
        .replace("{schema}", &schema().render_prompt())
        .replace("{rules}", &rules)
        .replace("{examples}", examples(language))
        .replace("{context}", &render_context(language, prior))
        .replace("{off_topic}", off_topic)
        .replace("{question}", question)
}

// ============================================================================
// Classification
// ============================================================================

/// System instruction for the clarity check
#[must_use]
pub fn clarity_system_prompt(language: Language) -> String {
    CLARITY_TEMPLATE.replace("{language}", language.display_name())
}

/// User message for the clarity check
#[must_use]
pub fn clarity_user_prompt(query: &str) -> String {
    format!("QUESTION: {query}")
}

/// User message for the format decision
#[must_use]
pub fn format_user_prompt(query: &str, language: Language) -> String {
    format!(
        "CURRENT MESSAGE ({}): {query}",
        language.display_name()
    )
}

// ============================================================================
// Response assembly
// ============================================================================

/// System and user prompts for translating column names
///
/// `source` is the language the column names are currently written in
/// (`None` for plain `snake_case` identifiers).
#[must_use]
pub fn column_translation_prompts(
    target: Language,
    source: Option<Language>,
    columns_json: &str,
) -> (String, String) {
    let (system, instruction, examples) = match target {
        Language::Kk => (
            "Сен баған атауларын қазақ тіліне аударасың.",
            "Келесі баған атауларын қазақ тіліне аудар. Верни JSON объект, где ключи - оригинальные названия, значения - переводы:",
            "- transaction_count -> Транзакциялар саны\n\
             - merchant_id -> Мерчант ID\n\
             - total_amount -> Жалпы сома\n\
             - transaction_year -> Транзакция жылы\n\
             - transaction_month -> Транзакция айы",
        ),
        _ => (
            "Ты переводишь названия столбцов на русский язык.",
            "Переведи названия столбцов на русский язык. Верни JSON объект, где ключи - оригинальные названия, значения - переводы:",
            "- transaction_count -> Количество транзакций\n\
             - merchant_id -> ID мерчанта\n\
             - total_amount -> Общая сумма\n\
             - transaction_year -> Год транзакции\n\
             - transaction_month -> Месяц транзакции",
        ),
    };

    let prompt = match source {
        Some(from) => format!(
            "{instruction}\n\n{columns_json}\n\nThe names are currently in {}; translate them into {}.",
            from.display_name(),
            target.display_name()
        ),
        None => format!("{instruction}\n\n{columns_json}\n\nПримеры:\n{examples}"),
    };

    (system.to_owned(), prompt)
}

/// System and user prompts for the natural-language answer
#[must_use]
pub fn text_summary_prompts(
    language: Language,
    question: &str,
    data_summary: &str,
) -> (&'static str, String) {
    match language {
        Language::Kk => (
            "Сен - деректер аналитигінің көмекшісі.",
            format!(
                "Пайдаланушы сұрақ қойды және SQL сұрауының нәтижелерін алды.\n\n\
                 ПАЙДАЛАНУШЫНЫҢ СҰРАҒЫ: {question}\n\n\
                 SQL СҰРАУЫНЫҢ НӘТИЖЕЛЕРІ:\n{data_summary}\n\n\
                 Осы деректер негізінде толық, түсінікті жауапты қазақ тілінде құрастыр. Тек жауап мәтінін қайтар."
            ),
        ),
        Language::En => (
            "You are a data analyst assistant.",
            format!(
                "The user asked a question and received SQL query results.\n\n\
                 USER'S QUESTION: {question}\n\n\
                 SQL QUERY RESULTS:\n{data_summary}\n\n\
                 Form a detailed, clear answer in English based on this data. Return ONLY the answer text."
            ),
        ),
        Language::Ru => (
            "Ты - помощник аналитика данных.",
            format!(
                "Пользователь задал вопрос и получил результаты SQL запроса.\n\n\
                 ВОПРОС ПОЛЬЗОВАТЕЛЯ: {question}\n\n\
                 РЕЗУЛЬТАТЫ SQL ЗАПРОСА:\n{data_summary}\n\n\
                 Сформируй развернутый, понятный ответ на русском языке на основе этих данных. Верни ТОЛЬКО текст ответа."
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_is_fully_substituted() {
        let prompt = sql_generation_prompt("Сколько транзакций в Алмате?", Language::Ru, &[]);
        for placeholder in ["{schema}", "{rules}", "{examples}", "{context}", "{off_topic}"] {
            assert!(!prompt.contains(placeholder), "{placeholder} left in prompt");
        }
        assert!(prompt.contains("USER QUESTION: Сколько транзакций в Алмате?"));
        assert!(prompt.contains(off_topic_message(Language::Ru)));
        assert!(prompt.contains("Table: transactions"));
    }

    #[test]
    fn test_question_is_substituted_last() {
        let prompt = sql_generation_prompt("what is {schema}?", Language::En, &[]);
        assert!(prompt.contains("USER QUESTION: what is {schema}?"));
    }

    #[test]
    fn test_context_uses_localized_labels() {
        let prior = vec![PriorQuery {
            question: "2024 жылы қанша транзакция?".to_owned(),
            sql: Some("SELECT COUNT(*) FROM transactions".to_owned()),
        }];
        let prompt = sql_generation_prompt("ал 2023?", Language::Kk, &prior);
        assert!(prompt.contains("АЛДЫҢҒЫ СҰРАУЛАР КОНТЕКСТІ"));
        assert!(prompt.contains("1. Сұрау: 2024 жылы қанша транзакция?"));
        assert!(prompt.contains("SQL: SELECT COUNT(*) FROM transactions"));
    }

    #[test]
    fn test_missing_sql_renders_na() {
        let prior = vec![PriorQuery {
            question: "hello".to_owned(),
            sql: None,
        }];
        assert!(render_context(Language::En, &prior).contains("SQL: N/A"));
    }

    #[test]
    fn test_clarity_prompt_names_language() {
        assert!(clarity_system_prompt(Language::Kk).contains("in Kazakh"));
    }
}
