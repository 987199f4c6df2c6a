// ABOUTME: Deterministic language detection for Russian, Kazakh, and English requests
// ABOUTME: Strategy trait with a keyword-table classifier as the default implementation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Language Detection
//!
//! Classification rules, applied in order:
//!
//! 1. any Kazakh-specific letter (`ә ғ қ ң ө ұ ү һ і`) means Kazakh;
//! 2. otherwise any Cyrillic character means Kazakh when a Kazakh keyword
//!    occurs as a substring, else Russian;
//! 3. otherwise English.

use text2sql_core::models::Language;

/// Letters that exist in Kazakh Cyrillic but not in Russian
pub const KAZAKH_LETTERS: [char; 9] = ['ә', 'ғ', 'қ', 'ң', 'ө', 'ұ', 'ү', 'һ', 'і'];

/// Kazakh words that are written without Kazakh-specific letters
pub const KAZAKH_KEYWORDS: &[&str] = &[
    "қанша",
    "неше",
    "қайда",
    "қашан",
    "кім",
    "не",
    "бар",
    "жоқ",
    "саны",
    "жылы",
    "айы",
    "транзакциялар",
    "мерчанттар",
];

/// Strategy for assigning a language to request text
pub trait LanguageClassifier: Send + Sync {
    /// Classify the text; must be pure and deterministic
    fn classify(&self, text: &str) -> Language;
}

/// Keyword-table classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordLanguageClassifier;

impl LanguageClassifier for KeywordLanguageClassifier {
    fn classify(&self, text: &str) -> Language {
        detect_language(text)
    }
}

/// Whether a character is in the Cyrillic block (U+0400..=U+04FF)
#[must_use]
pub const fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

/// Whether the text contains any Cyrillic character
#[must_use]
pub fn has_cyrillic(text: &str) -> bool {
    text.chars().any(is_cyrillic)
}

/// Detect the language of a request
#[must_use]
pub fn detect_language(text: &str) -> Language {
    let lower = text.to_lowercase();

    if lower.chars().any(|c| KAZAKH_LETTERS.contains(&c)) {
        return Language::Kk;
    }

    if has_cyrillic(&lower) {
        if KAZAKH_KEYWORDS.iter().any(|word| lower.contains(word)) {
            return Language::Kk;
        }
        // A Russian keyword match and the Cyrillic fallback give the same answer
        return Language::Ru;
    }

    Language::En
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kazakh_letter_wins_unconditionally() {
        assert_eq!(detect_language("Сколько транзакций в Алматы? і"), Language::Kk);
        assert_eq!(detect_language("ҚАНША"), Language::Kk);
        assert_eq!(detect_language("how many ә"), Language::Kk);
    }

    #[test]
    fn test_kazakh_keyword_without_special_letters() {
        assert_eq!(detect_language("Мерчанттар саны"), Language::Kk);
    }

    #[test]
    fn test_russian_and_english() {
        assert_eq!(detect_language("Сколько транзакций?"), Language::Ru);
        assert_eq!(detect_language("Покажи топ 5 мерчантов"), Language::Ru);
        assert_eq!(detect_language("How many transactions?"), Language::En);
        assert_eq!(detect_language(""), Language::En);
    }

    #[test]
    fn test_classifier_is_deterministic() {
        let classifier = KeywordLanguageClassifier;
        let text = "Средний чек по категориям";
        assert_eq!(classifier.classify(text), classifier.classify(text));
    }
}
