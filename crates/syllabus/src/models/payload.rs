//! Structured bodies of quiz and flashcard content
//!
//! Both types store a JSON array in `Content.body`. Authors often paste
//! JSON out of word processors, so parsing goes through a lenient
//! sanitization pass first.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{CatalogError, CatalogResult};

/// One flashcard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    #[serde(alias = "question", alias = "term")]
    pub front: String,
    #[serde(alias = "answer", alias = "definition")]
    pub back: String,
}

/// One quiz question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Index into `options` or the literal answer text
    #[serde(default, alias = "correctAnswer", skip_serializing_if = "Option::is_none")]
    pub answer: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([\]}])").unwrap());

/// Normalize typographic quotes, a leading BOM and trailing commas.
pub fn sanitize_json(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{201f}' | '\u{2033}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201b}' | '\u{2032}' => '\'',
            '\u{00a0}' => ' ',
            other => other,
        })
        .collect();
    TRAILING_COMMA.replace_all(&replaced, "$1").into_owned()
}

/// Parse a JSON list body, accepting either a bare array or an object that
/// wraps it under `key` (`{"cards": [...]}`).
fn parse_list<T: serde::de::DeserializeOwned>(raw: &str, key: &str) -> CatalogResult<Vec<T>> {
    let cleaned = sanitize_json(raw);
    let mut value: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(|e| CatalogError::InvalidContent {
            reason: format!("body is not valid JSON: {}", e),
        })?;

    if let Some(inner) = value.get_mut(key).map(serde_json::Value::take) {
        value = inner;
    }
    if !value.is_array() {
        return Err(CatalogError::InvalidContent {
            reason: format!("expected a JSON array of {}", key),
        });
    }

    serde_json::from_value(value).map_err(|e| CatalogError::InvalidContent {
        reason: format!("malformed {}: {}", key, e),
    })
}

pub fn parse_flashcards(raw: &str) -> CatalogResult<Vec<Flashcard>> {
    parse_list(raw, "cards")
}

pub fn parse_quiz(raw: &str) -> CatalogResult<Vec<QuizQuestion>> {
    let questions: Vec<QuizQuestion> = parse_list(raw, "questions")?;
    if let Some(pos) = questions.iter().position(|q| q.question.trim().is_empty()) {
        return Err(CatalogError::InvalidContent {
            reason: format!("question {} has no text", pos + 1),
        });
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_smart_quotes_and_trailing_commas() {
        let raw = "[{\u{201c}front\u{201d}: \u{201c}2+2\u{201d}, \u{201c}back\u{201d}: \u{201c}4\u{201d},},]";
        assert_eq!(sanitize_json(raw), r#"[{"front": "2+2", "back": "4"}]"#);
    }

    #[test]
    fn test_flashcard_aliases() {
        let cards = parse_flashcards(r#"[{"question": "Capital of France", "answer": "Paris"}]"#).unwrap();
        assert_eq!(cards[0].front, "Capital of France");
        assert_eq!(cards[0].back, "Paris");

        let wrapped = parse_flashcards(r#"{"cards": [{"front": "a", "back": "b"}]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn test_quiz_requires_array_and_text() {
        let quiz = parse_quiz(
            r#"[{"question": "2+2?", "options": ["3", "4"], "correctAnswer": 1}]"#,
        )
        .unwrap();
        assert_eq!(quiz[0].answer, Some(serde_json::json!(1)));

        let err = parse_quiz(r#"{"question": "loose"}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT");
        assert!(parse_quiz(r#"[{"question": "  "}]"#).is_err());
        assert!(parse_quiz("not json").is_err());
    }
}
