//! Pulls the JSON payload out of free-text model output and validates it
//! into typed questions.

use std::collections::HashSet;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    Difficulty, MultipleChoiceQuestion, OpenEndedQuestion, QuestionError, QuestionId,
};

/// Top-level field that must hold the question array.
pub const QUESTIONS_FIELD: &str = "questions";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractError {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("response JSON could not be parsed: {0}")]
    Parse(String),

    #[error("response JSON has no `questions` array")]
    MissingQuestions,

    #[error("response contained an empty question list")]
    EmptyBatch,

    #[error("question {index} is malformed: {reason}")]
    MalformedItem { index: usize, reason: String },

    #[error("question {index} is invalid: {source}")]
    InvalidItem {
        index: usize,
        #[source]
        source: QuestionError,
    },

    #[error("none of the {total} questions passed validation")]
    NoValidQuestions { total: usize },
}

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// How the JSON object is located inside the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStrategy {
    /// First `{` through last `}` in the whole text. Nesting is not tracked,
    /// so stray braces in surrounding prose corrupt the slice.
    Greedy,
    /// Depth-aware scan that ignores braces inside JSON strings. Each balanced
    /// top-level object is tried in order.
    #[default]
    Balanced,
}

/// What to do when some, but not all, items fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Any invalid item rejects the whole batch.
    #[default]
    RejectAll,
    /// Drop invalid items and keep the rest.
    KeepValid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractOptions {
    pub strategy: ScanStrategy,
    pub policy: BatchPolicy,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown extraction setting: {0:?}")]
pub struct UnknownSetting(pub String);

impl FromStr for ScanStrategy {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "balanced" => Ok(Self::Balanced),
            _ => Err(UnknownSetting(s.to_string())),
        }
    }
}

impl FromStr for BatchPolicy {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject-all" | "reject_all" => Ok(Self::RejectAll),
            "keep-valid" | "keep_valid" => Ok(Self::KeepValid),
            _ => Err(UnknownSetting(s.to_string())),
        }
    }
}

//
// ─── SCANNING ──────────────────────────────────────────────────────────────────
//

/// Candidate JSON object slices in the order they should be tried.
#[must_use]
pub fn json_candidates(text: &str, strategy: ScanStrategy) -> Vec<&str> {
    match strategy {
        ScanStrategy::Greedy => match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => vec![&text[start..=end]],
            _ => Vec::new(),
        },
        ScanStrategy::Balanced => balanced_objects(text),
    }
}

fn balanced_objects(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut resume_at = 0;
    for (start, _) in text.match_indices('{') {
        if start < resume_at {
            continue;
        }
        if let Some(end) = matching_brace(text, start) {
            out.push(&text[start..=end]);
            resume_at = end + 1;
        }
    }
    out
}

// Byte index of the `}` closing the `{` at `start`, honouring JSON strings.
fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate the first candidate object that parses and carries a `questions`
/// array, returning that array.
///
/// # Errors
///
/// `NoJson` when no candidate exists, `Parse` when none parse, and
/// `MissingQuestions` when parsed objects lack the array.
pub fn locate_questions(text: &str, strategy: ScanStrategy) -> Result<Vec<Value>, ExtractError> {
    let candidates = json_candidates(text, strategy);
    if candidates.is_empty() {
        return Err(ExtractError::NoJson);
    }

    let mut last_error = ExtractError::MissingQuestions;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(mut map)) => match map.remove(QUESTIONS_FIELD) {
                Some(Value::Array(items)) => return Ok(items),
                _ => last_error = ExtractError::MissingQuestions,
            },
            Ok(_) => last_error = ExtractError::MissingQuestions,
            Err(e) => {
                debug!(error = %e, len = candidate.len(), "candidate JSON failed to parse");
                last_error = ExtractError::Parse(e.to_string());
            }
        }
    }
    Err(last_error)
}

//
// ─── VALIDATION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct RawMultipleChoice {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "text")]
    question: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer", alias = "correctIndex", alias = "correct_index")]
    correct_answer: i64,
    #[serde(default)]
    explanation: String,
    difficulty: String,
    #[serde(default)]
    points: i64,
}

fn apply_policy<T>(
    results: Vec<Result<T, ExtractError>>,
    policy: BatchPolicy,
) -> Result<Vec<T>, ExtractError> {
    let total = results.len();
    if total == 0 {
        return Err(ExtractError::EmptyBatch);
    }
    match policy {
        BatchPolicy::RejectAll => results.into_iter().collect(),
        BatchPolicy::KeepValid => {
            let mut kept = Vec::with_capacity(total);
            for result in results {
                match result {
                    Ok(item) => kept.push(item),
                    Err(e) => warn!(error = %e, "dropping invalid question"),
                }
            }
            if kept.is_empty() {
                return Err(ExtractError::NoValidQuestions { total });
            }
            Ok(kept)
        }
    }
}

// Model-supplied ids are kept unless blank or repeated.
fn assign_id(raw: Option<String>, index: usize, seen: &mut HashSet<String>) -> QuestionId {
    match raw.map(|s| s.trim().to_string()) {
        Some(id) if !id.is_empty() && seen.insert(id.clone()) => QuestionId::new(id),
        _ => {
            let id = QuestionId::positional(index);
            seen.insert(id.as_str().to_string());
            id
        }
    }
}

/// Extract and validate multiple-choice questions from raw model text.
///
/// # Errors
///
/// Returns `ExtractError` when no usable JSON is found or, under
/// `BatchPolicy::RejectAll`, when any item fails validation.
pub fn extract_multiple_choice(
    text: &str,
    options: ExtractOptions,
) -> Result<Vec<MultipleChoiceQuestion>, ExtractError> {
    let items = locate_questions(text, options.strategy)?;
    let mut seen = HashSet::new();

    let results = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let raw: RawMultipleChoice =
                serde_json::from_value(item).map_err(|e| ExtractError::MalformedItem {
                    index,
                    reason: e.to_string(),
                })?;
            let difficulty: Difficulty = raw
                .difficulty
                .trim()
                .parse()
                .map_err(|source| ExtractError::InvalidItem { index, source })?;
            let id = assign_id(raw.id, index, &mut seen);
            MultipleChoiceQuestion::new(
                id,
                raw.question,
                raw.options,
                raw.correct_answer,
                raw.explanation,
                difficulty,
                raw.points,
            )
            .map_err(|source| ExtractError::InvalidItem { index, source })
        })
        .collect();

    apply_policy(results, options.policy)
}

/// Extract open-ended question prompts (`{"questions": ["...", ...]}`).
///
/// # Errors
///
/// Returns `ExtractError` when no usable JSON is found or items are not
/// non-empty strings (subject to the batch policy).
pub fn extract_open_ended(
    text: &str,
    options: ExtractOptions,
) -> Result<Vec<OpenEndedQuestion>, ExtractError> {
    let items = locate_questions(text, options.strategy)?;

    let results = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::String(prompt) = item else {
                return Err(ExtractError::MalformedItem {
                    index,
                    reason: "expected a string".into(),
                });
            };
            OpenEndedQuestion::new(QuestionId::positional(index), prompt)
                .map_err(|source| ExtractError::InvalidItem { index, source })
        })
        .collect();

    apply_policy(results, options.policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc_item(id: &str, correct: i64, difficulty: &str) -> String {
        format!(
            r#"{{"id":"{id}","question":"Question {id}?","options":["a","b","c","d"],"correctAnswer":{correct},"explanation":"because","difficulty":"{difficulty}","points":10}}"#
        )
    }

    fn payload(items: &[String]) -> String {
        format!(r#"{{"questions":[{}]}}"#, items.join(","))
    }

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let text = format!(
            "Sure! Here are your questions:\n```json\n{}\n```\nGood luck!",
            payload(&[mc_item("q1", 1, "Beginner"), mc_item("q2", 3, "Advanced")])
        );
        let questions = extract_multiple_choice(&text, ExtractOptions::default()).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id().as_str(), "q1");
        assert_eq!(questions[0].text(), "Question q1?");
        assert_eq!(questions[0].correct_index(), 1);
        assert_eq!(questions[1].difficulty(), Difficulty::Advanced);
        assert_eq!(questions[1].explanation(), "because");
    }

    #[test]
    fn no_braces_is_no_json() {
        for strategy in [ScanStrategy::Greedy, ScanStrategy::Balanced] {
            let err = extract_multiple_choice(
                "I cannot help with that.",
                ExtractOptions {
                    strategy,
                    policy: BatchPolicy::RejectAll,
                },
            )
            .unwrap_err();
            assert_eq!(err, ExtractError::NoJson);
        }
    }

    #[test]
    fn greedy_scan_breaks_on_trailing_brace_but_balanced_does_not() {
        let text = format!(
            "{}\nNote: sets are written like {{a, b}}.",
            payload(&[mc_item("q1", 0, "Beginner")])
        );
        let greedy = extract_multiple_choice(
            &text,
            ExtractOptions {
                strategy: ScanStrategy::Greedy,
                policy: BatchPolicy::RejectAll,
            },
        );
        assert!(matches!(greedy, Err(ExtractError::Parse(_))));

        let balanced = extract_multiple_choice(&text, ExtractOptions::default()).unwrap();
        assert_eq!(balanced.len(), 1);
    }

    #[test]
    fn greedy_scan_extracts_single_object_from_prose() {
        let text = format!(
            "Here you go:\n{}\nLet me know if you need more.",
            payload(&[mc_item("q1", 2, "Intermediate"), mc_item("q2", 0, "Beginner")])
        );
        let greedy = ExtractOptions {
            strategy: ScanStrategy::Greedy,
            policy: BatchPolicy::RejectAll,
        };
        let questions = extract_multiple_choice(&text, greedy).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct_index(), 2);
        assert_eq!(questions[1].id().as_str(), "q2");
    }

    #[test]
    fn greedy_scan_spans_two_objects_into_invalid_json() {
        let text = format!(
            "{}\nAnd a second batch:\n{}",
            payload(&[mc_item("q1", 0, "Beginner")]),
            payload(&[mc_item("q2", 1, "Beginner")])
        );
        let candidates = json_candidates(&text, ScanStrategy::Greedy);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].contains("And a second batch"));

        let greedy = ExtractOptions {
            strategy: ScanStrategy::Greedy,
            policy: BatchPolicy::RejectAll,
        };
        assert!(matches!(
            extract_multiple_choice(&text, greedy),
            Err(ExtractError::Parse(_))
        ));
        let balanced = extract_multiple_choice(&text, ExtractOptions::default()).unwrap();
        assert_eq!(balanced[0].id().as_str(), "q1");
    }

    #[test]
    fn balanced_scan_ignores_braces_inside_strings() {
        let text = r#"{"questions":[{"id":"q1","question":"What does {x} mean?","options":["a","b","c","d"],"correctAnswer":2,"explanation":"}","difficulty":"Intermediate","points":15}]}"#;
        let questions = extract_multiple_choice(text, ExtractOptions::default()).unwrap();
        assert_eq!(questions[0].text(), "What does {x} mean?");
    }

    #[test]
    fn balanced_scan_skips_leading_unrelated_object() {
        let text = format!(
            "Config used: {{\"temperature\": 0.7}}\n{}",
            payload(&[mc_item("q1", 0, "Beginner")])
        );
        let questions = extract_multiple_choice(&text, ExtractOptions::default()).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn missing_questions_field_is_hard_failure() {
        let err =
            extract_multiple_choice(r#"{"items": []}"#, ExtractOptions::default()).unwrap_err();
        assert_eq!(err, ExtractError::MissingQuestions);
    }

    #[test]
    fn one_bad_item_rejects_batch_by_default() {
        let text = payload(&[mc_item("q1", 0, "Beginner"), mc_item("q2", 7, "Beginner")]);
        let err = extract_multiple_choice(&text, ExtractOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::InvalidItem {
                index: 1,
                source: QuestionError::CorrectIndexOutOfRange(7)
            }
        ));
    }

    #[test]
    fn keep_valid_policy_filters() {
        let text = payload(&[
            mc_item("q1", 0, "Beginner"),
            mc_item("q2", 1, "Expert"),
            mc_item("q3", 2, "Advanced"),
        ]);
        let questions = extract_multiple_choice(
            &text,
            ExtractOptions {
                strategy: ScanStrategy::Balanced,
                policy: BatchPolicy::KeepValid,
            },
        )
        .unwrap();
        let ids: Vec<_> = questions.iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, ["q1", "q3"]);
    }

    #[test]
    fn duplicate_ids_are_replaced_positionally() {
        let text = payload(&[mc_item("q1", 0, "Beginner"), mc_item("q1", 1, "Beginner")]);
        let questions = extract_multiple_choice(&text, ExtractOptions::default()).unwrap();
        assert_eq!(questions[1].id().as_str(), "q2");
    }

    #[test]
    fn empty_batch_is_an_error() {
        let err = extract_multiple_choice(r#"{"questions": []}"#, ExtractOptions::default())
            .unwrap_err();
        assert_eq!(err, ExtractError::EmptyBatch);
    }

    #[test]
    fn extracts_open_ended_prompts() {
        let text = r#"Here you go: {"questions": ["Explain preload.", "Describe afterload."]}"#;
        let questions = extract_open_ended(text, ExtractOptions::default()).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].id().as_str(), "q2");
        assert_eq!(questions[1].text(), "Describe afterload.");
    }

    #[test]
    fn open_ended_rejects_non_strings() {
        let err = extract_open_ended(r#"{"questions": ["ok", 3]}"#, ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::MalformedItem { index: 1, .. }));
    }
}
