use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizRequestError {
    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("topic is too long ({len} > {max} chars)")]
    TopicTooLong { len: usize, max: usize },

    #[error("preparation context is too long ({len} > {max} chars)")]
    ContextTooLong { len: usize, max: usize },

    #[error("question count must be between {min} and {max}, got {got}")]
    InvalidQuestionCount { got: u32, min: u32, max: u32 },

    #[error("unknown question style: {0}")]
    UnknownStyle(String),

    #[error("unknown quiz mode: {0}")]
    UnknownMode(String),
}

pub const MIN_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;
pub const MAX_TOPIC_CHARS: usize = 100;
pub const MAX_CONTEXT_CHARS: usize = 100;

/// Topics offered on the selection screen. Any other non-empty topic is accepted too.
pub const SUGGESTED_TOPICS: [&str; 6] = [
    "Cardiology",
    "Neurology",
    "Dermatology",
    "Pediatrics",
    "Oncology",
    "Orthopedics",
];

/// Trim and bound-check a topic.
///
/// # Errors
///
/// Returns `QuizRequestError::EmptyTopic` or `TopicTooLong`.
pub fn validate_topic(topic: &str) -> Result<String, QuizRequestError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(QuizRequestError::EmptyTopic);
    }
    let len = topic.chars().count();
    if len > MAX_TOPIC_CHARS {
        return Err(QuizRequestError::TopicTooLong {
            len,
            max: MAX_TOPIC_CHARS,
        });
    }
    Ok(topic.to_string())
}

//
// ─── STYLE & MODE ──────────────────────────────────────────────────────────────
//

/// Framing the model should use for generated questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QuestionStyle {
    /// Underlying principles and mechanisms.
    #[default]
    Conceptual,
    /// Specific facts, definitions and classifications.
    FactualRecall,
    /// Short clinical vignettes with diagnostic or treatment questions.
    CaseBased,
}

impl QuestionStyle {
    pub const ALL: [QuestionStyle; 3] = [Self::Conceptual, Self::FactualRecall, Self::CaseBased];

    /// Human-readable label embedded in prompts.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            QuestionStyle::Conceptual => "Conceptual Understanding",
            QuestionStyle::FactualRecall => "Factual Recall",
            QuestionStyle::CaseBased => "Case-based Scenarios",
        }
    }

    /// One-line instruction describing what this style asks of the model.
    #[must_use]
    pub fn guidance(self) -> &'static str {
        match self {
            QuestionStyle::Conceptual => "Focus on underlying principles and mechanisms",
            QuestionStyle::FactualRecall => {
                "Focus on specific facts, definitions, and classifications"
            }
            QuestionStyle::CaseBased => {
                "Create short clinical vignettes with diagnostic/treatment questions"
            }
        }
    }
}

impl fmt::Display for QuestionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QuestionStyle {
    type Err = QuizRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conceptual" | "conceptual understanding" => Ok(Self::Conceptual),
            "factual" | "factual-recall" | "factual recall" => Ok(Self::FactualRecall),
            "case" | "case-based" | "case-based scenarios" => Ok(Self::CaseBased),
            _ => Err(QuizRequestError::UnknownStyle(s.to_string())),
        }
    }
}

/// Interaction mode of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QuizMode {
    #[default]
    MultipleChoice,
    OpenEnded,
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizMode::MultipleChoice => f.write_str("multiple-choice"),
            QuizMode::OpenEnded => f.write_str("open-ended"),
        }
    }
}

impl FromStr for QuizMode {
    type Err = QuizRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mc" | "multiple-choice" | "multiple_choice" => Ok(Self::MultipleChoice),
            "open" | "open-ended" | "open_ended" => Ok(Self::OpenEnded),
            _ => Err(QuizRequestError::UnknownMode(s.to_string())),
        }
    }
}

//
// ─── REQUEST ───────────────────────────────────────────────────────────────────
//

/// Unvalidated quiz request as collected from the pre-quiz settings step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequestDraft {
    pub topic: String,
    pub preparation_context: Option<String>,
    pub question_style: QuestionStyle,
    pub question_count: u32,
    pub mode: QuizMode,
    pub cache_bust: bool,
}

impl QuizRequestDraft {
    #[must_use]
    pub fn new(topic: impl Into<String>, mode: QuizMode, question_count: u32) -> Self {
        Self {
            topic: topic.into(),
            preparation_context: None,
            question_style: QuestionStyle::default(),
            question_count,
            mode,
            cache_bust: true,
        }
    }

    /// Validate the draft into an immutable `QuizRequest`.
    ///
    /// # Errors
    ///
    /// Returns `QuizRequestError` for an empty or oversized topic, an oversized
    /// preparation context, or a question count outside `[5, 20]`.
    pub fn validate(self) -> Result<QuizRequest, QuizRequestError> {
        let topic = validate_topic(&self.topic)?;

        let preparation_context = self
            .preparation_context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(context) = &preparation_context {
            let len = context.chars().count();
            if len > MAX_CONTEXT_CHARS {
                return Err(QuizRequestError::ContextTooLong {
                    len,
                    max: MAX_CONTEXT_CHARS,
                });
            }
        }

        if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&self.question_count) {
            return Err(QuizRequestError::InvalidQuestionCount {
                got: self.question_count,
                min: MIN_QUESTION_COUNT,
                max: MAX_QUESTION_COUNT,
            });
        }

        Ok(QuizRequest {
            topic,
            preparation_context,
            question_style: self.question_style,
            question_count: self.question_count,
            mode: self.mode,
            cache_bust: self.cache_bust,
        })
    }
}

/// Validated, immutable request handed to the question generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizRequest {
    topic: String,
    preparation_context: Option<String>,
    question_style: QuestionStyle,
    question_count: u32,
    mode: QuizMode,
    cache_bust: bool,
}

impl QuizRequest {
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn preparation_context(&self) -> Option<&str> {
        self.preparation_context.as_deref()
    }

    #[must_use]
    pub fn question_style(&self) -> QuestionStyle {
        self.question_style
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    /// Whether the prompt builder should append a uniqueness token to the topic.
    #[must_use]
    pub fn cache_bust(&self) -> bool {
        self.cache_bust
    }

    /// Label recorded alongside results ("General" when no context was given).
    #[must_use]
    pub fn difficulty_label(&self) -> &str {
        self.preparation_context().unwrap_or("General")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_and_drops_blank_context() {
        let mut draft = QuizRequestDraft::new("  Cardiology ", QuizMode::MultipleChoice, 5);
        draft.preparation_context = Some("   ".into());
        let req = draft.validate().unwrap();
        assert_eq!(req.topic(), "Cardiology");
        assert_eq!(req.preparation_context(), None);
        assert_eq!(req.difficulty_label(), "General");
    }

    #[test]
    fn validate_rejects_empty_topic() {
        let err = QuizRequestDraft::new("  ", QuizMode::OpenEnded, 5)
            .validate()
            .unwrap_err();
        assert_eq!(err, QuizRequestError::EmptyTopic);
    }

    #[test]
    fn validate_enforces_count_bounds() {
        for count in [4, 21] {
            let err = QuizRequestDraft::new("Neurology", QuizMode::OpenEnded, count)
                .validate()
                .unwrap_err();
            assert!(matches!(err, QuizRequestError::InvalidQuestionCount { .. }));
        }
        assert!(
            QuizRequestDraft::new("Neurology", QuizMode::OpenEnded, 20)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn validate_rejects_long_context() {
        let mut draft = QuizRequestDraft::new("Oncology", QuizMode::MultipleChoice, 10);
        draft.preparation_context = Some("x".repeat(101));
        assert!(matches!(
            draft.validate(),
            Err(QuizRequestError::ContextTooLong { len: 101, .. })
        ));
    }

    #[test]
    fn style_and_mode_parse_from_cli_words() {
        assert_eq!("case".parse::<QuestionStyle>().unwrap(), QuestionStyle::CaseBased);
        assert_eq!(
            "Factual Recall".parse::<QuestionStyle>().unwrap(),
            QuestionStyle::FactualRecall
        );
        assert_eq!("open".parse::<QuizMode>().unwrap(), QuizMode::OpenEnded);
        assert!("essay".parse::<QuizMode>().is_err());
    }
}
