use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::request::QuizMode;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("expected exactly 4 options, got {0}")]
    OptionCount(usize),

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct index {0} is out of range 0..=3")]
    CorrectIndexOutOfRange(i64),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty band of a multiple-choice question. Each band carries a fixed
/// point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn points(self) -> u32 {
        match self {
            Difficulty::Beginner => 10,
            Difficulty::Intermediate => 15,
            Difficulty::Advanced => 20,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Beginner" => Ok(Self::Beginner),
            "Intermediate" => Ok(Self::Intermediate),
            "Advanced" => Ok(Self::Advanced),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── MULTIPLE CHOICE ───────────────────────────────────────────────────────────
//

pub const OPTION_COUNT: usize = 4;

/// A validated multiple-choice question.
///
/// Exactly four options are guaranteed by the array type; `correct_index`
/// always addresses one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultipleChoiceQuestion {
    id: QuestionId,
    text: String,
    options: [String; OPTION_COUNT],
    correct_index: usize,
    explanation: String,
    difficulty: Difficulty,
    points: u32,
}

impl MultipleChoiceQuestion {
    /// Build a question from loosely-typed parts.
    ///
    /// Non-positive `points` fall back to the difficulty band value.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or any option is blank, the option
    /// count is not four, or `correct_index` is outside `0..=3`.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_index: i64,
        explanation: impl Into<String>,
        difficulty: Difficulty,
        points: i64,
    ) -> Result<Self, QuestionError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let count = options.len();
        let options: [String; OPTION_COUNT] = options
            .into_iter()
            .map(|o| o.trim().to_string())
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| QuestionError::OptionCount(count))?;
        if let Some(index) = options.iter().position(String::is_empty) {
            return Err(QuestionError::EmptyOption { index });
        }

        let correct_index = usize::try_from(correct_index)
            .ok()
            .filter(|i| *i < OPTION_COUNT)
            .ok_or(QuestionError::CorrectIndexOutOfRange(correct_index))?;

        let points = u32::try_from(points)
            .ok()
            .filter(|p| *p > 0)
            .unwrap_or_else(|| difficulty.points());

        Ok(Self {
            id,
            text,
            options,
            correct_index,
            explanation: explanation.into().trim().to_string(),
            difficulty,
            points,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_index
    }
}

//
// ─── OPEN ENDED ────────────────────────────────────────────────────────────────
//

/// Open-ended prompt; grading happens per answer at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenEndedQuestion {
    id: QuestionId,
    text: String,
}

impl OpenEndedQuestion {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` if the prompt is blank.
    pub fn new(id: QuestionId, text: impl Into<String>) -> Result<Self, QuestionError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        Ok(Self { id, text })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Ordered questions produced for one session. Order is presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionSet {
    MultipleChoice(Vec<MultipleChoiceQuestion>),
    OpenEnded(Vec<OpenEndedQuestion>),
}

impl QuestionSet {
    #[must_use]
    pub fn empty(mode: QuizMode) -> Self {
        match mode {
            QuizMode::MultipleChoice => Self::MultipleChoice(Vec::new()),
            QuizMode::OpenEnded => Self::OpenEnded(Vec::new()),
        }
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        match self {
            QuestionSet::MultipleChoice(_) => QuizMode::MultipleChoice,
            QuestionSet::OpenEnded(_) => QuizMode::OpenEnded,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            QuestionSet::MultipleChoice(q) => q.len(),
            QuestionSet::OpenEnded(q) => q.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of points available across the set (10 per open-ended question).
    #[must_use]
    pub fn total_points(&self) -> u32 {
        match self {
            QuestionSet::MultipleChoice(q) => q.iter().map(MultipleChoiceQuestion::points).sum(),
            QuestionSet::OpenEnded(q) => {
                u32::try_from(q.len()).unwrap_or(u32::MAX).saturating_mul(10)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        ["a", "b", "c", "d"].iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn builds_valid_question() {
        let q = MultipleChoiceQuestion::new(
            QuestionId::new("q1"),
            "Normal resting heart rate?",
            options(),
            1,
            "60-100 bpm",
            Difficulty::Beginner,
            10,
        )
        .unwrap();
        assert_eq!(q.correct_option(), "b");
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn rejects_wrong_option_count() {
        let mut opts = options();
        opts.pop();
        let err = MultipleChoiceQuestion::new(
            QuestionId::new("q1"),
            "Q",
            opts,
            0,
            "",
            Difficulty::Beginner,
            10,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::OptionCount(3));
    }

    #[test]
    fn rejects_out_of_range_index() {
        for idx in [-1, 4] {
            let err = MultipleChoiceQuestion::new(
                QuestionId::new("q1"),
                "Q",
                options(),
                idx,
                "",
                Difficulty::Advanced,
                20,
            )
            .unwrap_err();
            assert_eq!(err, QuestionError::CorrectIndexOutOfRange(idx));
        }
    }

    #[test]
    fn non_positive_points_use_difficulty_band() {
        let q = MultipleChoiceQuestion::new(
            QuestionId::new("q2"),
            "Q",
            options(),
            3,
            "",
            Difficulty::Intermediate,
            0,
        )
        .unwrap();
        assert_eq!(q.points(), 15);
    }

    #[test]
    fn open_ended_total_points_are_ten_each() {
        let set = QuestionSet::OpenEnded(vec![
            OpenEndedQuestion::new(QuestionId::positional(0), "Explain A").unwrap(),
            OpenEndedQuestion::new(QuestionId::positional(1), "Explain B").unwrap(),
        ]);
        assert_eq!(set.total_points(), 20);
        assert_eq!(set.mode(), QuizMode::OpenEnded);
    }
}
