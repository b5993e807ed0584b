use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Marker substituted for the answer text of a skipped question.
pub const SKIPPED_SENTINEL: &str = "[SKIPPED]";

/// Highest score the grader can award an open-ended answer.
pub const MAX_OPEN_SCORE: u8 = 10;

/// Open-ended scores at or above this count as a correct answer in results.
pub const OPEN_CORRECT_THRESHOLD: u8 = 7;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("answer cannot be empty")]
    Empty,

    #[error("answer is too short ({words} words, minimum {min})")]
    TooShort { words: usize, min: usize },

    #[error("answer is too long ({words} words, maximum {max})")]
    TooLong { words: usize, max: usize },

    #[error("option {index} does not exist (choose 0..={max})")]
    OptionOutOfRange { index: usize, max: usize },
}

//
// ─── WORD BAND ─────────────────────────────────────────────────────────────────
//

/// Target length band for open-ended answers.
///
/// `min` is enforced before grading; both bounds are also handed to the
/// grader as rubric parameters. `max: None` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBand {
    pub min: usize,
    pub max: Option<usize>,
}

impl Default for WordBand {
    fn default() -> Self {
        Self {
            min: 25,
            max: Some(50),
        }
    }
}

impl WordBand {
    /// Hard cap applied before grading: answers longer than four times the
    /// target maximum are refused outright.
    #[must_use]
    pub fn hard_max(&self) -> Option<usize> {
        self.max.map(|m| m.saturating_mul(4))
    }

    /// Validate a free-text answer against the band.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` for blank, too-short or grossly too-long answers.
    pub fn check(&self, answer: &str) -> Result<usize, AnswerError> {
        let words = word_count(answer);
        if words == 0 {
            return Err(AnswerError::Empty);
        }
        if words < self.min {
            return Err(AnswerError::TooShort {
                words,
                min: self.min,
            });
        }
        if let Some(max) = self.hard_max() {
            if words > max {
                return Err(AnswerError::TooLong { words, max });
            }
        }
        Ok(words)
    }

    /// Describes the band for rubric prompts, e.g. "25 to 50 words".
    #[must_use]
    pub fn describe(&self) -> String {
        match self.max {
            Some(max) => format!("{} to {} words", self.min, max),
            None => format!("at least {} words", self.min),
        }
    }
}

/// Whitespace-delimited word count.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

//
// ─── ANSWER TEXT ───────────────────────────────────────────────────────────────
//

/// Free-text answer, or the skip sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerText {
    Given(String),
    Skipped,
}

impl AnswerText {
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, AnswerText::Skipped)
    }

    /// Text as shown to the feedback prompt (`[SKIPPED]` for skips).
    #[must_use]
    pub fn as_prompt_text(&self) -> &str {
        match self {
            AnswerText::Given(text) => text,
            AnswerText::Skipped => SKIPPED_SENTINEL,
        }
    }
}

impl fmt::Display for AnswerText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_prompt_text())
    }
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Score and feedback for a single open-ended answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grading {
    pub score: u8,
    pub feedback: String,
}

impl Grading {
    /// Build a grading, clamping the score into `0..=10`.
    #[must_use]
    pub fn new(score: i64, feedback: impl Into<String>) -> Self {
        let clamped = score.clamp(0, i64::from(MAX_OPEN_SCORE));
        Self {
            score: u8::try_from(clamped).unwrap_or(0),
            feedback: feedback.into(),
        }
    }
}

//
// ─── ANSWERED QUESTION ─────────────────────────────────────────────────────────
//

/// Outcome of the one terminal action taken on a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnswerOutcome {
    Choice {
        selected: Option<usize>,
        correct: bool,
        points: u32,
    },
    Open {
        answer: AnswerText,
        score: u8,
        feedback: String,
    },
}

/// Immutable record of how one question was answered (or skipped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnsweredQuestion {
    question_id: QuestionId,
    question: String,
    outcome: AnswerOutcome,
}

impl AnsweredQuestion {
    #[must_use]
    pub fn choice(
        question_id: QuestionId,
        question: impl Into<String>,
        selected: usize,
        correct: bool,
        points: u32,
    ) -> Self {
        Self {
            question_id,
            question: question.into(),
            outcome: AnswerOutcome::Choice {
                selected: Some(selected),
                correct,
                points: if correct { points } else { 0 },
            },
        }
    }

    #[must_use]
    pub fn open(
        question_id: QuestionId,
        question: impl Into<String>,
        answer: String,
        grading: Grading,
    ) -> Self {
        Self {
            question_id,
            question: question.into(),
            outcome: AnswerOutcome::Open {
                answer: AnswerText::Given(answer),
                score: grading.score,
                feedback: grading.feedback,
            },
        }
    }

    /// Skipped multiple-choice question: no selection, zero points.
    #[must_use]
    pub fn skipped_choice(question_id: QuestionId, question: impl Into<String>) -> Self {
        Self {
            question_id,
            question: question.into(),
            outcome: AnswerOutcome::Choice {
                selected: None,
                correct: false,
                points: 0,
            },
        }
    }

    /// Skipped open-ended question: sentinel answer, zero score.
    #[must_use]
    pub fn skipped_open(question_id: QuestionId, question: impl Into<String>) -> Self {
        Self {
            question_id,
            question: question.into(),
            outcome: AnswerOutcome::Open {
                answer: AnswerText::Skipped,
                score: 0,
                feedback: String::new(),
            },
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn outcome(&self) -> &AnswerOutcome {
        &self.outcome
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        match &self.outcome {
            AnswerOutcome::Choice { selected, .. } => selected.is_none(),
            AnswerOutcome::Open { answer, .. } => answer.is_skipped(),
        }
    }

    /// Points earned toward the quiz total.
    #[must_use]
    pub fn points(&self) -> u32 {
        match &self.outcome {
            AnswerOutcome::Choice { points, .. } => *points,
            AnswerOutcome::Open { score, .. } => u32::from(*score),
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        match &self.outcome {
            AnswerOutcome::Choice { correct, .. } => *correct,
            AnswerOutcome::Open { answer, score, .. } => {
                !answer.is_skipped() && *score >= OPEN_CORRECT_THRESHOLD
            }
        }
    }

    /// Score out of 10 used by the feedback prompt.
    #[must_use]
    pub fn score_out_of_ten(&self) -> u8 {
        match &self.outcome {
            AnswerOutcome::Choice { correct, .. } => {
                if *correct {
                    MAX_OPEN_SCORE
                } else {
                    0
                }
            }
            AnswerOutcome::Open { score, .. } => *score,
        }
    }

    /// Answer text for feedback prompts. Choices render as the option index.
    #[must_use]
    pub fn answer_text(&self, options: Option<&[String]>) -> String {
        match &self.outcome {
            AnswerOutcome::Choice { selected: None, .. } => SKIPPED_SENTINEL.to_string(),
            AnswerOutcome::Choice {
                selected: Some(i), ..
            } => options
                .and_then(|opts| opts.get(*i))
                .cloned()
                .unwrap_or_else(|| format!("option {}", i + 1)),
            AnswerOutcome::Open { answer, .. } => answer.as_prompt_text().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_rejects_short_and_empty_answers() {
        let band = WordBand::default();
        assert_eq!(band.check("   "), Err(AnswerError::Empty));
        assert_eq!(
            band.check("too short"),
            Err(AnswerError::TooShort { words: 2, min: 25 })
        );
        let ok = "word ".repeat(30);
        assert_eq!(band.check(&ok), Ok(30));
    }

    #[test]
    fn band_without_max_has_no_hard_cap() {
        let band = WordBand { min: 1, max: None };
        assert!(band.check(&"w ".repeat(10_000)).is_ok());
        assert_eq!(band.describe(), "at least 1 words");
    }

    #[test]
    fn grading_clamps_score() {
        assert_eq!(Grading::new(14, "x").score, 10);
        assert_eq!(Grading::new(-3, "x").score, 0);
    }

    #[test]
    fn skipped_answers_carry_sentinel_and_no_points() {
        let mc = AnsweredQuestion::skipped_choice(QuestionId::new("q1"), "Q");
        assert!(mc.is_skipped());
        assert_eq!(mc.points(), 0);
        assert_eq!(mc.answer_text(None), SKIPPED_SENTINEL);

        let open = AnsweredQuestion::skipped_open(QuestionId::new("q2"), "Q");
        assert!(open.is_skipped());
        assert!(!open.is_correct());
        assert_eq!(open.answer_text(None), "[SKIPPED]");
    }

    #[test]
    fn wrong_choice_earns_nothing() {
        let a = AnsweredQuestion::choice(QuestionId::new("q1"), "Q", 2, false, 15);
        assert_eq!(a.points(), 0);
        assert_eq!(a.score_out_of_ten(), 0);
    }
}
