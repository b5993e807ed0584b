use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::answer::AnsweredQuestion;
use crate::model::ids::SessionId;
use crate::model::request::QuizMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizResultError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("answered {answered} of {expected} questions")]
    Incomplete { answered: usize, expected: usize },

    #[error("too many answers for a single quiz: {len}")]
    TooManyAnswers { len: usize },
}

/// Aggregate outcome of one completed quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizResult {
    session_id: SessionId,
    mode: QuizMode,
    topic: String,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    score: u32,
    total_points: u32,
    total_questions: u32,
    correct_answers: u32,
    skipped: u32,
    answers: Vec<AnsweredQuestion>,
}

impl QuizResult {
    /// Build the result once every question has a terminal answer.
    ///
    /// # Errors
    ///
    /// Returns `QuizResultError::Incomplete` when `answers` does not cover all
    /// `expected` questions, and `InvalidTimeRange` when the timestamps are
    /// inverted.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        session_id: SessionId,
        mode: QuizMode,
        topic: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        expected: usize,
        total_points: u32,
        answers: Vec<AnsweredQuestion>,
    ) -> Result<Self, QuizResultError> {
        if completed_at < started_at {
            return Err(QuizResultError::InvalidTimeRange);
        }
        if answers.len() != expected {
            return Err(QuizResultError::Incomplete {
                answered: answers.len(),
                expected,
            });
        }

        let total_questions = u32::try_from(answers.len())
            .map_err(|_| QuizResultError::TooManyAnswers { len: answers.len() })?;

        let mut score = 0_u32;
        let mut correct_answers = 0_u32;
        let mut skipped = 0_u32;
        for answer in &answers {
            score = score.saturating_add(answer.points());
            if answer.is_correct() {
                correct_answers = correct_answers.saturating_add(1);
            }
            if answer.is_skipped() {
                skipped = skipped.saturating_add(1);
            }
        }

        Ok(Self {
            session_id,
            mode,
            topic: topic.into(),
            started_at,
            completed_at,
            score,
            total_points,
            total_questions,
            correct_answers,
            skipped,
            answers,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    #[must_use]
    pub fn answers(&self) -> &[AnsweredQuestion] {
        &self.answers
    }

    /// Whole seconds between start and completion.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        u64::try_from((self.completed_at - self.started_at).num_seconds()).unwrap_or(0)
    }

    /// Rounded percentage of available points earned.
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.total_points == 0 {
            return 0;
        }
        let pct = (f64::from(self.score) / f64::from(self.total_points)) * 100.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            pct.round() as u32
        }
    }
}
