use chrono::{DateTime, Utc};
use medquiz_core::Clock;
use medquiz_core::model::{
    AnswerError, AnsweredQuestion, FeedbackReport, MultipleChoiceQuestion, OPTION_COUNT,
    OpenEndedQuestion, QuestionSet, QuizMode, QuizRequest, QuizResult, SessionId,
    validate_topic,
};
use medquiz_core::prompt::FeedbackEntry;
use tracing::{info, warn};

use super::QuizServices;
use super::settings::QuizSettings;
use crate::error::ControllerError;

/// Message shown when generation yields no usable questions.
pub const NO_QUESTIONS_MESSAGE: &str =
    "We couldn't generate questions for this topic right now. Please try again.";

/// Observable phase of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Selecting,
    PreQuizSettings,
    Loading,
    Active,
    Finished,
    Error,
}

/// Question awaiting its terminal action.
#[derive(Debug, Clone, Copy)]
pub enum CurrentQuestion<'a> {
    MultipleChoice(&'a MultipleChoiceQuestion),
    OpenEnded(&'a OpenEndedQuestion),
}

impl CurrentQuestion<'_> {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            CurrentQuestion::MultipleChoice(q) => q.text(),
            CurrentQuestion::OpenEnded(q) => q.text(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

/// Result of one terminal action on a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub answered: AnsweredQuestion,
    /// True when this was the last question and the session is now finished.
    pub finished: bool,
}

struct ActiveQuiz {
    session_id: SessionId,
    request: QuizRequest,
    questions: QuestionSet,
    answers: Vec<AnsweredQuestion>,
    started_at: DateTime<Utc>,
}

struct FinishedQuiz {
    request: QuizRequest,
    questions: QuestionSet,
    result: QuizResult,
    feedback: Option<FeedbackReport>,
}

enum State {
    Selecting,
    Settings { topic: String },
    Loading { topic: String },
    Active(ActiveQuiz),
    Finished(FinishedQuiz),
    Error { topic: String, message: String },
}

impl State {
    fn phase(&self) -> QuizPhase {
        match self {
            State::Selecting => QuizPhase::Selecting,
            State::Settings { .. } => QuizPhase::PreQuizSettings,
            State::Loading { .. } => QuizPhase::Loading,
            State::Active(_) => QuizPhase::Active,
            State::Finished(_) => QuizPhase::Finished,
            State::Error { .. } => QuizPhase::Error,
        }
    }
}

/// Drives one user through topic selection, settings, answering and
/// feedback.
///
/// Every async step takes `&mut self`, so a session never has more than one
/// model call in flight. Each question receives exactly one terminal action
/// (answer or skip) and answers are kept in presentation order.
pub struct QuizController {
    services: QuizServices,
    clock: Clock,
    state: State,
}

impl QuizController {
    #[must_use]
    pub fn new(services: QuizServices, clock: Clock) -> Self {
        Self {
            services,
            clock,
            state: State::Selecting,
        }
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.state.phase()
    }

    fn invalid(&self, operation: &'static str) -> ControllerError {
        ControllerError::InvalidState {
            operation,
            phase: self.phase(),
        }
    }

    // ─── transitions ────────────────────────────────────────────────────────

    /// Selecting → PreQuizSettings.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty or oversized topic; `InvalidState` outside
    /// the selection step.
    pub fn select_topic(&mut self, topic: &str) -> Result<(), ControllerError> {
        if !matches!(self.state, State::Selecting) {
            return Err(self.invalid("select_topic"));
        }
        let topic = validate_topic(topic)?;
        self.state = State::Settings { topic };
        Ok(())
    }

    /// PreQuizSettings (or Error) → Selecting.
    ///
    /// # Errors
    ///
    /// `InvalidState` from any other phase.
    pub fn back_to_selection(&mut self) -> Result<(), ControllerError> {
        match self.state {
            State::Settings { .. } | State::Error { .. } => {
                self.state = State::Selecting;
                Ok(())
            }
            _ => Err(self.invalid("back_to_selection")),
        }
    }

    /// Validate the settings, generate questions and enter the quiz.
    ///
    /// Returns the phase reached: `Active` with at least one question, or
    /// `Error` when generation produced nothing.
    ///
    /// # Errors
    ///
    /// `Validation` for bad settings (no network call is made);
    /// `InvalidState` outside the settings step.
    pub async fn start(&mut self, settings: QuizSettings) -> Result<QuizPhase, ControllerError> {
        let State::Settings { topic } = &self.state else {
            return Err(self.invalid("start"));
        };
        let request = settings.into_draft(topic.clone()).validate()?;
        let topic = request.topic().to_string();

        self.state = State::Loading {
            topic: topic.clone(),
        };
        let questions = self.services.generator.generate(&request).await;

        if questions.is_empty() {
            warn!(%topic, "no questions generated");
            self.state = State::Error {
                topic,
                message: NO_QUESTIONS_MESSAGE.to_string(),
            };
            return Ok(QuizPhase::Error);
        }

        info!(%topic, count = questions.len(), mode = %request.mode(), "quiz started");
        self.state = State::Active(ActiveQuiz {
            session_id: SessionId::new_random(),
            request,
            questions,
            answers: Vec::new(),
            started_at: self.clock.now(),
        });
        Ok(QuizPhase::Active)
    }

    /// Answer the current multiple-choice question.
    ///
    /// # Errors
    ///
    /// `Validation` for an option index outside `0..4`; `InvalidState` when
    /// no multiple-choice question is awaiting an answer.
    pub fn choose_option(&mut self, index: usize) -> Result<StepOutcome, ControllerError> {
        let Some(CurrentQuestion::MultipleChoice(question)) = self.current_question() else {
            return Err(self.invalid("choose_option"));
        };
        if index >= OPTION_COUNT {
            return Err(AnswerError::OptionOutOfRange {
                index,
                max: OPTION_COUNT - 1,
            }
            .into());
        }
        let answered = AnsweredQuestion::choice(
            question.id().clone(),
            question.text(),
            index,
            question.is_correct(index),
            question.points(),
        );
        self.record_answer(answered)
    }

    /// Grade and record a free-text answer to the current open-ended
    /// question. The word band is checked before any network call.
    ///
    /// # Errors
    ///
    /// `Validation` when the answer is empty or outside the word band;
    /// `InvalidState` when no open-ended question is awaiting an answer.
    pub async fn submit_answer(&mut self, text: &str) -> Result<StepOutcome, ControllerError> {
        let Some(CurrentQuestion::OpenEnded(question)) = self.current_question() else {
            return Err(self.invalid("submit_answer"));
        };
        let id = question.id().clone();
        let question_text = question.text().to_string();

        let answer = text.trim();
        self.services.grader.word_band().check(answer)?;

        let grading = self.services.grader.grade(&question_text, answer).await;
        let answered = AnsweredQuestion::open(id, question_text, answer.to_string(), grading);
        self.record_answer(answered)
    }

    /// Skip the current question: zero points, sentinel answer.
    ///
    /// # Errors
    ///
    /// `InvalidState` when no question is awaiting an answer.
    pub fn skip(&mut self) -> Result<StepOutcome, ControllerError> {
        let answered = match self.current_question() {
            Some(CurrentQuestion::MultipleChoice(q)) => {
                AnsweredQuestion::skipped_choice(q.id().clone(), q.text())
            }
            Some(CurrentQuestion::OpenEnded(q)) => {
                AnsweredQuestion::skipped_open(q.id().clone(), q.text())
            }
            None => return Err(self.invalid("skip")),
        };
        self.record_answer(answered)
    }

    /// Produce (once) and return the end-of-quiz feedback report.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the quiz is finished.
    pub async fn finish_feedback(&mut self) -> Result<&FeedbackReport, ControllerError> {
        if !matches!(self.state, State::Finished(_)) {
            return Err(self.invalid("finish_feedback"));
        }
        let State::Finished(finished) = &mut self.state else {
            unreachable!("state checked above");
        };

        // A cached fallback is treated as a miss so a later call can retry.
        let report = match finished.feedback.take() {
            Some(report) if !report.is_fallback() => report,
            _ => {
                let entries = feedback_entries(&finished.questions, finished.result.answers());
                self.services
                    .feedback
                    .synthesize(finished.request.topic(), &entries)
                    .await
            }
        };
        Ok(finished.feedback.insert(report))
    }

    /// Discard everything and return to topic selection.
    pub fn restart(&mut self) {
        self.state = State::Selecting;
    }

    // ─── views ──────────────────────────────────────────────────────────────

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        match &self.state {
            State::Selecting => None,
            State::Settings { topic } | State::Loading { topic } | State::Error { topic, .. } => {
                Some(topic)
            }
            State::Active(active) => Some(active.request.topic()),
            State::Finished(finished) => Some(finished.request.topic()),
        }
    }

    #[must_use]
    pub fn request(&self) -> Option<&QuizRequest> {
        match &self.state {
            State::Active(active) => Some(&active.request),
            State::Finished(finished) => Some(&finished.request),
            _ => None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Option<QuizMode> {
        self.request().map(QuizRequest::mode)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<CurrentQuestion<'_>> {
        let State::Active(active) = &self.state else {
            return None;
        };
        let index = active.answers.len();
        match &active.questions {
            QuestionSet::MultipleChoice(qs) => qs.get(index).map(CurrentQuestion::MultipleChoice),
            QuestionSet::OpenEnded(qs) => qs.get(index).map(CurrentQuestion::OpenEnded),
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        match &self.state {
            State::Active(active) => Some(Progress {
                answered: active.answers.len(),
                total: active.questions.len(),
            }),
            State::Finished(finished) => Some(Progress {
                answered: finished.result.answers().len(),
                total: finished.questions.len(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn answers(&self) -> &[AnsweredQuestion] {
        match &self.state {
            State::Active(active) => &active.answers,
            State::Finished(finished) => finished.result.answers(),
            _ => &[],
        }
    }

    #[must_use]
    pub fn questions(&self) -> Option<&QuestionSet> {
        match &self.state {
            State::Active(active) => Some(&active.questions),
            State::Finished(finished) => Some(&finished.questions),
            _ => None,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        match &self.state {
            State::Finished(finished) => Some(&finished.result),
            _ => None,
        }
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&FeedbackReport> {
        match &self.state {
            State::Finished(finished) => finished.feedback.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            State::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    // ─── internals ──────────────────────────────────────────────────────────

    fn record_answer(
        &mut self,
        answered: AnsweredQuestion,
    ) -> Result<StepOutcome, ControllerError> {
        let completed_at = self.clock.now();
        let State::Active(active) = &mut self.state else {
            return Err(self.invalid("answer"));
        };
        active.answers.push(answered.clone());
        if active.answers.len() < active.questions.len() {
            return Ok(StepOutcome {
                answered,
                finished: false,
            });
        }

        let result = QuizResult::build(
            active.session_id,
            active.request.mode(),
            active.request.topic(),
            active.started_at,
            completed_at.max(active.started_at),
            active.questions.len(),
            active.questions.total_points(),
            active.answers.clone(),
        )?;
        info!(
            topic = result.topic(),
            score = result.score(),
            total = result.total_points(),
            skipped = result.skipped(),
            "quiz finished"
        );

        if let State::Active(active) = std::mem::replace(&mut self.state, State::Selecting) {
            self.state = State::Finished(FinishedQuiz {
                request: active.request,
                questions: active.questions,
                result,
                feedback: None,
            });
        }
        Ok(StepOutcome {
            answered,
            finished: true,
        })
    }
}

fn feedback_entries(questions: &QuestionSet, answers: &[AnsweredQuestion]) -> Vec<FeedbackEntry> {
    answers
        .iter()
        .enumerate()
        .map(|(i, answered)| {
            let answer = match questions {
                QuestionSet::MultipleChoice(qs) => {
                    answered.answer_text(qs.get(i).map(|q| q.options().as_slice()))
                }
                QuestionSet::OpenEnded(_) => answered.answer_text(None),
            };
            FeedbackEntry {
                question: answered.question().to_string(),
                answer,
                score: answered.score_out_of_ten(),
            }
        })
        .collect()
}
