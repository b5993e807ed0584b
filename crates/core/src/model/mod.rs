mod answer;
mod feedback;
mod ids;
mod profile;
mod question;
mod request;
mod result;

pub use answer::{
    AnswerError, AnswerOutcome, AnswerText, AnsweredQuestion, Grading, MAX_OPEN_SCORE,
    OPEN_CORRECT_THRESHOLD, SKIPPED_SENTINEL, WordBand, word_count,
};
pub use feedback::{FeedbackReport, FeedbackSection};
pub use ids::{QuestionId, SessionId, UserId};
pub use profile::{UserProfile, generate_username};
pub use question::{
    Difficulty, MultipleChoiceQuestion, OPTION_COUNT, OpenEndedQuestion, QuestionError,
    QuestionSet,
};
pub use request::{
    MAX_CONTEXT_CHARS, MAX_QUESTION_COUNT, MAX_TOPIC_CHARS, MIN_QUESTION_COUNT, QuestionStyle,
    QuizMode, QuizRequest, QuizRequestDraft, QuizRequestError, SUGGESTED_TOPICS, validate_topic,
};
pub use result::{QuizResult, QuizResultError};
