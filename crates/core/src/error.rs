use thiserror::Error;

use crate::extract::ExtractError;
use crate::model::{AnswerError, QuestionError, QuizRequestError, QuizResultError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Request(#[from] QuizRequestError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Result(#[from] QuizResultError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractOptions, extract_open_ended};
    use crate::model::{QuestionStyle, QuizMode, QuizRequestDraft};

    fn open_quiz(text: &str, topic: &str) -> Result<usize, Error> {
        let draft = QuizRequestDraft {
            question_style: QuestionStyle::CaseBased,
            ..QuizRequestDraft::new(topic, QuizMode::OpenEnded, 5)
        };
        draft.validate()?;
        Ok(extract_open_ended(text, ExtractOptions::default())?.len())
    }

    #[test]
    fn model_errors_convert_into_crate_error() {
        assert!(matches!(open_quiz("{}", "  "), Err(Error::Request(_))));
        assert!(matches!(open_quiz("no json", "Neurology"), Err(Error::Extract(_))));
        assert_eq!(
            open_quiz(r#"{"questions": ["Describe the circle of Willis."]}"#, "Neurology").unwrap(),
            1
        );
    }
}
