//! Shared error types for the services crate.

use thiserror::Error;

use medquiz_core::model::{AnswerError, QuizRequestError, QuizResultError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::quiz::QuizPhase;

/// Errors raised while reading configuration. These are fatal at startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("{key} has an invalid value: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("no generation models configured")]
    NoModels,
}

/// Errors from a single call to the generation endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("generation endpoint rejected the request ({status}): {message}")]
    Rejected {
        status: u16,
        api_status: Option<String>,
        message: String,
    },
    #[error("generation request timed out")]
    Timeout,
    #[error("generation endpoint returned no text")]
    EmptyResponse,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl TransportError {
    /// Permission or invalid-argument failures will not succeed on any other
    /// model, so the fallback chain stops on them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        const TERMINAL_MARKERS: [&str; 2] = ["PERMISSION_DENIED", "INVALID_ARGUMENT"];
        match self {
            TransportError::Rejected {
                status,
                api_status,
                message,
            } => {
                matches!(status, 401 | 403)
                    || api_status
                        .as_deref()
                        .is_some_and(|s| TERMINAL_MARKERS.contains(&s))
                    || TERMINAL_MARKERS.iter().any(|m| message.contains(m))
            }
            TransportError::Timeout | TransportError::EmptyResponse | TransportError::Http(_) => {
                false
            }
        }
    }
}

/// Input problems caught before any network call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error(transparent)]
    Request(#[from] QuizRequestError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Errors emitted by `QuizController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("`{operation}` is not allowed while {phase:?}")]
    InvalidState {
        operation: &'static str,
        phase: QuizPhase,
    },
    #[error(transparent)]
    Result(#[from] QuizResultError),
}

impl From<QuizRequestError> for ControllerError {
    fn from(e: QuizRequestError) -> Self {
        ControllerError::Validation(e.into())
    }
}

impl From<AnswerError> for ControllerError {
    fn from(e: AnswerError) -> Self {
        ControllerError::Validation(e.into())
    }
}

/// Errors emitted by `ResultRecorder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("storage call timed out after {attempts} attempt(s)")]
    TimedOut { attempts: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16, api_status: Option<&str>, message: &str) -> TransportError {
        TransportError::Rejected {
            status,
            api_status: api_status.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn permission_class_is_terminal() {
        assert!(rejected(403, None, "forbidden").is_terminal());
        assert!(rejected(401, None, "").is_terminal());
        assert!(rejected(400, Some("INVALID_ARGUMENT"), "bad key").is_terminal());
        assert!(rejected(400, None, "Error: PERMISSION_DENIED on model").is_terminal());
    }

    #[test]
    fn transient_failures_are_not_terminal() {
        assert!(!rejected(503, Some("UNAVAILABLE"), "overloaded").is_terminal());
        assert!(!rejected(404, Some("NOT_FOUND"), "model not found").is_terminal());
        assert!(!TransportError::Timeout.is_terminal());
        assert!(!TransportError::EmptyResponse.is_terminal());
    }
}
