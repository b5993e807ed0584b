#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod config;
pub mod error;
pub mod quiz;
pub mod results;

pub use medquiz_core::Clock;

pub use app_services::AppServices;
pub use config::{AiConfig, load_dotenv};
pub use error::{
    AppServicesError, ConfigError, ControllerError, RecordError, TransportError, ValidationError,
};
pub use quiz::{
    CurrentQuestion, Progress, QuizController, QuizPhase, QuizServices, QuizSettings, StepOutcome,
};
pub use results::{RecordOutcome, ResultRecorder, RetryPolicy};
