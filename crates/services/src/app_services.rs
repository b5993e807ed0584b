use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::ai::ModelTransport;
use crate::config::AiConfig;
use crate::error::AppServicesError;
use crate::quiz::{QuizController, QuizServices, QuizSettings};
use crate::results::ResultRecorder;

/// Assembles the quiz pipeline and result recording behind one handle.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    config: Arc<AiConfig>,
    quiz: QuizServices,
    recorder: Arc<ResultRecorder>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the Gemini endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the HTTP
    /// client cannot be built.
    pub async fn new_sqlite(
        db_url: &str,
        config: AiConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let quiz = QuizServices::from_config(&config)?;
        Ok(Self::assemble(&storage, quiz, config, clock))
    }

    /// In-memory storage and a caller-supplied transport.
    #[must_use]
    pub fn in_memory(transport: Arc<dyn ModelTransport>, config: AiConfig, clock: Clock) -> Self {
        let storage = Storage::in_memory();
        let quiz = QuizServices::with_transport(transport, &config);
        Self::assemble(&storage, quiz, config, clock)
    }

    fn assemble(storage: &Storage, quiz: QuizServices, config: AiConfig, clock: Clock) -> Self {
        Self {
            clock,
            config: Arc::new(config),
            quiz,
            recorder: Arc::new(ResultRecorder::from_storage(clock, storage)),
        }
    }

    /// Fresh controller for one quiz session.
    #[must_use]
    pub fn new_controller(&self) -> QuizController {
        QuizController::new(self.quiz.clone(), self.clock)
    }

    /// Settings pre-filled from configuration.
    #[must_use]
    pub fn default_settings(&self) -> QuizSettings {
        QuizSettings {
            cache_bust: self.config.cache_bust,
            ..QuizSettings::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    #[must_use]
    pub fn recorder(&self) -> Arc<ResultRecorder> {
        Arc::clone(&self.recorder)
    }
}
