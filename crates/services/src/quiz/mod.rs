mod controller;
mod settings;

use std::sync::Arc;

use medquiz_core::prompt::PromptBuilder;

use crate::ai::{
    AnswerGrader, FeedbackSynthesizer, GeminiTransport, GenerationClient, ModelTransport,
    QuestionGenerator,
};
use crate::config::AiConfig;
use crate::error::TransportError;

pub use controller::{CurrentQuestion, Progress, QuizController, QuizPhase, StepOutcome};
pub use settings::QuizSettings;

/// The three model-backed collaborators a quiz session needs.
#[derive(Clone)]
pub struct QuizServices {
    pub generator: QuestionGenerator,
    pub grader: AnswerGrader,
    pub feedback: FeedbackSynthesizer,
}

impl QuizServices {
    /// Wire everything to the Gemini endpoint described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn from_config(config: &AiConfig) -> Result<Self, TransportError> {
        let transport: Arc<dyn ModelTransport> = Arc::new(GeminiTransport::new(config)?);
        Ok(Self::with_transport(transport, config))
    }

    /// Wire everything to an arbitrary transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn ModelTransport>, config: &AiConfig) -> Self {
        Self::with_prompts(transport, config, PromptBuilder::default())
    }

    #[must_use]
    pub fn with_prompts(
        transport: Arc<dyn ModelTransport>,
        config: &AiConfig,
        prompts: PromptBuilder,
    ) -> Self {
        let client = GenerationClient::new(transport, config.models.clone());
        Self {
            generator: QuestionGenerator::new(prompts, client.clone())
                .with_extract_options(config.extract),
            grader: AnswerGrader::new(client.clone(), config.word_band),
            feedback: FeedbackSynthesizer::new(client),
        }
    }
}
