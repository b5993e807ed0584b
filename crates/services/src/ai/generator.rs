use medquiz_core::extract::{self, ExtractOptions};
use medquiz_core::model::{QuestionSet, QuizMode, QuizRequest};
use medquiz_core::prompt::PromptBuilder;
use tracing::{info, warn};

use crate::ai::generation_client::{GenerationClient, GenerationOutcome};
use crate::ai::transport::GenerationParams;

/// Prompt, generate and extract: turns a request into a question set.
///
/// Every failure along the way collapses into an empty set; the reason is
/// logged here and nowhere else.
#[derive(Clone)]
pub struct QuestionGenerator {
    prompts: PromptBuilder,
    client: GenerationClient,
    params: GenerationParams,
    extract: ExtractOptions,
}

impl QuestionGenerator {
    #[must_use]
    pub fn new(prompts: PromptBuilder, client: GenerationClient) -> Self {
        Self {
            prompts,
            client,
            params: GenerationParams::default(),
            extract: ExtractOptions::default(),
        }
    }

    #[must_use]
    pub fn with_extract_options(mut self, extract: ExtractOptions) -> Self {
        self.extract = extract;
        self
    }

    pub async fn generate(&self, request: &QuizRequest) -> QuestionSet {
        let prompt = self.prompts.question_prompt(request);
        let text = match self.client.generate(&prompt, self.params).await {
            GenerationOutcome::Text { text, .. } => text,
            GenerationOutcome::NoResult { reason } => {
                warn!(topic = request.topic(), ?reason, "question generation produced no text");
                return QuestionSet::empty(request.mode());
            }
        };

        let extracted = match request.mode() {
            QuizMode::MultipleChoice => extract::extract_multiple_choice(&text, self.extract)
                .map(QuestionSet::MultipleChoice),
            QuizMode::OpenEnded => {
                extract::extract_open_ended(&text, self.extract).map(QuestionSet::OpenEnded)
            }
        };

        match extracted {
            Ok(set) => {
                if usize::try_from(request.question_count()).ok() != Some(set.len()) {
                    info!(
                        requested = request.question_count(),
                        received = set.len(),
                        "model returned a different number of questions"
                    );
                }
                set
            }
            Err(e) => {
                warn!(
                    topic = request.topic(),
                    error = %e,
                    "could not extract questions from response"
                );
                QuestionSet::empty(request.mode())
            }
        }
    }
}
