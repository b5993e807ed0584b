use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::transport::{GenerationParams, GenerationRequest, ModelTransport};
use crate::error::TransportError;

/// Why a generation produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoResultReason {
    /// A permission or invalid-argument failure stopped the chain early.
    Rejected { model: String, message: String },
    /// Every model was tried and none returned text.
    Exhausted { attempts: usize, last_error: String },
    NoModels,
}

/// Outcome of a generation call. Transport failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Text { model: String, text: String },
    NoResult { reason: NoResultReason },
}

/// Runs prompts against an ordered list of models, falling back to the next
/// model on transient failures.
#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn ModelTransport>,
    models: Vec<String>,
}

impl GenerationClient {
    #[must_use]
    pub fn new(transport: Arc<dyn ModelTransport>, models: Vec<String>) -> Self {
        Self { transport, models }
    }

    /// Try each model in order, one request per model.
    pub async fn generate(&self, prompt: &str, params: GenerationParams) -> GenerationOutcome {
        if self.models.is_empty() {
            return GenerationOutcome::NoResult {
                reason: NoResultReason::NoModels,
            };
        }

        let mut last_error = String::new();
        for (attempt, model) in self.models.iter().enumerate() {
            let request = GenerationRequest {
                model: model.clone(),
                prompt: prompt.to_string(),
                params,
                response_schema: None,
            };
            debug!(%model, attempt = attempt + 1, "requesting generation");

            match self.transport.generate(&request).await {
                Ok(text) => {
                    info!(%model, attempt = attempt + 1, len = text.len(), "generation succeeded");
                    return GenerationOutcome::Text {
                        model: model.clone(),
                        text,
                    };
                }
                Err(e) if e.is_terminal() => {
                    warn!(%model, error = %e, "generation rejected; not trying other models");
                    return GenerationOutcome::NoResult {
                        reason: NoResultReason::Rejected {
                            model: model.clone(),
                            message: e.to_string(),
                        },
                    };
                }
                Err(e) => {
                    warn!(%model, error = %e, "generation failed; trying next model");
                    last_error = e.to_string();
                }
            }
        }

        warn!(attempts = self.models.len(), "all generation models failed");
        GenerationOutcome::NoResult {
            reason: NoResultReason::Exhausted {
                attempts: self.models.len(),
                last_error,
            },
        }
    }

    /// Single schema-constrained call against the first model only.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged; callers substitute their own
    /// fallback values.
    pub async fn generate_structured(
        &self,
        prompt: &str,
        params: GenerationParams,
        schema: Value,
    ) -> Result<String, TransportError> {
        let model = self.models.first().ok_or(TransportError::EmptyResponse)?;
        let request = GenerationRequest {
            model: model.clone(),
            prompt: prompt.to_string(),
            params,
            response_schema: Some(schema),
        };
        debug!(%model, "requesting structured generation");
        self.transport.generate(&request).await
    }
}
