use medquiz_core::extract::{ScanStrategy, json_candidates};
use medquiz_core::model::FeedbackReport;
use medquiz_core::prompt::{FeedbackEntry, feedback_prompt};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::ai::generation_client::GenerationClient;
use crate::ai::transport::GenerationParams;

pub const FEEDBACK_FALLBACK: &str =
    "There was an error generating your feedback. Please try again.";

/// Produces the end-of-quiz narrative and study plan.
#[derive(Clone)]
pub struct FeedbackSynthesizer {
    client: GenerationClient,
    params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct RawFeedback {
    feedback: String,
}

impl FeedbackSynthesizer {
    #[must_use]
    pub fn new(client: GenerationClient) -> Self {
        Self {
            client,
            params: GenerationParams::default(),
        }
    }

    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "feedback": {"type": "STRING", "description": "Markdown feedback and study plan"}
            },
            "required": ["feedback"]
        })
    }

    /// Single call, no fallback chain. Failure yields the fixed apology.
    pub async fn synthesize(&self, topic: &str, entries: &[FeedbackEntry]) -> FeedbackReport {
        let prompt = feedback_prompt(topic, entries);
        let text = match self
            .client
            .generate_structured(&prompt, self.params, Self::schema())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, topic, "feedback request failed");
                return FeedbackReport::fallback(FEEDBACK_FALLBACK);
            }
        };

        match parse_feedback(&text) {
            Some(narrative) => {
                let report = FeedbackReport::from_narrative(narrative);
                let missing = report.missing_sections();
                if !missing.is_empty() {
                    info!(?missing, "feedback narrative is missing sections");
                }
                report
            }
            None => {
                error!(len = text.len(), "feedback response had no narrative");
                FeedbackReport::fallback(FEEDBACK_FALLBACK)
            }
        }
    }
}

fn parse_feedback(text: &str) -> Option<String> {
    json_candidates(text, ScanStrategy::Balanced)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<RawFeedback>(candidate).ok())
        .map(|raw| raw.feedback.trim().to_string())
        .filter(|narrative| !narrative.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feedback_field() {
        let text = r##"{"feedback": "# Strengths\nGood recall of {anatomy}."}"##;
        assert_eq!(
            parse_feedback(text).as_deref(),
            Some("# Strengths\nGood recall of {anatomy}.")
        );
    }

    #[test]
    fn empty_feedback_is_rejected() {
        assert!(parse_feedback(r#"{"feedback": "   "}"#).is_none());
        assert!(parse_feedback("plain prose").is_none());
    }
}
