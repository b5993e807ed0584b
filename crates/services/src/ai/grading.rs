use medquiz_core::extract::{ScanStrategy, json_candidates};
use medquiz_core::model::{Grading, WordBand};
use medquiz_core::prompt::grading_prompt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::ai::generation_client::GenerationClient;
use crate::ai::transport::GenerationParams;

pub const GRADING_FALLBACK_FEEDBACK: &str =
    "There was an error verifying your answer. Please try again.";

/// Scores open-ended answers on a 0 to 10 rubric.
#[derive(Clone)]
pub struct AnswerGrader {
    client: GenerationClient,
    band: WordBand,
    params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct RawGrading {
    score: Value,
    #[serde(default)]
    feedback: String,
}

impl AnswerGrader {
    #[must_use]
    pub fn new(client: GenerationClient, band: WordBand) -> Self {
        Self {
            client,
            band,
            params: GenerationParams::default(),
        }
    }

    #[must_use]
    pub fn word_band(&self) -> WordBand {
        self.band
    }

    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "score": {"type": "INTEGER", "description": "Score from 0 to 10"},
                "feedback": {"type": "STRING"}
            },
            "required": ["score", "feedback"]
        })
    }

    /// Grade one answer. Never fails: any transport or parse problem yields a
    /// zero score with an apology.
    pub async fn grade(&self, question: &str, answer: &str) -> Grading {
        let prompt = grading_prompt(question, answer, &self.band);
        match self
            .client
            .generate_structured(&prompt, self.params, Self::schema())
            .await
        {
            Ok(text) => parse_grading(&text).unwrap_or_else(|| {
                error!(len = text.len(), "grading response was not a valid score");
                fallback()
            }),
            Err(e) => {
                error!(error = %e, "grading request failed");
                fallback()
            }
        }
    }
}

fn fallback() -> Grading {
    Grading::new(0, GRADING_FALLBACK_FEEDBACK)
}

// Fractional scores are rounded; out-of-range scores are clamped by `Grading`.
fn parse_grading(text: &str) -> Option<Grading> {
    json_candidates(text, ScanStrategy::Balanced)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<RawGrading>(candidate).ok())
        .and_then(|raw| {
            let score = match &raw.score {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(round_score))?,
                Value::String(s) => s.trim().parse::<f64>().ok().map(round_score)?,
                _ => return None,
            };
            debug!(score, "parsed grading");
            Some(Grading::new(score, raw.feedback.trim()))
        })
}

#[allow(clippy::cast_possible_truncation)]
fn round_score(v: f64) -> i64 {
    v.round() as i64
}
