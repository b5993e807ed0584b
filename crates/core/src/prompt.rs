//! Prompt templates for question generation, grading and feedback.
//!
//! Everything here is a pure function of its inputs. The only source of
//! non-determinism, the cache-busting topic suffix, is injected through
//! [`UniquenessSource`].

use std::fmt::Write as _;
use std::sync::Arc;

use crate::model::{
    Difficulty, FeedbackSection, QuestionStyle, QuizMode, QuizRequest, WordBand,
};

//
// ─── UNIQUENESS ────────────────────────────────────────────────────────────────
//

/// Supplies the token appended to the topic when a request asks for
/// cache-busting. Identical prompts can otherwise be served from a response
/// cache upstream and return the same questions every time.
pub trait UniquenessSource: Send + Sync {
    fn token(&self) -> String;
}

/// Random numeric suffix in `[0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSuffix;

impl UniquenessSource for RandomSuffix {
    fn token(&self) -> String {
        rand::random::<f64>().to_string()
    }
}

/// Constant suffix, for tests and reproducible runs.
#[derive(Debug, Clone)]
pub struct FixedSuffix(pub String);

impl UniquenessSource for FixedSuffix {
    fn token(&self) -> String {
        self.0.clone()
    }
}

//
// ─── BUILDER ───────────────────────────────────────────────────────────────────
//

/// Builds the question-generation prompt for a request.
#[derive(Clone)]
pub struct PromptBuilder {
    uniqueness: Arc<dyn UniquenessSource>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(Arc::new(RandomSuffix))
    }
}

impl std::fmt::Debug for PromptBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBuilder").finish_non_exhaustive()
    }
}

impl PromptBuilder {
    #[must_use]
    pub fn new(uniqueness: Arc<dyn UniquenessSource>) -> Self {
        Self { uniqueness }
    }

    /// Topic as embedded in the prompt, with the uniqueness suffix when the
    /// request opted into cache-busting.
    #[must_use]
    pub fn embedded_topic(&self, request: &QuizRequest) -> String {
        if request.cache_bust() {
            format!("{} - {}", request.topic(), self.uniqueness.token())
        } else {
            request.topic().to_string()
        }
    }

    #[must_use]
    pub fn question_prompt(&self, request: &QuizRequest) -> String {
        let topic = self.embedded_topic(request);
        match request.mode() {
            QuizMode::MultipleChoice => multiple_choice_prompt(request, &topic),
            QuizMode::OpenEnded => open_ended_prompt(request, &topic),
        }
    }
}

fn criteria_block(out: &mut String, request: &QuizRequest, topic: &str) {
    let _ = writeln!(out, "- Medical Topic: {topic}");
    if let Some(context) = request.preparation_context() {
        let _ = writeln!(out, "- User's Preparation Goal: {context}");
    }
    let _ = writeln!(
        out,
        "- Preferred Question Style: {}",
        request.question_style().label()
    );
}

fn context_block(out: &mut String, request: &QuizRequest) {
    match request.preparation_context() {
        Some(context) => {
            let _ = writeln!(
                out,
                "The questions should be highly relevant for a medical student preparing for \"{context}\"."
            );
        }
        None => {
            out.push_str("The questions should be of a general nature for the selected topic.\n");
        }
    }
}

fn style_block(out: &mut String, request: &QuizRequest) {
    let _ = writeln!(
        out,
        "Tailor the questions to match the requested style: \"{}\".",
        request.question_style().label()
    );
    for style in QuestionStyle::ALL {
        let _ = writeln!(out, "- If \"{}\": {}", style.label(), style.guidance());
    }
}

fn multiple_choice_prompt(request: &QuizRequest, topic: &str) -> String {
    let count = request.question_count();
    let mut out = String::with_capacity(3000);

    out.push_str(
        "You are an expert medical educator creating a multiple choice quiz for medical students.\n\n",
    );
    let _ = writeln!(
        out,
        "Generate exactly {count} challenging multiple choice questions based on these criteria:\n"
    );
    criteria_block(&mut out, request, topic);

    out.push_str(
        "\nIMPORTANT INSTRUCTIONS:\n\
         1. Each question must have exactly 4 multiple choice options\n\
         2. Only ONE option should be correct\n\
         3. The other 3 options should be plausible but incorrect (good distractors)\n\
         4. Randomize the position of the correct answer across questions\n\
         5. Include clear, concise explanations for why the correct answer is right\n\
         6. Vary difficulty levels appropriately based on the topic\n\
         7. Make questions clinically relevant and educational\n\n",
    );

    context_block(&mut out, request);
    out.push('\n');
    style_block(&mut out, request);

    out.push_str("\nDIFFICULTY GUIDELINES:\n");
    for (difficulty, description) in [
        (
            Difficulty::Beginner,
            "Basic concepts, common conditions, standard treatments",
        ),
        (
            Difficulty::Intermediate,
            "More complex relationships, differential diagnosis, complications",
        ),
        (
            Difficulty::Advanced,
            "Rare conditions, complex cases, latest research findings",
        ),
    ] {
        let _ = writeln!(
            out,
            "- {} ({} points): {}",
            difficulty,
            difficulty.points(),
            description
        );
    }

    out.push_str(
        r#"
Return ONLY a JSON object in this exact format:
{
  "questions": [
    {
      "id": "q1",
      "question": "What is the normal resting heart rate for healthy adults?",
      "options": [
        "40-60 beats per minute",
        "60-100 beats per minute",
        "100-120 beats per minute",
        "120-140 beats per minute"
      ],
      "correctAnswer": 1,
      "explanation": "The normal resting heart rate for healthy adults ranges from 60 to 100 beats per minute.",
      "difficulty": "Beginner",
      "points": 10
    }
  ]
}
"#,
    );
    let _ = write!(
        out,
        "\nGenerate {count} unique, educational, and clinically relevant questions now:"
    );
    out
}

fn open_ended_prompt(request: &QuizRequest, topic: &str) -> String {
    let count = request.question_count();
    let mut out = String::with_capacity(1500);

    out.push_str("You are an expert medical educator creating a personalized quiz.\n\n");
    let _ = writeln!(
        out,
        "Generate a set of {count} challenging study questions based on the following criteria:\n"
    );
    criteria_block(&mut out, request, topic);
    out.push('\n');
    context_block(&mut out, request);
    style_block(&mut out, request);
    out.push_str(
        "Vary the framing of the questions so that no two ask the same thing in the same way.\n\
         Each question must be answerable in a short paragraph. Do not include answers, options or explanations.\n\n\
         Return ONLY a JSON object in this exact format:\n\
         {\"questions\": [\"First question?\", \"Second question?\"]}\n",
    );
    out
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Rubric prompt for one open-ended answer.
#[must_use]
pub fn grading_prompt(question: &str, answer: &str, band: &WordBand) -> String {
    let range = band.describe();
    let mut out = String::with_capacity(1500);
    out.push_str(
        "You are a fair and knowledgeable medical professor grading a student's quiz answer.\n",
    );
    let _ = writeln!(
        out,
        "The student was required to answer in {range}. This is a test of both knowledge and conciseness.\n"
    );
    let _ = writeln!(
        out,
        "Here is the question and the student's answer:\nQuestion: \"{question}\"\nStudent's Answer: \"{answer}\"\n"
    );
    out.push_str(
        "Your task is to:\n\
         1. Evaluate the medical accuracy of the answer. This is the most important factor.\n\
         2. Consider the conciseness. Did the student convey the key information effectively within the word limit?\n\
         3. Provide a score from 0 to 10. A score of 10 represents a perfect, accurate, and concise answer. A score of 0 means the answer is completely incorrect.\n\
         4. Provide constructive feedback that clearly explains the score. If the answer is inaccurate, gently correct the student and explain the correct concepts.\n",
    );
    let _ = writeln!(
        out,
        "5. If the answer is significantly outside the {range} range, penalize the score accordingly and mention this in the feedback."
    );
    out.push_str("\nRespond with a JSON object: {\"score\": <0-10>, \"feedback\": \"<text>\"}.");
    out
}

//
// ─── FEEDBACK ──────────────────────────────────────────────────────────────────
//

/// One question/answer/score line of a completed quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub question: String,
    pub answer: String,
    pub score: u8,
}

/// Summarization prompt for a whole quiz session.
#[must_use]
pub fn feedback_prompt(topic: &str, entries: &[FeedbackEntry]) -> String {
    let mut out = String::with_capacity(2500 + entries.len() * 200);
    let _ = writeln!(
        out,
        "You are a supportive and insightful medical tutor. A student has just completed a quiz on the topic of \"{topic}\".\n\nHere are their results:"
    );
    for entry in entries {
        let _ = writeln!(
            out,
            "- Question: \"{}\"\n  User's Answer: \"{}\"\n  Score: {}/10",
            entry.question, entry.answer, entry.score
        );
    }

    let _ = write!(
        out,
        "\nYour task is to provide comprehensive, personalized feedback and a study guide based on their performance. \
         If the user's answer is \"{}\", it means they did not answer the question. Please acknowledge this in your feedback, \
         especially in the \"{}\" section.\n\n",
        crate::model::SKIPPED_SENTINEL,
        FeedbackSection::ImprovementAreas.heading()
    );
    let _ = writeln!(
        out,
        "1. # {}: Start with an encouraging summary of their overall performance. Calculate the average score and comment on it.\n",
        FeedbackSection::PerformanceSummary.heading()
    );
    let _ = writeln!(
        out,
        "2. # {}: Point out specific questions where the student did well and explain what made their answers strong.\n",
        FeedbackSection::Strengths.heading()
    );
    let _ = writeln!(
        out,
        "3. # {}: Gently identify patterns in the questions where the student struggled (low scores or skipped). \
         Diagnose the underlying knowledge gaps rather than listing wrong answers. Treat skipped questions as a signal of a gap in that area.\n",
        FeedbackSection::ImprovementAreas.heading()
    );
    let _ = writeln!(
        out,
        "4. # {}: Provide actionable, concrete steps based on both incorrect answers and skipped questions.\n   \
         * Suggest 2-3 core concepts they should review.\n   \
         * Recommend specific study strategies.\n   \
         * Frame this as a clear, manageable plan.\n",
        FeedbackSection::StudyPlan.heading()
    );
    out.push_str(
        "Structure your response in clear sections with markdown headings (e.g. \"# Overall Performance Summary\"). \
         Use bullet points to make it easy to read. Your tone should be encouraging and aimed at building confidence.\n\
         Respond with a JSON object: {\"feedback\": \"<markdown text>\"}.",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizRequestDraft, SKIPPED_SENTINEL};

    fn builder() -> PromptBuilder {
        PromptBuilder::new(Arc::new(FixedSuffix("0.42".into())))
    }

    fn mc_request(cache_bust: bool) -> QuizRequest {
        let mut draft = QuizRequestDraft::new("Cardiology", QuizMode::MultipleChoice, 5);
        draft.preparation_context = Some("Board Certification".into());
        draft.question_style = QuestionStyle::CaseBased;
        draft.cache_bust = cache_bust;
        draft.validate().unwrap()
    }

    #[test]
    fn multiple_choice_prompt_embeds_every_field() {
        let prompt = builder().question_prompt(&mc_request(true));
        assert!(prompt.contains("Generate exactly 5 challenging multiple choice questions"));
        assert!(prompt.contains("- Medical Topic: Cardiology - 0.42"));
        assert!(prompt.contains("- User's Preparation Goal: Board Certification"));
        assert!(prompt.contains("- Preferred Question Style: Case-based Scenarios"));
        assert!(prompt.contains("exactly 4 multiple choice options"));
        assert!(prompt.contains("Only ONE option should be correct"));
        assert!(prompt.contains("Beginner (10 points)"));
        assert!(prompt.contains("Intermediate (15 points)"));
        assert!(prompt.contains("Advanced (20 points)"));
    }

    #[test]
    fn cache_bust_can_be_disabled() {
        let prompt = builder().question_prompt(&mc_request(false));
        assert!(prompt.contains("- Medical Topic: Cardiology\n"));
        assert!(!prompt.contains("0.42"));
    }

    #[test]
    fn prompt_is_deterministic_for_fixed_suffix() {
        let request = mc_request(true);
        assert_eq!(
            builder().question_prompt(&request),
            builder().question_prompt(&request)
        );
    }

    #[test]
    fn open_ended_prompt_asks_for_text_only() {
        let request = QuizRequestDraft::new("Neurology", QuizMode::OpenEnded, 7)
            .validate()
            .unwrap();
        let prompt = builder().question_prompt(&request);
        assert!(prompt.contains("Generate a set of 7 challenging study questions"));
        assert!(prompt.contains("general nature"));
        assert!(prompt.contains("Do not include answers, options or explanations"));
        assert!(!prompt.contains("correctAnswer"));
    }

    #[test]
    fn grading_prompt_uses_band() {
        let prompt = grading_prompt("What is MI?", "Heart attack.", &WordBand::default());
        assert!(prompt.contains("25 to 50 words"));
        assert!(prompt.contains("Question: \"What is MI?\""));
        let open = grading_prompt("Q", "A", &WordBand { min: 25, max: None });
        assert!(open.contains("at least 25 words"));
    }

    #[test]
    fn feedback_prompt_lists_results_and_sections() {
        let entries = vec![
            FeedbackEntry {
                question: "Q1".into(),
                answer: "A1".into(),
                score: 7,
            },
            FeedbackEntry {
                question: "Q2".into(),
                answer: SKIPPED_SENTINEL.into(),
                score: 0,
            },
        ];
        let prompt = feedback_prompt("Cardiology", &entries);
        assert!(prompt.contains("Score: 7/10"));
        assert!(prompt.contains("User's Answer: \"[SKIPPED]\""));
        for section in FeedbackSection::ALL {
            assert!(prompt.contains(section.heading()));
        }
        assert!(prompt.contains("2-3 core concepts"));
    }
}
