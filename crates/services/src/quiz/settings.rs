use medquiz_core::model::{QuestionStyle, QuizMode, QuizRequestDraft};

/// Choices collected on the pre-quiz settings step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    pub mode: QuizMode,
    pub question_style: QuestionStyle,
    pub question_count: u32,
    pub preparation_context: Option<String>,
    pub cache_bust: bool,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            mode: QuizMode::MultipleChoice,
            question_style: QuestionStyle::default(),
            question_count: 10,
            preparation_context: None,
            cache_bust: true,
        }
    }
}

impl QuizSettings {
    /// Question counts offered by the settings step.
    pub const COUNT_CHOICES: [u32; 4] = [5, 10, 15, 20];

    #[must_use]
    pub fn into_draft(self, topic: impl Into<String>) -> QuizRequestDraft {
        QuizRequestDraft {
            topic: topic.into(),
            preparation_context: self.preparation_context,
            question_style: self.question_style,
            question_count: self.question_count,
            mode: self.mode,
            cache_bust: self.cache_bust,
        }
    }
}
