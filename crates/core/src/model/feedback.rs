use serde::Serialize;
use std::collections::BTreeMap;

/// Sections the feedback narrative is asked to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FeedbackSection {
    PerformanceSummary,
    Strengths,
    ImprovementAreas,
    StudyPlan,
}

impl FeedbackSection {
    pub const ALL: [FeedbackSection; 4] = [
        Self::PerformanceSummary,
        Self::Strengths,
        Self::ImprovementAreas,
        Self::StudyPlan,
    ];

    /// Heading the feedback prompt asks the model to use.
    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            FeedbackSection::PerformanceSummary => "Overall Performance Summary",
            FeedbackSection::Strengths => "Strengths",
            FeedbackSection::ImprovementAreas => "Areas for Improvement",
            FeedbackSection::StudyPlan => "Your Personalized Study Plan",
        }
    }

    fn recognize(heading: &str) -> Option<Self> {
        let h = heading.to_ascii_lowercase();
        if h.contains("overall performance") || h.contains("performance summary") {
            Some(Self::PerformanceSummary)
        } else if h.contains("strength") {
            Some(Self::Strengths)
        } else if h.contains("improvement") {
            Some(Self::ImprovementAreas)
        } else if h.contains("study plan") {
            Some(Self::StudyPlan)
        } else {
            None
        }
    }
}

/// Narrative produced once per completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackReport {
    narrative: String,
    sections: BTreeMap<FeedbackSection, String>,
    is_fallback: bool,
}

impl FeedbackReport {
    /// Parse a model narrative, splitting it on recognised markdown headings.
    #[must_use]
    pub fn from_narrative(narrative: impl Into<String>) -> Self {
        let narrative = narrative.into();
        let sections = split_sections(&narrative);
        Self {
            narrative,
            sections,
            is_fallback: false,
        }
    }

    /// Placeholder report used when synthesis fails.
    #[must_use]
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            narrative: message.into(),
            sections: BTreeMap::new(),
            is_fallback: true,
        }
    }

    #[must_use]
    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    #[must_use]
    pub fn section(&self, section: FeedbackSection) -> Option<&str> {
        self.sections.get(&section).map(String::as_str)
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// Sections the narrative did not contain.
    #[must_use]
    pub fn missing_sections(&self) -> Vec<FeedbackSection> {
        FeedbackSection::ALL
            .into_iter()
            .filter(|s| !self.sections.contains_key(s))
            .collect()
    }
}

// Accepts "# Strengths", "## Strengths:", "**# Strengths:**" and "2. **# Strengths**".
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line
        .trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ');
    let trimmed = trimmed.trim_start_matches('*').trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    Some(
        trimmed
            .trim_start_matches('#')
            .trim()
            .trim_end_matches('*')
            .trim_end_matches(':')
            .trim(),
    )
}

fn split_sections(narrative: &str) -> BTreeMap<FeedbackSection, String> {
    let mut sections: BTreeMap<FeedbackSection, String> = BTreeMap::new();
    let mut current: Option<FeedbackSection> = None;

    for line in narrative.lines() {
        if let Some(section) = heading_text(line).and_then(FeedbackSection::recognize) {
            current = Some(section);
            sections.entry(section).or_default();
            continue;
        }
        if let Some(section) = current {
            let body = sections.entry(section).or_default();
            body.push_str(line);
            body.push('\n');
        }
    }

    for body in sections.values_mut() {
        *body = body.trim().to_string();
    }
    sections
}
