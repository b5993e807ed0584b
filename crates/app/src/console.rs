use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use medquiz_core::model::{
    AnswerOutcome, FeedbackReport, FeedbackSection, MultipleChoiceQuestion, OpenEndedQuestion,
    QuizResult, SUGGESTED_TOPICS, UserProfile,
};
use services::{ControllerError, CurrentQuestion, QuizController, QuizPhase, QuizSettings};
use storage::repository::QuizResultRecord;

const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Line-oriented terminal front end for a `QuizController`.
pub struct Console<R, W> {
    input: R,
    output: W,
}

enum Pending {
    Choice(MultipleChoiceQuestion),
    Open(OpenEndedQuestion),
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// `None` on end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn require_line(&mut self, prompt: &str) -> Result<String> {
        self.read_line(prompt)?.context("input closed")
    }

    pub fn ask_topic(&mut self) -> Result<String> {
        writeln!(self.output, "Suggested topics:")?;
        for (i, topic) in SUGGESTED_TOPICS.iter().enumerate() {
            writeln!(self.output, "  {}. {topic}", i + 1)?;
        }
        loop {
            let line = self.require_line("Topic (number or your own): ")?;
            if let Ok(n) = line.parse::<usize>() {
                if let Some(topic) = n.checked_sub(1).and_then(|i| SUGGESTED_TOPICS.get(i)) {
                    return Ok((*topic).to_string());
                }
            }
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }

    pub fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let line = self.read_line(prompt)?.unwrap_or_default();
        Ok(!matches!(line.to_ascii_lowercase().as_str(), "n" | "no"))
    }

    /// Select the topic, load questions and answer them until the session is
    /// finished.
    pub async fn run_quiz(
        &mut self,
        quiz: &mut QuizController,
        topic: &str,
        settings: QuizSettings,
    ) -> Result<()> {
        quiz.select_topic(topic)?;
        writeln!(
            self.output,
            "Generating {} {} questions on {topic}...",
            settings.question_count, settings.mode
        )?;
        if quiz.start(settings).await? == QuizPhase::Error {
            bail!(
                "{}",
                quiz.error_message().unwrap_or("could not generate questions")
            );
        }

        while let Some(pending) = next_question(quiz) {
            if let Some(progress) = quiz.progress() {
                writeln!(
                    self.output,
                    "\nQuestion {} of {}",
                    progress.answered + 1,
                    progress.total
                )?;
            }
            match pending {
                Pending::Choice(q) => self.ask_choice(quiz, &q)?,
                Pending::Open(q) => self.ask_open(quiz, &q).await?,
            }
        }
        Ok(())
    }

    fn ask_choice(&mut self, quiz: &mut QuizController, q: &MultipleChoiceQuestion) -> Result<()> {
        writeln!(self.output, "{} [{}]", q.text(), q.difficulty())?;
        for (label, option) in OPTION_LABELS.iter().zip(q.options()) {
            writeln!(self.output, "  {label}) {option}")?;
        }
        let step = loop {
            let line = self.read_line("Answer (A-D, s to skip): ")?;
            match line.as_deref() {
                None | Some("s" | "S") => break quiz.skip()?,
                Some(raw) => match parse_choice(raw) {
                    Some(index) => break quiz.choose_option(index)?,
                    None => writeln!(self.output, "Please enter A, B, C or D.")?,
                },
            }
        };

        if let AnswerOutcome::Choice { selected, correct, .. } = step.answered.outcome() {
            let verdict = match (selected, correct) {
                (None, _) => "Skipped.",
                (Some(_), true) => "Correct!",
                (Some(_), false) => "Incorrect.",
            };
            writeln!(
                self.output,
                "{verdict} The answer is {}) {}",
                OPTION_LABELS[q.correct_index()],
                q.correct_option()
            )?;
            writeln!(self.output, "{}", q.explanation())?;
        }
        Ok(())
    }

    async fn ask_open(&mut self, quiz: &mut QuizController, q: &OpenEndedQuestion) -> Result<()> {
        writeln!(self.output, "{}", q.text())?;
        loop {
            let line = self.read_line("Your answer (s to skip): ")?;
            let step = match line.as_deref() {
                None | Some("s" | "S") => quiz.skip()?,
                Some(text) => match quiz.submit_answer(text).await {
                    Ok(step) => step,
                    Err(ControllerError::Validation(e)) => {
                        writeln!(self.output, "{e}")?;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
            };
            if let AnswerOutcome::Open { answer, score, feedback } = step.answered.outcome() {
                if answer.is_skipped() {
                    writeln!(self.output, "Skipped.")?;
                } else {
                    writeln!(self.output, "Score: {score}/10\n{feedback}")?;
                }
            }
            return Ok(());
        }
    }

    pub fn show_result(&mut self, result: &QuizResult) -> Result<()> {
        writeln!(self.output, "\n=== {} ===", result.topic())?;
        writeln!(
            self.output,
            "Score: {}/{} ({}%)",
            result.score(),
            result.total_points(),
            result.percentage()
        )?;
        writeln!(
            self.output,
            "Correct: {} of {}, skipped: {}, time: {}s",
            result.correct_answers(),
            result.total_questions(),
            result.skipped(),
            result.elapsed_secs()
        )?;
        Ok(())
    }

    /// Print the report section by section when every heading was found,
    /// otherwise the raw narrative.
    pub fn show_feedback(&mut self, report: &FeedbackReport) -> Result<()> {
        if report.is_fallback() || !report.missing_sections().is_empty() {
            writeln!(self.output, "\n{}", report.narrative())?;
            return Ok(());
        }
        for section in FeedbackSection::ALL {
            let body = report.section(section).unwrap_or_default();
            writeln!(self.output, "\n== {} ==\n{body}", section.heading())?;
        }
        Ok(())
    }

    pub fn show_profile(&mut self, profile: &UserProfile) -> Result<()> {
        let name = profile.display_name.as_deref().unwrap_or(&profile.username);
        writeln!(
            self.output,
            "{name} ({}): {} quizzes, {} points, average {:.1}",
            profile.user_id.as_str(),
            profile.quiz_count,
            profile.total_score,
            profile.average_rating
        )?;
        Ok(())
    }

    pub fn show_leaderboard(&mut self, profiles: &[UserProfile]) -> Result<()> {
        if profiles.is_empty() {
            writeln!(self.output, "No results recorded yet.")?;
        }
        for (rank, profile) in profiles.iter().enumerate() {
            write!(self.output, "{:>3}. ", rank + 1)?;
            self.show_profile(profile)?;
        }
        Ok(())
    }

    pub fn show_history(&mut self, records: &[QuizResultRecord]) -> Result<()> {
        for record in records {
            writeln!(
                self.output,
                "  {}  {:<24} {:>4}/{:<4} {}",
                record.completed_at.format("%Y-%m-%d %H:%M"),
                record.category,
                record.score,
                record.total_points,
                record.mode
            )?;
        }
        Ok(())
    }
}

fn next_question(quiz: &QuizController) -> Option<Pending> {
    match quiz.current_question()? {
        CurrentQuestion::MultipleChoice(q) => Some(Pending::Choice(q.clone())),
        CurrentQuestion::OpenEnded(q) => Some(Pending::Open(q.clone())),
    }
}

/// Accepts a letter `A`-`D` or a number `1`-`4`.
fn parse_choice(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<usize>() {
        return (1..=OPTION_LABELS.len()).contains(&n).then(|| n - 1);
    }
    let mut chars = raw.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() {
        return None;
    }
    OPTION_LABELS.iter().position(|l| *l == letter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_accept_letters_and_numbers() {
        assert_eq!(parse_choice("a"), Some(0));
        assert_eq!(parse_choice(" D "), Some(3));
        assert_eq!(parse_choice("2"), Some(1));
        assert_eq!(parse_choice("5"), None);
        assert_eq!(parse_choice("0"), None);
        assert_eq!(parse_choice("ab"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn topic_accepts_number_or_free_text() {
        let mut console = Console::new(&b"\n3\n"[..], Vec::new());
        assert_eq!(console.ask_topic().unwrap(), "Dermatology");

        let mut console = Console::new(&b"Nephrology\n"[..], Vec::new());
        assert_eq!(console.ask_topic().unwrap(), "Nephrology");
    }

    #[test]
    fn feedback_renders_sections_or_raw_narrative() {
        let report = FeedbackReport::from_narrative(
            "# Overall Performance Summary\nGood.\n# Strengths\nValves.\n\
             # Areas for Improvement\nRhythms.\n# Your Personalized Study Plan\nECGs.",
        );
        let mut console = Console::new(&b""[..], Vec::new());
        console.show_feedback(&report).unwrap();
        let out = String::from_utf8(console.output).unwrap();
        assert!(out.contains("== Strengths ==\nValves."));
        assert!(out.contains("== Your Personalized Study Plan ==\nECGs."));

        let mut console = Console::new(&b""[..], Vec::new());
        console
            .show_feedback(&FeedbackReport::from_narrative("Great job overall."))
            .unwrap();
        let out = String::from_utf8(console.output).unwrap();
        assert_eq!(out, "\nGreat job overall.\n");
    }

    #[test]
    fn confirm_defaults_to_yes() {
        let mut console = Console::new(&b"\nno\n"[..], Vec::new());
        assert!(console.confirm("? ").unwrap());
        assert!(!console.confirm("? ").unwrap());
        assert!(console.confirm("? ").unwrap());
    }
}
