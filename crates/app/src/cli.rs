use clap::{Args, Parser, Subcommand};
use medquiz_core::model::{QuestionStyle, QuizMode};

pub const DEFAULT_DB_URL: &str = "sqlite://medquiz.sqlite3";

#[derive(Parser, Debug)]
#[command(name = "medquiz", version, about = "AI-generated medical quizzes in the terminal")]
pub struct Cli {
    /// `SQLite` database for profiles and results
    #[arg(long, global = true, env = "MEDQUIZ_DB_URL", default_value = DEFAULT_DB_URL)]
    pub db_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take a quiz
    Quiz(QuizArgs),
    /// Show the top profiles by average score
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Show a profile and its recent results
    Profile {
        #[arg(long, env = "MEDQUIZ_USER", default_value = "local")]
        user: String,
        /// Number of recent results to list
        #[arg(long, default_value_t = 5)]
        history: u32,
    },
}

#[derive(Args, Debug)]
pub struct QuizArgs {
    /// Topic to be quizzed on; prompted for when omitted
    #[arg(long)]
    pub topic: Option<String>,

    /// `mc` or `open`
    #[arg(long, default_value = "mc")]
    pub mode: QuizMode,

    #[arg(long, default_value_t = 10)]
    pub count: u32,

    /// `conceptual`, `factual` or `case`
    #[arg(long, default_value = "conceptual")]
    pub style: QuestionStyle,

    /// What the student is preparing for, e.g. an exam (max 100 characters)
    #[arg(long, value_name = "text")]
    pub context: Option<String>,

    #[arg(long, env = "MEDQUIZ_USER", default_value = "local")]
    pub user: String,

    /// Display name for a newly created profile
    #[arg(long)]
    pub name: Option<String>,

    /// Skip the feedback narrative at the end
    #[arg(long)]
    pub no_feedback: bool,

    /// Do not store the result
    #[arg(long)]
    pub no_record: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn quiz_flags_parse() {
        let cli = Cli::parse_from([
            "medquiz",
            "--db-url",
            "sqlite::memory:",
            "quiz",
            "--topic",
            "Cardiology",
            "--mode",
            "open",
            "--count",
            "5",
            "--style",
            "case",
        ]);
        assert_eq!(cli.db_url, "sqlite::memory:");
        let Command::Quiz(args) = cli.command else {
            panic!("expected quiz subcommand");
        };
        assert_eq!(args.topic.as_deref(), Some("Cardiology"));
        assert_eq!(args.mode, QuizMode::OpenEnded);
        assert_eq!(args.count, 5);
        assert_eq!(args.style, QuestionStyle::CaseBased);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Cli::try_parse_from(["medquiz", "quiz", "--mode", "essay"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
