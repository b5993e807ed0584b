use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use medquiz_core::model::UserId;
use services::{AiConfig, AppServices, Clock, RecordOutcome, ResultRecorder, load_dotenv};
use storage::repository::Storage;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod console;

use cli::{Cli, Command, QuizArgs};
use console::Console;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its parent directory so the pool can open it.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database url: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}

async fn open_storage(db_url: &str) -> Result<Storage> {
    debug!(db_url, "opening storage");
    prepare_sqlite_file(db_url)?;
    Storage::sqlite(db_url)
        .await
        .with_context(|| format!("opening {db_url}"))
}

async fn run_quiz(db_url: &str, args: QuizArgs) -> Result<()> {
    let config = AiConfig::from_env().context("GEMINI_API_KEY must be set to generate quizzes")?;
    debug!(db_url, models = ?config.models, "starting quiz");
    prepare_sqlite_file(db_url)?;
    let app = AppServices::new_sqlite(db_url, config, Clock::system()).await?;

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());
    let topic = match args.topic {
        Some(topic) => topic,
        None => console.ask_topic()?,
    };

    let settings = services::QuizSettings {
        mode: args.mode,
        question_style: args.style,
        question_count: args.count,
        preparation_context: args.context,
        ..app.default_settings()
    };

    let mut quiz = app.new_controller();
    console.run_quiz(&mut quiz, &topic, settings).await?;

    let Some(result) = quiz.result().cloned() else {
        bail!("quiz ended without a result");
    };
    console.show_result(&result)?;

    if !args.no_feedback && console.confirm("\nGenerate personalised feedback? [Y/n] ")? {
        let report = quiz.finish_feedback().await?;
        console.show_feedback(report)?;
    }

    if args.no_record {
        return Ok(());
    }
    let user = UserId::new(args.user);
    let recorder = app.recorder();
    recorder
        .get_or_create_profile(&user, args.name.as_deref())
        .await?;
    let difficulty = quiz
        .request()
        .map_or("General", |request| request.difficulty_label())
        .to_string();
    match recorder.record(&user, &result, &difficulty).await {
        RecordOutcome::Recorded { profile, .. }
        | RecordOutcome::AlreadyRecorded { profile, .. } => {
            console.show_profile(&profile)?;
        }
        RecordOutcome::Failed { reason } => {
            eprintln!("result was not saved: {reason}");
        }
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let db_url = normalize_sqlite_url(&cli.db_url);

    match cli.command {
        Command::Quiz(args) => run_quiz(&db_url, args).await,
        Command::Leaderboard { limit } => {
            let storage = open_storage(&db_url).await?;
            let recorder = ResultRecorder::from_storage(Clock::system(), &storage);
            let profiles = recorder.leaderboard(limit).await?;
            Console::new(io::empty(), io::stdout()).show_leaderboard(&profiles)
        }
        Command::Profile { user, history } => {
            let storage = open_storage(&db_url).await?;
            let recorder = ResultRecorder::from_storage(Clock::system(), &storage);
            let user = UserId::new(user);
            let Some(profile) = recorder.profile(&user).await? else {
                bail!("no profile for user {}", user.as_str());
            };
            let records = recorder.history(&user, history).await?;
            let mut console = Console::new(io::empty(), io::stdout());
            console.show_profile(&profile)?;
            console.show_history(&records)
        }
    }
}

#[tokio::main]
async fn main() {
    // Before tracing so RUST_LOG can come from .env.
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}
