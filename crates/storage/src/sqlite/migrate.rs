use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnection;

use super::SqliteInitError;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[
        r"
        CREATE TABLE IF NOT EXISTS user_profiles (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            display_name TEXT,
            created_at TEXT NOT NULL,
            quiz_count INTEGER NOT NULL DEFAULT 0 CHECK (quiz_count >= 0),
            total_score INTEGER NOT NULL DEFAULT 0 CHECK (total_score >= 0),
            average_rating REAL NOT NULL DEFAULT 0
        );
        ",
        r"
        CREATE TABLE IF NOT EXISTS quiz_results (
            id INTEGER PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            category TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            score INTEGER NOT NULL CHECK (score >= 0),
            total_points INTEGER NOT NULL CHECK (total_points >= 0),
            total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
            correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
            skipped INTEGER NOT NULL CHECK (skipped >= 0),
            time_spent_secs INTEGER NOT NULL CHECK (time_spent_secs >= 0),
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            answers_json TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES user_profiles(user_id) ON DELETE CASCADE
        );
        ",
        r"
        CREATE INDEX IF NOT EXISTS idx_quiz_results_user_completed
            ON quiz_results (user_id, completed_at);
        ",
        r"
        CREATE INDEX IF NOT EXISTS idx_user_profiles_rating
            ON user_profiles (average_rating DESC);
        ",
    ],
}];

async fn applied_versions(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await
}

async fn apply(conn: &mut SqliteConnection, migration: &Migration) -> Result<(), sqlx::Error> {
    for statement in migration.statements {
        sqlx::query(*statement).execute(&mut *conn).await?;
    }
    sqlx::query(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)
         ON CONFLICT(version) DO NOTHING",
    )
    .bind(migration.version)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Apply every migration newer than what the database has recorded, each in
/// its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let applied = applied_versions(pool).await?;
    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        let mut tx = pool.begin().await?;
        apply(&mut tx, migration).await?;
        tx.commit().await?;
    }
    Ok(())
}
