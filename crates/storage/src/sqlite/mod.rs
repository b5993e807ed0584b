use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{QuizResultRepository, Storage, UserProfileRepository};

mod mapping;
mod migrate;
mod profile_repo;
mod quiz_result_repo;

/// Applied to every pooled connection. WAL lets the leaderboard read while a
/// result transaction is open.
const CONNECTION_PRAGMAS: [&str; 3] = [
    "PRAGMA foreign_keys = ON;",
    "PRAGMA journal_mode = WAL;",
    "PRAGMA busy_timeout = 5000;",
];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("not a sqlite database url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pool sizing for the quiz database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlitePoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Profiles and quiz results in one `SQLite` database.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect with the default pool configuration.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` for a non-sqlite URL, or when a connection or
    /// its pragmas fail.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, SqlitePoolConfig::default()).await
    }

    /// # Errors
    ///
    /// See [`SqliteRepository::connect`].
    pub async fn connect_with(
        database_url: &str,
        config: SqlitePoolConfig,
    ) -> Result<Self, SqliteInitError> {
        if !database_url.starts_with("sqlite:") {
            return Err(SqliteInitError::InvalidUrl(database_url.to_string()));
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    for pragma in CONNECTION_PRAGMAS {
                        sqlx::query(pragma).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the quiz schema up to date.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Split one connected, migrated repository into the `Storage` handles.
    #[must_use]
    pub fn into_storage(self) -> Storage {
        let profiles: Arc<dyn UserProfileRepository> = Arc::new(self.clone());
        let results: Arc<dyn QuizResultRepository> = Arc::new(self);
        Storage { profiles, results }
    }
}

impl Storage {
    /// Connect, migrate and wrap a `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo.into_storage())
    }
}
