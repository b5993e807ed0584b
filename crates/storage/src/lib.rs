#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, MAX_LEADERBOARD_LIMIT, QuizResultRecord, QuizResultRepository,
    RecordedResult, Storage, StorageError, StoredAnswer, UserProfileRepository,
};
pub use sqlite::{SqliteInitError, SqlitePoolConfig, SqliteRepository};
