use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medquiz_core::model::{
    AnswerOutcome, AnsweredQuestion, QuizMode, QuizResult, SessionId, UserId, UserProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Highest leaderboard size a caller may request.
pub const MAX_LEADERBOARD_LIMIT: u32 = 100;

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Per-question line of a stored quiz result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAnswer {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    pub score: u32,
    pub correct: bool,
    pub skipped: bool,
}

impl StoredAnswer {
    #[must_use]
    pub fn from_answered(answered: &AnsweredQuestion) -> Self {
        let answer = match answered.outcome() {
            AnswerOutcome::Choice {
                selected: Some(i), ..
            } => i.to_string(),
            _ => answered.answer_text(None),
        };
        Self {
            question_id: answered.question_id().as_str().to_owned(),
            question: answered.question().to_owned(),
            answer,
            score: answered.points(),
            correct: answered.is_correct(),
            skipped: answered.is_skipped(),
        }
    }
}

/// Persisted shape of a completed quiz, owned by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizResultRecord {
    pub id: Option<i64>,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub mode: QuizMode,
    pub category: String,
    /// Preparation context, or "General" when none was given.
    pub difficulty: String,
    pub score: u32,
    pub total_points: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub skipped: u32,
    pub time_spent_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub answers: Vec<StoredAnswer>,
}

impl QuizResultRecord {
    #[must_use]
    pub fn from_result(
        user_id: UserId,
        result: &QuizResult,
        difficulty: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            session_id: result.session_id(),
            mode: result.mode(),
            category: result.topic().to_owned(),
            difficulty: difficulty.into(),
            score: result.score(),
            total_points: result.total_points(),
            total_questions: result.total_questions(),
            correct_answers: result.correct_answers(),
            skipped: result.skipped(),
            time_spent_secs: result.elapsed_secs(),
            started_at: result.started_at(),
            completed_at: result.completed_at(),
            answers: result.answers().iter().map(StoredAnswer::from_answered).collect(),
        }
    }
}

/// Outcome of `record_result`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResult {
    pub id: i64,
    /// False when the session had already been recorded; profile statistics
    /// were left untouched in that case.
    pub newly_recorded: bool,
    pub profile: UserProfile,
}

//
// ─── TRAITS ────────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    /// Fetch a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_profile(&self, user_id: &UserId) -> Result<UserProfile, StorageError>;

    /// Insert a new profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has a profile.
    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), StorageError>;

    /// Profiles ordered by average rating, best first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<UserProfile>, StorageError>;
}

#[async_trait]
pub trait QuizResultRepository: Send + Sync {
    /// Store a completed quiz and fold its score into the owner's profile
    /// statistics, atomically. Recording the same session twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no profile, or other
    /// storage errors.
    async fn record_result(
        &self,
        record: &QuizResultRecord,
    ) -> Result<RecordedResult, StorageError>;

    /// Most recent results for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_results_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizResultRecord>, StorageError>;
}

/// Sort profiles for the leaderboard: rating desc, then more quizzes, then id.
pub(crate) fn rank_profiles(profiles: &mut [UserProfile]) {
    profiles.sort_by(|a, b| {
        b.average_rating
            .total_cmp(&a.average_rating)
            .then_with(|| b.quiz_count.cmp(&a.quiz_count))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

//
// ─── IN MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    profiles: HashMap<UserId, UserProfile>,
    results: Vec<QuizResultRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<UserProfile, StorageError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .profiles
            .get(user_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.profiles.contains_key(&profile.user_id) {
            return Err(StorageError::Conflict);
        }
        guard
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<UserProfile>, StorageError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut profiles: Vec<UserProfile> = guard.profiles.values().cloned().collect();
        rank_profiles(&mut profiles);
        profiles.truncate(usize::try_from(limit.min(MAX_LEADERBOARD_LIMIT)).unwrap_or(usize::MAX));
        Ok(profiles)
    }
}

#[async_trait]
impl QuizResultRepository for InMemoryRepository {
    async fn record_result(
        &self,
        record: &QuizResultRecord,
    ) -> Result<RecordedResult, StorageError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if let Some(pos) = guard
            .results
            .iter()
            .position(|r| r.session_id == record.session_id)
        {
            let profile = guard
                .profiles
                .get(&record.user_id)
                .cloned()
                .ok_or(StorageError::NotFound)?;
            return Ok(RecordedResult {
                id: i64::try_from(pos + 1).unwrap_or(i64::MAX),
                newly_recorded: false,
                profile,
            });
        }

        let profile = guard
            .profiles
            .get_mut(&record.user_id)
            .ok_or(StorageError::NotFound)?;
        profile.record_quiz(record.score);
        let profile = profile.clone();

        let id = i64::try_from(guard.results.len() + 1).unwrap_or(i64::MAX);
        let mut stored = record.clone();
        stored.id = Some(id);
        guard.results.push(stored);

        Ok(RecordedResult {
            id,
            newly_recorded: true,
            profile,
        })
    }

    async fn list_results_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizResultRecord>, StorageError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .results
            .iter()
            .rev()
            .filter(|r| &r.user_id == user_id)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

/// Aggregates profile and result repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn UserProfileRepository>,
    pub results: Arc<dyn QuizResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let profiles: Arc<dyn UserProfileRepository> = Arc::new(repo.clone());
        let results: Arc<dyn QuizResultRepository> = Arc::new(repo);
        Self { profiles, results }
    }
}
