use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use medquiz_core::Clock;
use medquiz_core::model::{QuizResult, UserId, UserProfile, generate_username};
use rand::Rng;
use storage::repository::{
    MAX_LEADERBOARD_LIMIT, QuizResultRecord, QuizResultRepository, Storage, StorageError,
    UserProfileRepository,
};
use tracing::{debug, error, info, warn};

use crate::error::RecordError;

/// Backoff and timeout applied to each storage write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    /// Upper bound for a single try.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            base_delay: Duration::from_millis(500),
            factor: 1.5,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), with up to 20% jitter.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let base = self.base_delay.mul_f64(self.factor.max(1.0).powi(exp));
        let jitter_ms = u64::try_from(base.as_millis() / 5).unwrap_or(0);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        base + Duration::from_millis(jitter)
    }
}

/// What happened to a completed quiz's result.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded { id: i64, profile: UserProfile },
    /// The session had been stored before; statistics were not touched again.
    AlreadyRecorded { id: i64, profile: UserProfile },
    Failed { reason: String },
}

/// Persists completed quizzes, keeps profile statistics and serves the
/// leaderboard. Writes are best-effort: they are retried and timed out, and
/// failures come back as values.
#[derive(Clone)]
pub struct ResultRecorder {
    clock: Clock,
    profiles: Arc<dyn UserProfileRepository>,
    results: Arc<dyn QuizResultRepository>,
    retry: RetryPolicy,
}

impl ResultRecorder {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn UserProfileRepository>,
        results: Arc<dyn QuizResultRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            results,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.results),
        )
    }

    /// Fetch the user's profile without creating one.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` when storage keeps failing or times out.
    pub async fn profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, RecordError> {
        match self
            .retrying("get_profile", || self.profiles.get_profile(user_id))
            .await
        {
            Ok(profile) => Ok(Some(profile)),
            Err(RecordError::Storage(StorageError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the user's profile, creating one with a generated username on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` when storage keeps failing or times out.
    pub async fn get_or_create_profile(
        &self,
        user_id: &UserId,
        display_name: Option<&str>,
    ) -> Result<UserProfile, RecordError> {
        match self
            .retrying("get_profile", || self.profiles.get_profile(user_id))
            .await
        {
            Ok(profile) => return Ok(profile),
            Err(RecordError::Storage(StorageError::NotFound)) => {}
            Err(e) => return Err(e),
        }

        let username = generate_username(&mut rand::rng());
        let profile = UserProfile::new(
            user_id.clone(),
            username,
            display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            self.clock.now(),
        );

        match self
            .retrying("insert_profile", || self.profiles.insert_profile(&profile))
            .await
        {
            Ok(()) => {
                info!(user = user_id.as_str(), username = %profile.username, "created profile");
                Ok(profile)
            }
            // Created concurrently; read the winner back.
            Err(RecordError::Storage(StorageError::Conflict)) => {
                self.retrying("get_profile", || self.profiles.get_profile(user_id))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Store a completed quiz and update the user's statistics.
    pub async fn record(
        &self,
        user_id: &UserId,
        result: &QuizResult,
        difficulty: &str,
    ) -> RecordOutcome {
        if let Err(e) = self.get_or_create_profile(user_id, None).await {
            error!(user = user_id.as_str(), error = %e, "could not load profile for result");
            return RecordOutcome::Failed {
                reason: e.to_string(),
            };
        }

        let record = QuizResultRecord::from_result(user_id.clone(), result, difficulty);
        match self
            .retrying("record_result", || self.results.record_result(&record))
            .await
        {
            Ok(recorded) if recorded.newly_recorded => {
                info!(
                    user = user_id.as_str(),
                    id = recorded.id,
                    score = record.score,
                    average = recorded.profile.average_rating,
                    "quiz result recorded"
                );
                RecordOutcome::Recorded {
                    id: recorded.id,
                    profile: recorded.profile,
                }
            }
            Ok(recorded) => {
                debug!(id = recorded.id, "quiz result was already recorded");
                RecordOutcome::AlreadyRecorded {
                    id: recorded.id,
                    profile: recorded.profile,
                }
            }
            Err(e) => {
                error!(user = user_id.as_str(), error = %e, "failed to record quiz result");
                RecordOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Top profiles by average rating. `limit` is capped at 100.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` when storage fails.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<UserProfile>, RecordError> {
        let limit = limit.min(MAX_LEADERBOARD_LIMIT);
        self.retrying("leaderboard", || self.profiles.leaderboard(limit))
            .await
    }

    /// Most recent results for one user.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` when storage fails.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizResultRecord>, RecordError> {
        self.retrying("list_results", || {
            self.results.list_results_for_user(user_id, limit)
        })
        .await
    }

    async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, RecordError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut last = RecordError::TimedOut { attempts };

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.retry.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !is_transient(&e) => return Err(e.into()),
                Ok(Err(e)) => {
                    warn!(operation, attempt, error = %e, "storage call failed");
                    last = RecordError::Storage(e);
                }
                Err(_) => {
                    warn!(operation, attempt, "storage call timed out");
                    last = RecordError::TimedOut { attempts: attempt };
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry.delay_for(attempt - 1)).await;
            }
        }
        Err(last)
    }
}

fn is_transient(e: &StorageError) -> bool {
    matches!(e, StorageError::Connection(_))
}
