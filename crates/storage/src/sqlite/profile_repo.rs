use medquiz_core::model::{UserId, UserProfile};

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, map_profile_row};
use crate::repository::{MAX_LEADERBOARD_LIMIT, StorageError, UserProfileRepository};

const PROFILE_COLUMNS: &str =
    "user_id, username, display_name, created_at, quiz_count, total_score, average_rating";

#[async_trait::async_trait]
impl UserProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<UserProfile, StorageError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        map_profile_row(&row)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO user_profiles (
                    user_id, username, display_name, created_at,
                    quiz_count, total_score, average_rating
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(profile.user_id.as_str())
        .bind(&profile.username)
        .bind(profile.display_name.as_deref())
        .bind(profile.created_at)
        .bind(i64::from(profile.quiz_count))
        .bind(i64_from_u64("total_score", profile.total_score)?)
        .bind(profile.average_rating)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<UserProfile>, StorageError> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles \
             ORDER BY average_rating DESC, quiz_count DESC, user_id ASC LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit.min(MAX_LEADERBOARD_LIMIT)))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_profile_row(&row)?);
        }
        Ok(out)
    }
}
