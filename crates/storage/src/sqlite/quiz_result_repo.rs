use medquiz_core::model::UserId;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, i64_from_u64, map_profile_row, map_result_row, mode_to_str, ser,
    session_id_to_string,
};
use crate::repository::{QuizResultRecord, QuizResultRepository, RecordedResult, StorageError};

#[async_trait::async_trait]
impl QuizResultRepository for SqliteRepository {
    async fn record_result(
        &self,
        record: &QuizResultRecord,
    ) -> Result<RecordedResult, StorageError> {
        let session_id = session_id_to_string(record.session_id);
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing = sqlx::query("SELECT id FROM quiz_results WHERE session_id = ?1")
            .bind(&session_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;

        let (id, newly_recorded) = if let Some(row) = existing {
            (row.try_get::<i64, _>("id").map_err(ser)?, false)
        } else {
            let answers_json = serde_json::to_string(&record.answers).map_err(ser)?;
            let updated = sqlx::query(
                r"
                    UPDATE user_profiles
                    SET quiz_count = quiz_count + 1,
                        total_score = total_score + ?2,
                        average_rating = CAST(total_score + ?2 AS REAL) / (quiz_count + 1)
                    WHERE user_id = ?1
                ",
            )
            .bind(record.user_id.as_str())
            .bind(i64::from(record.score))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            if updated.rows_affected() == 0 {
                return Err(StorageError::NotFound);
            }

            let res = sqlx::query(
                r"
                    INSERT INTO quiz_results (
                        session_id, user_id, mode, category, difficulty,
                        score, total_points, total_questions, correct_answers, skipped,
                        time_spent_secs, started_at, completed_at, answers_json
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ",
            )
            .bind(&session_id)
            .bind(record.user_id.as_str())
            .bind(mode_to_str(record.mode))
            .bind(&record.category)
            .bind(&record.difficulty)
            .bind(i64::from(record.score))
            .bind(i64::from(record.total_points))
            .bind(i64::from(record.total_questions))
            .bind(i64::from(record.correct_answers))
            .bind(i64::from(record.skipped))
            .bind(i64_from_u64("time_spent_secs", record.time_spent_secs)?)
            .bind(record.started_at)
            .bind(record.completed_at)
            .bind(answers_json)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            (res.last_insert_rowid(), true)
        };

        let profile_row = sqlx::query(
            r"
                SELECT user_id, username, display_name, created_at,
                       quiz_count, total_score, average_rating
                FROM user_profiles
                WHERE user_id = ?1
            ",
        )
        .bind(record.user_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
        let profile = map_profile_row(&profile_row)?;

        tx.commit().await.map_err(conn)?;

        Ok(RecordedResult {
            id,
            newly_recorded,
            profile,
        })
    }

    async fn list_results_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizResultRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, user_id, mode, category, difficulty,
                    score, total_points, total_questions, correct_answers, skipped,
                    time_spent_secs, started_at, completed_at, answers_json
                FROM quiz_results
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }
}
