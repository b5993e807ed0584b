use medquiz_core::model::{QuizMode, SessionId, UserId, UserProfile};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::{QuizResultRecord, StorageError, StoredAnswer};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn mode_to_str(mode: QuizMode) -> &'static str {
    match mode {
        QuizMode::MultipleChoice => "multiple_choice",
        QuizMode::OpenEnded => "open_ended",
    }
}

pub(crate) fn parse_mode(s: &str) -> Result<QuizMode, StorageError> {
    match s {
        "multiple_choice" => Ok(QuizMode::MultipleChoice),
        "open_ended" => Ok(QuizMode::OpenEnded),
        _ => Err(StorageError::Serialization(format!("invalid mode: {s}"))),
    }
}

pub(crate) fn session_id_to_string(id: SessionId) -> String {
    id.value().to_string()
}

fn parse_session_id(s: &str) -> Result<SessionId, StorageError> {
    Uuid::parse_str(s).map(SessionId::from_uuid).map_err(ser)
}

pub(crate) fn map_profile_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let mut profile = UserProfile::new(
        UserId::new(user_id),
        row.try_get::<String, _>("username").map_err(ser)?,
        row.try_get::<Option<String>, _>("display_name").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    );
    profile.quiz_count = u32_from_i64(
        "quiz_count",
        row.try_get::<i64, _>("quiz_count").map_err(ser)?,
    )?;
    profile.total_score = u64_from_i64(
        "total_score",
        row.try_get::<i64, _>("total_score").map_err(ser)?,
    )?;
    profile.average_rating = row.try_get("average_rating").map_err(ser)?;
    Ok(profile)
}

pub(crate) fn map_result_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuizResultRecord, StorageError> {
    let mode_str: String = row.try_get("mode").map_err(ser)?;
    let session_str: String = row.try_get("session_id").map_err(ser)?;
    let answers_json: String = row.try_get("answers_json").map_err(ser)?;
    let answers: Vec<StoredAnswer> = serde_json::from_str(&answers_json).map_err(ser)?;

    Ok(QuizResultRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        session_id: parse_session_id(&session_str)?,
        mode: parse_mode(&mode_str)?,
        category: row.try_get("category").map_err(ser)?,
        difficulty: row.try_get("difficulty").map_err(ser)?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        total_points: u32_from_i64(
            "total_points",
            row.try_get::<i64, _>("total_points").map_err(ser)?,
        )?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        skipped: u32_from_i64("skipped", row.try_get::<i64, _>("skipped").map_err(ser)?)?,
        time_spent_secs: u64_from_i64(
            "time_spent_secs",
            row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
        )?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        answers,
    })
}
