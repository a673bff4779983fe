use sqlx::Row;

use lunora_core::model::SessionId;

use crate::repository::{SessionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn session_id_from_text(s: &str) -> Result<SessionId, StorageError> {
    s.parse::<SessionId>().map_err(ser)
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let id = session_id_from_text(&row.try_get::<String, _>("id").map_err(ser)?)?;

    let questions =
        serde_json::from_str(&row.try_get::<String, _>("questions").map_err(ser)?).map_err(ser)?;
    let subtopics =
        serde_json::from_str(&row.try_get::<String, _>("subtopics").map_err(ser)?).map_err(ser)?;
    let attempts =
        serde_json::from_str(&row.try_get::<String, _>("attempts").map_err(ser)?).map_err(ser)?;

    let completed_questions = u32_from_i64(
        "completed_questions",
        row.try_get::<i64, _>("completed_questions").map_err(ser)?,
    )?;
    let correct_answers = u32_from_i64(
        "correct_answers",
        row.try_get::<i64, _>("correct_answers").map_err(ser)?,
    )?;

    Ok(SessionRecord {
        id,
        user_id: row.try_get("user_id").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        questions,
        completed_questions,
        correct_answers,
        subtopics,
        attempts,
        is_completed: row.try_get("is_completed").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
        last_attempted_at: row.try_get("last_attempted_at").map_err(ser)?,
    })
}

/// Serialize the record's nested collections for the JSON text columns.
pub(crate) fn encode_json_columns(
    record: &SessionRecord,
) -> Result<(String, String, String), StorageError> {
    let questions = serde_json::to_string(&record.questions).map_err(ser)?;
    let subtopics = serde_json::to_string(&record.subtopics).map_err(ser)?;
    let attempts = serde_json::to_string(&record.attempts).map_err(ser)?;
    Ok((questions, subtopics, attempts))
}
