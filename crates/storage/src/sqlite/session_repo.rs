use lunora_core::model::{SessionId, UserId};

use super::SqliteSessionStore;
use super::mapping::{encode_json_columns, map_session_row};
use crate::repository::{SessionRecord, SessionStore, StorageError};

const SESSION_COLUMNS: &str = r"
    id, user_id, subject, topic, content,
    questions, subtopics, attempts,
    completed_questions, correct_answers, is_completed,
    created_at, updated_at, last_attempted_at
";

#[async_trait::async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_id = ?1
             ORDER BY updated_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn list_for_subject(
        &self,
        user_id: &UserId,
        subject: &str,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_id = ?1 AND subject = ?2
             ORDER BY updated_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(subject)
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let (questions, subtopics, attempts) = encode_json_columns(record)?;

        sqlx::query(
            r"
                INSERT INTO sessions (
                    id, user_id, subject, topic, content,
                    questions, subtopics, attempts,
                    completed_questions, correct_answers, is_completed,
                    created_at, updated_at, last_attempted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    subject = excluded.subject,
                    topic = excluded.topic,
                    content = excluded.content,
                    questions = excluded.questions,
                    subtopics = excluded.subtopics,
                    attempts = excluded.attempts,
                    completed_questions = excluded.completed_questions,
                    correct_answers = excluded.correct_answers,
                    is_completed = excluded.is_completed,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    last_attempted_at = excluded.last_attempted_at
            ",
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(&record.subject)
        .bind(&record.topic)
        .bind(&record.content)
        .bind(questions)
        .bind(subtopics)
        .bind(attempts)
        .bind(i64::from(record.completed_questions))
        .bind(i64::from(record.correct_answers))
        .bind(record.is_completed)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.last_attempted_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_for_subject(
        &self,
        user_id: &UserId,
        subject: &str,
    ) -> Result<u64, StorageError> {
        // single statement, so the batch removal is atomic
        let res = sqlx::query("DELETE FROM sessions WHERE user_id = ?1 AND subject = ?2")
            .bind(user_id.as_str())
            .bind(subject)
            .execute(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected())
    }
}
