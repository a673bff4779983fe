use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use lunora_core::model::{
    AttemptRecord, Question, SessionId, StudySession, SubtopicBreakdown, UserId,
};

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

/// Persisted document shape for a session.
///
/// This mirrors the domain `StudySession` so stores can serialize and
/// deserialize without leaking storage concerns into the domain layer. The
/// nested collections travel as-is; converting back into a `StudySession`
/// re-runs the aggregate's validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: String,
    pub subject: String,
    pub topic: String,
    pub content: String,
    pub questions: Vec<Question>,
    pub completed_questions: u32,
    pub correct_answers: u32,
    pub subtopics: SubtopicBreakdown,
    pub attempts: Vec<AttemptRecord>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &StudySession) -> Self {
        Self {
            id: session.id(),
            user_id: session.user_id().as_str().to_owned(),
            subject: session.subject().to_owned(),
            topic: session.topic().to_owned(),
            content: session.content().to_owned(),
            questions: session.questions().to_vec(),
            completed_questions: session.completed_questions(),
            correct_answers: session.correct_answers(),
            subtopics: session.subtopics().clone(),
            attempts: session.attempts().to_vec(),
            is_completed: session.is_completed(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
            last_attempted_at: session.last_attempted_at(),
        }
    }

    /// Convert the record back into a domain `StudySession`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the record fails the
    /// aggregate's validation (bad user ID, inconsistent counters, invalid
    /// questions or attempts).
    pub fn into_session(self) -> Result<StudySession, StorageError> {
        let user_id =
            UserId::new(self.user_id).map_err(|e| StorageError::Serialization(e.to_string()))?;
        StudySession::from_persisted(
            self.id,
            user_id,
            self.subject,
            self.topic,
            self.content,
            self.questions,
            self.completed_questions,
            self.correct_answers,
            self.subtopics,
            self.attempts,
            self.is_completed,
            self.created_at,
            self.updated_at,
            self.last_attempted_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Authoritative session store contract (the remote source of truth).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session document by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures; a missing
    /// document is `Ok(None)`, not an error.
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError>;

    /// List all sessions owned by a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, StorageError>;

    /// List a user's sessions under one subject, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_for_subject(
        &self,
        user_id: &UserId,
        subject: &str,
    ) -> Result<Vec<SessionRecord>, StorageError>;

    /// Persist a session document, replacing any existing one wholesale.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn upsert(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Delete a session document. Returns whether a document was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn delete(&self, id: SessionId) -> Result<bool, StorageError>;

    /// Remove every session under `(user, subject)` as one atomic batch.
    ///
    /// Either all matching documents are removed or none are. Returns the
    /// number removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn delete_for_subject(
        &self,
        user_id: &UserId,
        subject: &str,
    ) -> Result<u64, StorageError>;
}

/// Local session mirror keyed by session ID. Never the source of truth; it
/// only shortens perceived load latency, so callers tolerate staleness.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Fetch a mirrored session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on cache access failures.
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError>;

    /// List all mirrored sessions for a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on cache access failures.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, StorageError>;

    /// Mirror a session document (full replace, no field-level merge).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on cache access failures.
    async fn put(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Drop a mirrored session, e.g. when it vanished from the remote list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on cache access failures.
    async fn remove(&self, id: SessionId) -> Result<(), StorageError>;
}

fn sort_most_recent_first(records: &mut [SessionRecord]) {
    records.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.value().cmp(&b.id.value()))
    });
}

/// Simple in-memory store implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.user_id == user_id.as_str())
            .cloned()
            .collect();
        sort_most_recent_first(&mut records);
        Ok(records)
    }

    async fn list_for_subject(
        &self,
        user_id: &UserId,
        subject: &str,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.user_id == user_id.as_str() && r.subject == subject)
            .cloned()
            .collect();
        sort_most_recent_first(&mut records);
        Ok(records)
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<bool, StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.remove(&id).is_some())
    }

    async fn delete_for_subject(
        &self,
        user_id: &UserId,
        subject: &str,
    ) -> Result<u64, StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let doomed: Vec<SessionId> = guard
            .values()
            .filter(|r| r.user_id == user_id.as_str() && r.subject == subject)
            .map(|r| r.id)
            .collect();
        for id in &doomed {
            guard.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

/// In-memory mirror implementation, the client-local cache counterpart of
/// `InMemorySessionStore`.
#[derive(Clone, Default)]
pub struct InMemorySessionCache {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
}

impl InMemorySessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.user_id == user_id.as_str())
            .cloned()
            .collect();
        sort_most_recent_first(&mut records);
        Ok(records)
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.id, record.clone());
        Ok(())
    }

    async fn remove(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&id);
        Ok(())
    }
}

/// Aggregates the authoritative store and the local mirror behind trait
/// objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub mirror: Arc<dyn SessionCache>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let mirror: Arc<dyn SessionCache> = Arc::new(InMemorySessionCache::new());
        Self { sessions, mirror }
    }
}
