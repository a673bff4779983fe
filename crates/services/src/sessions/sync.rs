use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, warn};

use lunora_core::Clock;
use lunora_core::model::{
    AnswerOutcome, AttemptRecord, QuestionDraft, SessionId, StudySession,
};
use lunora_storage::repository::{SessionCache, SessionRecord, SessionStore, Storage};

use crate::auth::AuthContext;
use crate::error::SessionSyncError;

/// Feedback returned to the caller after an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFeedback {
    /// The choice was recorded and persisted.
    Recorded { is_correct: bool },
    /// The question already held an answer; nothing was written.
    AlreadyAnswered,
}

/// Orchestrates session lifecycle writes against the authoritative store
/// and the local mirror.
///
/// Within one mutation the ordering is fixed: the remote write goes first,
/// then the mirror write, so the mirror can lag the remote store but never
/// lead it. Mutations are copy-then-replace: a clone of the caller's
/// session is mutated and persisted, and the caller's copy is swapped only
/// once the remote write has succeeded.
///
/// The mutation surface converts failures into sentinel returns (`None`,
/// `false`) after logging them; nothing here retries, that call belongs to
/// the caller.
#[derive(Clone)]
pub struct SessionSyncService {
    clock: Clock,
    store: Arc<dyn SessionStore>,
    mirror: Arc<dyn SessionCache>,
}

impl SessionSyncService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn SessionStore>, mirror: Arc<dyn SessionCache>) -> Self {
        Self {
            clock,
            store,
            mirror,
        }
    }

    #[must_use]
    pub fn with_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(clock, storage.sessions.clone(), storage.mirror.clone())
    }

    //
    // ─── CREATION & LOADING ────────────────────────────────────────────────────
    //

    /// Create and persist a new session from generated question drafts.
    ///
    /// # Errors
    ///
    /// Returns `SessionSyncError` if the drafts fail validation or the
    /// remote write fails.
    pub async fn create_session(
        &self,
        ctx: &AuthContext,
        subject: &str,
        topic: &str,
        content: &str,
        drafts: Vec<QuestionDraft>,
    ) -> Result<StudySession, SessionSyncError> {
        let now = self.clock.now();
        let session = StudySession::new(
            SessionId::generate(),
            ctx.user_id().clone(),
            subject,
            topic,
            content,
            drafts,
            now,
        )?;
        self.persist(&session).await?;
        Ok(session)
    }

    /// Sessions currently present in the local mirror, for immediate render.
    ///
    /// Phase one of the two-phase load; follow with `load_all_for_user` to
    /// reconcile against the remote store. A failing mirror degrades to an
    /// empty list since the authoritative fetch is about to happen anyway.
    pub async fn load_cached(&self, ctx: &AuthContext) -> Vec<StudySession> {
        match self.mirror.list_for_user(ctx.user_id()).await {
            Ok(records) => decode_sessions(records),
            Err(err) => {
                warn!(user = %ctx.user_id(), %err, "mirror read failed");
                Vec::new()
            }
        }
    }

    /// Authoritative session list for the user; phase two of the two-phase
    /// load.
    ///
    /// Every fetched session is written into the mirror (full replace) and
    /// mirrored sessions absent from the authoritative list are pruned,
    /// which picks up deletions made from other devices.
    ///
    /// # Errors
    ///
    /// Returns `SessionSyncError::Storage` when the authoritative fetch
    /// fails; mirror maintenance failures are only logged.
    pub async fn load_all_for_user(
        &self,
        ctx: &AuthContext,
    ) -> Result<Vec<StudySession>, SessionSyncError> {
        let records = self.store.list_for_user(ctx.user_id()).await?;

        for record in &records {
            if let Err(err) = self.mirror.put(record).await {
                warn!(session = %record.id, %err, "mirror refresh failed");
            }
        }

        match self.mirror.list_for_user(ctx.user_id()).await {
            Ok(mirrored) => {
                let live: HashSet<SessionId> = records.iter().map(|r| r.id).collect();
                for stale in mirrored.iter().filter(|r| !live.contains(&r.id)) {
                    if let Err(err) = self.mirror.remove(stale.id).await {
                        warn!(session = %stale.id, %err, "mirror prune failed");
                    }
                }
            }
            Err(err) => warn!(user = %ctx.user_id(), %err, "mirror prune skipped"),
        }

        let mut sessions = Vec::with_capacity(records.len());
        for record in records {
            sessions.push(record.into_session()?);
        }
        Ok(sessions)
    }

    /// Fetch one session from the authoritative store, enforcing ownership.
    ///
    /// # Errors
    ///
    /// Returns `SessionSyncError::NotFound` for a missing session,
    /// `SessionSyncError::Unauthorized` when the record belongs to another
    /// user, or `SessionSyncError::Storage` on fetch failures.
    pub async fn load_session(
        &self,
        ctx: &AuthContext,
        id: SessionId,
    ) -> Result<StudySession, SessionSyncError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or(SessionSyncError::NotFound(id))?;
        if !ctx.owns(&record.user_id) {
            return Err(SessionSyncError::Unauthorized(id));
        }
        Ok(record.into_session()?)
    }

    //
    // ─── CURRENT ATTEMPT ───────────────────────────────────────────────────────
    //

    /// Record an answer and persist the updated session.
    ///
    /// The already-answered case reports `AnswerFeedback::AlreadyAnswered`
    /// without writing anything; the first recorded answer always wins.
    /// Returns `None` when the submission is rejected by the domain or a
    /// storage write fails.
    pub async fn record_answer(
        &self,
        session: &mut StudySession,
        index: usize,
        choice: usize,
    ) -> Option<AnswerFeedback> {
        match self.try_record_answer(session, index, choice).await {
            Ok(feedback) => Some(feedback),
            Err(err) => {
                error!(session = %session.id(), index, %err, "record answer failed");
                None
            }
        }
    }

    async fn try_record_answer(
        &self,
        session: &mut StudySession,
        index: usize,
        choice: usize,
    ) -> Result<AnswerFeedback, SessionSyncError> {
        let now = self.clock.now();
        let mut next = session.clone();
        match next.record_answer(index, choice, now)? {
            AnswerOutcome::AlreadyAnswered => Ok(AnswerFeedback::AlreadyAnswered),
            AnswerOutcome::Recorded { is_correct } => {
                self.persist(&next).await?;
                *session = next;
                Ok(AnswerFeedback::Recorded { is_correct })
            }
        }
    }

    /// Append generator-produced extra questions into one subtopic's block
    /// and persist the grown session. Returns the number appended, or
    /// `None` on failure.
    pub async fn append_extra_questions(
        &self,
        session: &mut StudySession,
        drafts: Vec<QuestionDraft>,
        subtopic: &str,
    ) -> Option<u32> {
        match self.try_append_extra_questions(session, drafts, subtopic).await {
            Ok(appended) => Some(appended),
            Err(err) => {
                error!(session = %session.id(), subtopic, %err, "append questions failed");
                None
            }
        }
    }

    async fn try_append_extra_questions(
        &self,
        session: &mut StudySession,
        drafts: Vec<QuestionDraft>,
        subtopic: &str,
    ) -> Result<u32, SessionSyncError> {
        let now = self.clock.now();
        let mut next = session.clone();
        let appended = next.append_questions(drafts, subtopic, now)?;
        if appended == 0 {
            return Ok(0);
        }
        self.persist(&next).await?;
        *session = next;
        Ok(appended)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Complete the current attempt, appending a frozen record to history.
    ///
    /// Returns the new attempt record, or `None` when persistence fails (in
    /// which case the caller's session is left unmarked so the completion
    /// can be retried by answering again).
    pub async fn complete_session(&self, session: &mut StudySession) -> Option<AttemptRecord> {
        match self.try_complete_session(session).await {
            Ok(attempt) => Some(attempt),
            Err(err) => {
                error!(session = %session.id(), %err, "complete session failed");
                None
            }
        }
    }

    async fn try_complete_session(
        &self,
        session: &mut StudySession,
    ) -> Result<AttemptRecord, SessionSyncError> {
        let now = self.clock.now();
        let mut next = session.clone();
        let attempt = next.complete(now);
        self.persist(&next).await?;
        *session = next;
        Ok(attempt)
    }

    /// Reset a completed session for a fresh attempt; history survives.
    ///
    /// Returns the (unchanged) session ID on success, `None` on any storage
    /// failure.
    pub async fn reset_for_training(&self, session: &mut StudySession) -> Option<SessionId> {
        match self.try_reset_for_training(session).await {
            Ok(id) => Some(id),
            Err(err) => {
                error!(session = %session.id(), %err, "reset failed");
                None
            }
        }
    }

    async fn try_reset_for_training(
        &self,
        session: &mut StudySession,
    ) -> Result<SessionId, SessionSyncError> {
        let now = self.clock.now();
        let mut next = session.clone();
        next.reset_for_training(now);
        self.persist(&next).await?;
        let id = next.id();
        *session = next;
        Ok(id)
    }

    //
    // ─── DELETION ──────────────────────────────────────────────────────────────
    //

    /// Delete one session, remote store first, then the mirror entry.
    ///
    /// Returns `false` when the session is missing, owned by another user,
    /// or the delete fails.
    pub async fn delete_session(&self, ctx: &AuthContext, id: SessionId) -> bool {
        match self.try_delete_session(ctx, id).await {
            Ok(removed) => removed,
            Err(err) => {
                error!(session = %id, %err, "delete session failed");
                false
            }
        }
    }

    async fn try_delete_session(
        &self,
        ctx: &AuthContext,
        id: SessionId,
    ) -> Result<bool, SessionSyncError> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(false);
        };
        if !ctx.owns(&record.user_id) {
            return Err(SessionSyncError::Unauthorized(id));
        }
        let removed = self.store.delete(id).await?;
        if let Err(err) = self.mirror.remove(id).await {
            warn!(session = %id, %err, "mirror removal failed after delete");
        }
        Ok(removed)
    }

    /// Bulk delete of every session under the user's subject, as one batch
    /// against the remote store; mirror entries follow.
    ///
    /// Returns `false` when nothing matched or the batch failed.
    pub async fn delete_subject_sessions(&self, ctx: &AuthContext, subject: &str) -> bool {
        match self.try_delete_subject_sessions(ctx, subject).await {
            Ok(removed) => removed > 0,
            Err(err) => {
                error!(user = %ctx.user_id(), subject, %err, "delete by subject failed");
                false
            }
        }
    }

    async fn try_delete_subject_sessions(
        &self,
        ctx: &AuthContext,
        subject: &str,
    ) -> Result<u64, SessionSyncError> {
        // capture the IDs first so the mirror can be pruned after the batch
        let doomed = self.store.list_for_subject(ctx.user_id(), subject).await?;
        let removed = self
            .store
            .delete_for_subject(ctx.user_id(), subject)
            .await?;
        for record in &doomed {
            if let Err(err) = self.mirror.remove(record.id).await {
                warn!(session = %record.id, %err, "mirror removal failed after batch delete");
            }
        }
        Ok(removed)
    }

    async fn persist(&self, session: &StudySession) -> Result<(), SessionSyncError> {
        let record = SessionRecord::from_session(session);
        self.store.upsert(&record).await?;
        if let Err(err) = self.mirror.put(&record).await {
            // a lagging mirror is tolerated; the next refresh reconciles it
            warn!(session = %record.id, %err, "mirror write failed after remote upsert");
        }
        Ok(())
    }
}

fn decode_sessions(records: Vec<SessionRecord>) -> Vec<StudySession> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            match record.into_session() {
                Ok(session) => Some(session),
                Err(err) => {
                    warn!(session = %id, %err, "dropping undecodable mirrored session");
                    None
                }
            }
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
