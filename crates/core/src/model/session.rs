use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::attempt::{AttemptError, AttemptRecord, FinalScore};
use crate::model::ids::{QuestionId, SessionId, UserId};
use crate::model::question::{GENERAL_SUBTOPIC, Question, QuestionDraft, QuestionError};
use crate::model::subtopic::{SubtopicBreakdown, SubtopicError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session subject cannot be empty")]
    EmptySubject,

    #[error("session topic cannot be empty")]
    EmptyTopic,

    #[error("question index {index} out of range ({len} questions)")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("persisted counter {field} does not match the question list")]
    CounterMismatch { field: &'static str },

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Subtopic(#[from] SubtopicError),

    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

/// Outcome of recording an answer for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The choice was recorded and counted.
    Recorded { is_correct: bool },
    /// The question already had an answer; nothing changed.
    AlreadyAnswered,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's quiz over a single piece of source content.
///
/// The session is the persisted unit: it owns the ordered question list, the
/// running counters for the current attempt, the live subtopic breakdown,
/// and the append-only attempt history that survives resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    id: SessionId,
    user_id: UserId,
    subject: String,
    topic: String,
    content: String,
    questions: Vec<Question>,
    completed_questions: u32,
    correct_answers: u32,
    subtopics: SubtopicBreakdown,
    attempts: Vec<AttemptRecord>,
    is_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_attempted_at: Option<DateTime<Utc>>,
}

impl StudySession {
    /// Create a fresh session from generated question drafts.
    ///
    /// Question IDs are assigned in list order starting at 1 and the
    /// subtopic breakdown is derived up front so per-subtopic totals are
    /// valid before the first answer. An empty draft list is allowed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if subject or topic is blank, or any draft
    /// fails question validation.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        subject: impl Into<String>,
        topic: impl Into<String>,
        content: impl Into<String>,
        drafts: Vec<QuestionDraft>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(SessionError::EmptySubject);
        }
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(SessionError::EmptyTopic);
        }

        let mut questions = Vec::with_capacity(drafts.len());
        let mut next_id: u32 = 1;
        for draft in drafts {
            questions.push(Question::new(QuestionId::new(next_id), draft)?);
            next_id = next_id.saturating_add(1);
        }
        let subtopics = SubtopicBreakdown::derive(&questions);

        Ok(Self {
            id,
            user_id,
            subject,
            topic,
            content: content.into(),
            questions,
            completed_questions: 0,
            correct_answers: 0,
            subtopics,
            attempts: Vec::new(),
            is_completed: false,
            created_at: now,
            updated_at: now,
            last_attempted_at: None,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if any question or attempt fails validation,
    /// or the stored counters disagree with the question list.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        subject: String,
        topic: String,
        content: String,
        questions: Vec<Question>,
        completed_questions: u32,
        correct_answers: u32,
        subtopics: SubtopicBreakdown,
        attempts: Vec<AttemptRecord>,
        is_completed: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        last_attempted_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionError> {
        if subject.trim().is_empty() {
            return Err(SessionError::EmptySubject);
        }
        if topic.trim().is_empty() {
            return Err(SessionError::EmptyTopic);
        }
        for question in &questions {
            question.validate()?;
        }
        for attempt in &attempts {
            attempt.validate()?;
        }
        subtopics.validate()?;

        let answered = count_u32(questions.iter().filter(|q| q.is_answered()).count());
        if completed_questions != answered {
            return Err(SessionError::CounterMismatch {
                field: "completed_questions",
            });
        }
        let correct = count_u32(
            questions
                .iter()
                .filter(|q| q.is_correct() == Some(true))
                .count(),
        );
        if correct_answers != correct {
            return Err(SessionError::CounterMismatch {
                field: "correct_answers",
            });
        }
        if subtopics.total_questions() != count_u32(questions.len()) {
            return Err(SessionError::CounterMismatch {
                field: "subtopic_totals",
            });
        }

        Ok(Self {
            id,
            user_id,
            subject,
            topic,
            content,
            questions,
            completed_questions,
            correct_answers,
            subtopics,
            attempts,
            is_completed,
            created_at,
            updated_at,
            last_attempted_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Source text the questions were generated from.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn completed_questions(&self) -> u32 {
        self.completed_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn subtopics(&self) -> &SubtopicBreakdown {
        &self.subtopics
    }

    /// Attempt history, oldest first. Append-only across the session's life.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn last_attempted_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempted_at
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn answered_questions(&self) -> usize {
        self.questions.iter().filter(|q| q.is_answered()).count()
    }

    //
    // ─── CURRENT ATTEMPT ───────────────────────────────────────────────────────
    //

    /// Record the learner's choice for the question at `index`.
    ///
    /// A question that already holds an answer is left untouched and
    /// reported as `AnswerOutcome::AlreadyAnswered`; the first recorded
    /// answer always wins. On a recorded answer the subtopic's scored count
    /// is credited and its total recomputed from the live question list.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionOutOfRange` for a bad index and
    /// propagates `QuestionError::ChoiceOutOfBounds` for a bad choice.
    pub fn record_answer(
        &mut self,
        index: usize,
        choice: usize,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        let len = self.questions.len();
        let (is_correct, key) = {
            let Some(question) = self.questions.get_mut(index) else {
                return Err(SessionError::QuestionOutOfRange { index, len });
            };
            if question.is_answered() {
                return Ok(AnswerOutcome::AlreadyAnswered);
            }
            let is_correct = question.record_choice(choice)?;
            (is_correct, question.subtopic_key().to_string())
        };

        let live_total = self.count_for_subtopic(&key);
        self.subtopics.apply_answer(&key, is_correct, live_total);
        self.completed_questions = self.completed_questions.saturating_add(1);
        if is_correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
        self.updated_at = now;
        Ok(AnswerOutcome::Recorded { is_correct })
    }

    /// Final percentage metrics for the current attempt.
    ///
    /// Correctness is counted from the question list itself, not the running
    /// counters, and an empty list scores 0.
    #[must_use]
    pub fn final_score(&self) -> FinalScore {
        let correct = self
            .questions
            .iter()
            .filter(|q| q.is_correct() == Some(true))
            .count();
        FinalScore::from_counts(count_u32(correct), count_u32(self.questions.len()))
    }

    /// Append freshly generated questions into the given subtopic's block.
    ///
    /// Incoming drafts are force-tagged with `subtopic` regardless of the
    /// label they arrived with, and inserted directly after the last
    /// existing question of that subtopic (at the end if the subtopic is
    /// new) so blocks stay contiguous. Totals are refreshed afterwards;
    /// scored counts of the current attempt are untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if any draft fails question validation.
    pub fn append_questions(
        &mut self,
        drafts: Vec<QuestionDraft>,
        subtopic: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, SessionError> {
        if drafts.is_empty() {
            return Ok(0);
        }
        let name = {
            let trimmed = subtopic.trim();
            if trimmed.is_empty() {
                GENERAL_SUBTOPIC
            } else {
                trimmed
            }
        };

        let mut next_id = self.next_question_id();
        let mut block = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let draft = QuestionDraft {
                subtopic: Some(name.to_string()),
                ..draft
            };
            block.push(Question::new(QuestionId::new(next_id), draft)?);
            next_id = next_id.saturating_add(1);
        }
        let appended = count_u32(block.len());

        let insert_at = self
            .questions
            .iter()
            .rposition(|q| q.subtopic_key() == name)
            .map_or(self.questions.len(), |i| i + 1);
        let tail = self.questions.split_off(insert_at);
        self.questions.extend(block);
        self.questions.extend(tail);

        self.subtopics.recompute_totals(&self.questions);
        self.updated_at = now;
        Ok(appended)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Finish the current attempt and freeze it into history.
    ///
    /// Builds an attempt record from the final score and a deep copy of the
    /// live breakdown, appends it, and marks the session completed. Calling
    /// this again without an intervening reset appends another record; a
    /// re-attempt is a fresh completion, so no deduplication happens here.
    pub fn complete(&mut self, now: DateTime<Utc>) -> AttemptRecord {
        let score = self.final_score();
        let attempt = AttemptRecord::capture(score, &self.subtopics, now);
        self.attempts.push(attempt.clone());
        self.is_completed = true;
        self.last_attempted_at = Some(now);
        self.updated_at = now;
        attempt
    }

    /// Clear the current attempt for a fresh run.
    ///
    /// Re-derives the breakdown from the question list (scored counts back
    /// to zero), clears every recorded answer, zeroes the running counters,
    /// and reopens the session. Attempt history is left untouched.
    pub fn reset_for_training(&mut self, now: DateTime<Utc>) {
        self.subtopics = SubtopicBreakdown::derive(&self.questions);
        for question in &mut self.questions {
            question.clear_answer();
        }
        self.completed_questions = 0;
        self.correct_answers = 0;
        self.is_completed = false;
        self.last_attempted_at = Some(now);
        self.updated_at = now;
    }

    fn count_for_subtopic(&self, key: &str) -> u32 {
        count_u32(
            self.questions
                .iter()
                .filter(|q| q.subtopic_key() == key)
                .count(),
        )
    }

    fn next_question_id(&self) -> u32 {
        self.questions
            .iter()
            .map(|q| q.id().value())
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }
}

fn count_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft(subtopic: &str, correct_index: usize) -> QuestionDraft {
        QuestionDraft {
            prompt: format!("About {subtopic}?"),
            subtopic: Some(subtopic.to_string()),
            options: vec!["first".to_string(), "second".to_string()],
            correct_answer_index: correct_index,
        }
    }

    fn build_session(drafts: Vec<QuestionDraft>) -> StudySession {
        StudySession::new(
            SessionId::generate(),
            UserId::new("learner-1").unwrap(),
            "Programming",
            "Control flow",
            "source text",
            drafts,
            fixed_now(),
        )
        .unwrap()
    }

    /// Six "Loops" questions then four "Arrays" questions, all with the
    /// correct option at index 0.
    fn loops_and_arrays() -> StudySession {
        let mut drafts = Vec::new();
        for _ in 0..6 {
            drafts.push(draft("Loops", 0));
        }
        for _ in 0..4 {
            drafts.push(draft("Arrays", 0));
        }
        build_session(drafts)
    }

    fn breakdown_matches_question_count(session: &StudySession) -> bool {
        session.subtopics().total_questions() as usize == session.total_questions()
    }

    #[test]
    fn new_rejects_blank_subject_and_topic() {
        let err = StudySession::new(
            SessionId::generate(),
            UserId::new("u").unwrap(),
            "  ",
            "Topic",
            "",
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::EmptySubject);

        let err = StudySession::new(
            SessionId::generate(),
            UserId::new("u").unwrap(),
            "Subject",
            "",
            "",
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::EmptyTopic);
    }

    #[test]
    fn new_derives_breakdown_up_front() {
        let session = loops_and_arrays();
        assert_eq!(session.subtopics().get("Loops").unwrap().total(), 6);
        assert_eq!(session.subtopics().get("Arrays").unwrap().total(), 4);
        assert!(breakdown_matches_question_count(&session));
        assert!(!session.is_completed());
        assert_eq!(session.attempts().len(), 0);
    }

    #[test]
    fn answering_all_loops_right_and_arrays_wrong_scores_sixty() {
        let mut session = loops_and_arrays();
        for i in 0..6 {
            let outcome = session.record_answer(i, 0, fixed_now()).unwrap();
            assert_eq!(outcome, AnswerOutcome::Recorded { is_correct: true });
        }
        for i in 6..10 {
            let outcome = session.record_answer(i, 1, fixed_now()).unwrap();
            assert_eq!(outcome, AnswerOutcome::Recorded { is_correct: false });
        }

        let loops = session.subtopics().get("Loops").unwrap();
        assert_eq!((loops.scored(), loops.total()), (6, 6));
        let arrays = session.subtopics().get("Arrays").unwrap();
        assert_eq!((arrays.scored(), arrays.total()), (0, 4));

        let score = session.final_score();
        assert_eq!(score.percentage, 60);
        assert_eq!(score.correct, 6);
        assert_eq!(score.total, 10);
        assert!(breakdown_matches_question_count(&session));
    }

    #[test]
    fn second_answer_to_same_question_is_rejected() {
        let mut session = loops_and_arrays();
        session.record_answer(0, 0, fixed_now()).unwrap();
        let before = session.clone();

        let outcome = session.record_answer(0, 1, fixed_now()).unwrap();
        assert_eq!(outcome, AnswerOutcome::AlreadyAnswered);
        assert_eq!(session, before);
        assert_eq!(session.questions()[0].user_answer_index(), Some(0));
    }

    #[test]
    fn record_answer_rejects_bad_index() {
        let mut session = loops_and_arrays();
        let err = session.record_answer(99, 0, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            SessionError::QuestionOutOfRange { index: 99, len: 10 }
        );
    }

    #[test]
    fn empty_session_scores_zero() {
        let session = build_session(Vec::new());
        let score = session.final_score();
        assert_eq!((score.percentage, score.correct, score.total), (0, 0, 0));
        assert!(session.subtopics().is_empty());
    }

    #[test]
    fn complete_freezes_attempt_and_marks_session() {
        let mut session = loops_and_arrays();
        for i in 0..6 {
            session.record_answer(i, 0, fixed_now()).unwrap();
        }
        for i in 6..10 {
            session.record_answer(i, 1, fixed_now()).unwrap();
        }

        let attempt = session.complete(fixed_now());
        assert!(session.is_completed());
        assert_eq!(session.attempts().len(), 1);
        assert_eq!(attempt.score_percentage(), 60);
        assert_eq!(attempt.subtopics().get("Loops").unwrap().total(), 6);
    }

    #[test]
    fn completing_twice_appends_two_records() {
        let mut session = loops_and_arrays();
        session.complete(fixed_now());
        session.complete(fixed_now());
        assert_eq!(session.attempts().len(), 2);
    }

    #[test]
    fn append_extends_bucket_but_history_stays_frozen() {
        let mut session = loops_and_arrays();
        for i in 0..6 {
            session.record_answer(i, 0, fixed_now()).unwrap();
        }
        for i in 6..10 {
            session.record_answer(i, 1, fixed_now()).unwrap();
        }
        session.complete(fixed_now());

        let extra = vec![draft("ignored", 0), draft("ignored", 0), draft("ignored", 1)];
        let appended = session
            .append_questions(extra, "Loops", fixed_now())
            .unwrap();
        assert_eq!(appended, 3);

        assert_eq!(session.subtopics().get("Loops").unwrap().total(), 9);
        assert_eq!(session.attempts()[0].subtopics().get("Loops").unwrap().total(), 6);
        assert!(breakdown_matches_question_count(&session));
    }

    #[test]
    fn append_keeps_subtopic_blocks_contiguous() {
        let mut session = loops_and_arrays();
        session
            .append_questions(vec![draft("x", 0)], "Loops", fixed_now())
            .unwrap();

        // the new question sits right after the existing Loops block
        assert_eq!(session.questions()[6].subtopic_key(), "Loops");
        assert_eq!(session.questions()[7].subtopic_key(), "Arrays");
        assert_eq!(session.total_questions(), 11);
    }

    #[test]
    fn append_unknown_subtopic_goes_to_the_end() {
        let mut session = loops_and_arrays();
        session
            .append_questions(vec![draft("x", 0)], "Recursion", fixed_now())
            .unwrap();
        assert_eq!(session.questions().last().unwrap().subtopic_key(), "Recursion");
        assert!(breakdown_matches_question_count(&session));
    }

    #[test]
    fn append_assigns_fresh_question_ids() {
        let mut session = loops_and_arrays();
        session
            .append_questions(vec![draft("x", 0), draft("y", 0)], "Loops", fixed_now())
            .unwrap();
        let mut ids: Vec<u32> = session.questions().iter().map(|q| q.id().value()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), session.total_questions());
    }

    #[test]
    fn reset_clears_answers_and_counters_but_not_history() {
        let mut session = loops_and_arrays();
        for i in 0..10 {
            session.record_answer(i, 0, fixed_now()).unwrap();
        }
        session.complete(fixed_now());
        let history = session.attempts().to_vec();

        session.reset_for_training(fixed_now());

        assert!(!session.is_completed());
        assert_eq!(session.completed_questions(), 0);
        assert_eq!(session.correct_answers(), 0);
        assert!(session.questions().iter().all(|q| !q.is_answered()));
        assert!(session.questions().iter().all(|q| q.user_answer().is_none()));
        assert!(
            session
                .subtopics()
                .entries()
                .iter()
                .all(|e| e.scored() == 0)
        );
        assert_eq!(session.attempts(), history.as_slice());
        assert!(breakdown_matches_question_count(&session));
    }

    #[test]
    fn reset_then_reanswer_supports_fresh_completion() {
        let mut session = loops_and_arrays();
        for i in 0..10 {
            session.record_answer(i, 1, fixed_now()).unwrap();
        }
        session.complete(fixed_now());
        session.reset_for_training(fixed_now());

        for i in 0..10 {
            session.record_answer(i, 0, fixed_now()).unwrap();
        }
        let attempt = session.complete(fixed_now());

        assert_eq!(session.attempts().len(), 2);
        assert_eq!(session.attempts()[0].score_percentage(), 0);
        assert_eq!(attempt.score_percentage(), 100);
    }

    #[test]
    fn from_persisted_rejects_stale_counters() {
        let session = loops_and_arrays();
        let err = StudySession::from_persisted(
            session.id(),
            session.user_id().clone(),
            session.subject().to_string(),
            session.topic().to_string(),
            session.content().to_string(),
            session.questions().to_vec(),
            3, // nothing is answered
            0,
            session.subtopics().clone(),
            Vec::new(),
            false,
            session.created_at(),
            session.updated_at(),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SessionError::CounterMismatch {
                field: "completed_questions"
            }
        );
    }

    #[test]
    fn from_persisted_roundtrips_a_live_session() {
        let mut session = loops_and_arrays();
        session.record_answer(0, 0, fixed_now()).unwrap();
        session.record_answer(6, 1, fixed_now()).unwrap();
        session.complete(fixed_now());

        let rebuilt = StudySession::from_persisted(
            session.id(),
            session.user_id().clone(),
            session.subject().to_string(),
            session.topic().to_string(),
            session.content().to_string(),
            session.questions().to_vec(),
            session.completed_questions(),
            session.correct_answers(),
            session.subtopics().clone(),
            session.attempts().to_vec(),
            session.is_completed(),
            session.created_at(),
            session.updated_at(),
            session.last_attempted_at(),
        )
        .unwrap();

        assert_eq!(rebuilt, session);
    }
}
