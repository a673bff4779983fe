use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Subtopic bucket used when a question carries no label of its own.
pub const GENERAL_SUBTOPIC: &str = "General";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question needs at least two options, got {got}")]
    NotEnoughOptions { got: usize },

    #[error("correct answer index {index} out of bounds for {options} options")]
    CorrectIndexOutOfBounds { index: usize, options: usize },

    #[error("chosen answer index {index} out of bounds for {options} options")]
    ChoiceOutOfBounds { index: usize, options: usize },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question shape as produced by the content generator.
///
/// Drafts become `Question`s when a session adopts them; subtopic labels may
/// be overridden at that point (extra questions are force-tagged into their
/// target bucket).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub prompt: String,
    #[serde(default)]
    pub subtopic: Option<String>,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question belonging to one session.
///
/// The recorded answer is write-once for the lifetime of an attempt; only a
/// session reset clears it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    subtopic: Option<String>,
    prompt: String,
    options: Vec<String>,
    correct_answer_index: usize,
    user_answer_index: Option<usize>,
    user_answer: Option<String>,
}

impl Question {
    /// Validate a draft and adopt it under the given ID.
    ///
    /// Blank subtopic labels are normalized away so that `subtopic_key`
    /// falls back to the `"General"` bucket.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, fewer than two
    /// options are present, or the correct index is out of bounds.
    pub fn new(id: QuestionId, draft: QuestionDraft) -> Result<Self, QuestionError> {
        let subtopic = draft
            .subtopic
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let question = Self {
            id,
            subtopic,
            prompt: draft.prompt.trim().to_string(),
            options: draft.options,
            correct_answer_index: draft.correct_answer_index,
            user_answer_index: None,
            user_answer: None,
        };
        question.validate()?;
        Ok(question)
    }

    /// Re-check structural invariants, e.g. after deserializing a persisted
    /// question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt, option count, or any recorded
    /// index is invalid.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::NotEnoughOptions {
                got: self.options.len(),
            });
        }
        if self.correct_answer_index >= self.options.len() {
            return Err(QuestionError::CorrectIndexOutOfBounds {
                index: self.correct_answer_index,
                options: self.options.len(),
            });
        }
        if let Some(chosen) = self.user_answer_index {
            if chosen >= self.options.len() {
                return Err(QuestionError::ChoiceOutOfBounds {
                    index: chosen,
                    options: self.options.len(),
                });
            }
        }
        Ok(())
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn subtopic(&self) -> Option<&str> {
        self.subtopic.as_deref()
    }

    /// The subtopic bucket this question is scored under.
    #[must_use]
    pub fn subtopic_key(&self) -> &str {
        self.subtopic.as_deref().unwrap_or(GENERAL_SUBTOPIC)
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer_index(&self) -> usize {
        self.correct_answer_index
    }

    #[must_use]
    pub fn user_answer_index(&self) -> Option<usize> {
        self.user_answer_index
    }

    /// Denormalized text of the recorded choice, kept for history views.
    #[must_use]
    pub fn user_answer(&self) -> Option<&str> {
        self.user_answer.as_deref()
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.user_answer_index.is_some()
    }

    /// Whether the recorded answer is correct; `None` while unanswered.
    #[must_use]
    pub fn is_correct(&self) -> Option<bool> {
        self.user_answer_index
            .map(|chosen| chosen == self.correct_answer_index)
    }

    /// Record the learner's choice and report correctness.
    ///
    /// Callers are expected to check `is_answered` first; the write-once
    /// guard lives in the session so the already-answered case can be
    /// reported as an outcome rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::ChoiceOutOfBounds` if `choice` does not index
    /// into the options.
    pub(crate) fn record_choice(&mut self, choice: usize) -> Result<bool, QuestionError> {
        if choice >= self.options.len() {
            return Err(QuestionError::ChoiceOutOfBounds {
                index: choice,
                options: self.options.len(),
            });
        }
        self.user_answer_index = Some(choice);
        self.user_answer = Some(self.options[choice].clone());
        Ok(choice == self.correct_answer_index)
    }

    /// Clear the recorded answer (index and denormalized text).
    pub(crate) fn clear_answer(&mut self) {
        self.user_answer_index = None;
        self.user_answer = None;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(subtopic: Option<&str>) -> QuestionDraft {
        QuestionDraft {
            prompt: "What does a loop do?".to_string(),
            subtopic: subtopic.map(str::to_string),
            options: vec!["Repeats".to_string(), "Branches".to_string()],
            correct_answer_index: 0,
        }
    }

    #[test]
    fn new_rejects_blank_prompt() {
        let mut d = draft(None);
        d.prompt = "   ".to_string();
        let err = Question::new(QuestionId::new(1), d).unwrap_err();
        assert_eq!(err, QuestionError::EmptyPrompt);
    }

    #[test]
    fn new_rejects_single_option() {
        let mut d = draft(None);
        d.options = vec!["Only".to_string()];
        d.correct_answer_index = 0;
        let err = Question::new(QuestionId::new(1), d).unwrap_err();
        assert_eq!(err, QuestionError::NotEnoughOptions { got: 1 });
    }

    #[test]
    fn new_rejects_out_of_bounds_correct_index() {
        let mut d = draft(None);
        d.correct_answer_index = 5;
        let err = Question::new(QuestionId::new(1), d).unwrap_err();
        assert_eq!(
            err,
            QuestionError::CorrectIndexOutOfBounds {
                index: 5,
                options: 2
            }
        );
    }

    #[test]
    fn missing_subtopic_falls_back_to_general() {
        let q = Question::new(QuestionId::new(1), draft(None)).unwrap();
        assert_eq!(q.subtopic(), None);
        assert_eq!(q.subtopic_key(), GENERAL_SUBTOPIC);
    }

    #[test]
    fn blank_subtopic_falls_back_to_general() {
        let q = Question::new(QuestionId::new(1), draft(Some("   "))).unwrap();
        assert_eq!(q.subtopic_key(), GENERAL_SUBTOPIC);
    }

    #[test]
    fn subtopic_is_trimmed() {
        let q = Question::new(QuestionId::new(1), draft(Some("  Loops "))).unwrap();
        assert_eq!(q.subtopic(), Some("Loops"));
        assert_eq!(q.subtopic_key(), "Loops");
    }

    #[test]
    fn record_choice_reports_correctness_and_snapshot() {
        let mut q = Question::new(QuestionId::new(1), draft(Some("Loops"))).unwrap();
        assert!(!q.is_answered());
        assert_eq!(q.is_correct(), None);

        let correct = q.record_choice(0).unwrap();
        assert!(correct);
        assert_eq!(q.user_answer_index(), Some(0));
        assert_eq!(q.user_answer(), Some("Repeats"));
        assert_eq!(q.is_correct(), Some(true));
    }

    #[test]
    fn record_choice_rejects_out_of_bounds() {
        let mut q = Question::new(QuestionId::new(1), draft(None)).unwrap();
        let err = q.record_choice(9).unwrap_err();
        assert_eq!(
            err,
            QuestionError::ChoiceOutOfBounds {
                index: 9,
                options: 2
            }
        );
        assert!(!q.is_answered());
    }

    #[test]
    fn clear_answer_resets_index_and_text() {
        let mut q = Question::new(QuestionId::new(1), draft(None)).unwrap();
        q.record_choice(1).unwrap();
        q.clear_answer();
        assert!(!q.is_answered());
        assert_eq!(q.user_answer(), None);
    }
}
