use lunora_core::model::StudySession;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn of(session: &StudySession) -> Self {
        let total = session.total_questions();
        let answered = session.answered_questions();
        Self {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: session.is_completed(),
        }
    }
}
