use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubtopicError {
    #[error("scored count ({scored}) exceeds total ({total}) for subtopic {name}")]
    ScoredExceedsTotal {
        name: String,
        scored: u32,
        total: u32,
    },
}

/// Scored/total counts for one subtopic in the current attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtopicPerformance {
    name: String,
    scored: u32,
    total: u32,
}

impl SubtopicPerformance {
    /// Rehydrate a persisted entry.
    ///
    /// # Errors
    ///
    /// Returns `SubtopicError::ScoredExceedsTotal` if counts are inconsistent.
    pub fn from_persisted(
        name: impl Into<String>,
        scored: u32,
        total: u32,
    ) -> Result<Self, SubtopicError> {
        let name = name.into();
        if scored > total {
            return Err(SubtopicError::ScoredExceedsTotal {
                name,
                scored,
                total,
            });
        }
        Ok(Self {
            name,
            scored,
            total,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn scored(&self) -> u32 {
        self.scored
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Per-subtopic performance map for one session.
///
/// Entries keep the order in which their subtopic first appears in the
/// question list, so listings render stably across recomputes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtopicBreakdown {
    entries: Vec<SubtopicPerformance>,
}

impl SubtopicBreakdown {
    /// Recompute the whole breakdown from the live question list.
    ///
    /// Totals come from counting questions per subtopic key; scored counts
    /// start at zero. An empty question list yields an empty breakdown.
    #[must_use]
    pub fn derive(questions: &[Question]) -> Self {
        let mut entries: Vec<SubtopicPerformance> = Vec::new();
        for question in questions {
            let key = question.subtopic_key();
            match entries.iter_mut().find(|e| e.name == key) {
                Some(entry) => entry.total = entry.total.saturating_add(1),
                None => entries.push(SubtopicPerformance {
                    name: key.to_string(),
                    scored: 0,
                    total: 1,
                }),
            }
        }
        Self { entries }
    }

    /// Refresh totals and membership from the live question list while
    /// keeping the scored counts of surviving subtopics.
    pub fn recompute_totals(&mut self, questions: &[Question]) {
        let mut fresh = Self::derive(questions).entries;
        for entry in &mut fresh {
            if let Some(existing) = self.get(&entry.name) {
                entry.scored = existing.scored.min(entry.total);
            }
        }
        self.entries = fresh;
    }

    /// Credit an answer under `name`, recomputing that subtopic's total from
    /// the caller-supplied live count rather than trusting the cached value.
    pub(crate) fn apply_answer(&mut self, name: &str, is_correct: bool, live_total: u32) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                if is_correct {
                    entry.scored = entry.scored.saturating_add(1);
                }
                entry.total = live_total.max(entry.scored);
            }
            None => self.entries.push(SubtopicPerformance {
                name: name.to_string(),
                scored: u32::from(is_correct),
                total: live_total.max(u32::from(is_correct)),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SubtopicPerformance> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Subtopic names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn entries(&self) -> &[SubtopicPerformance] {
        &self.entries
    }

    /// Sum of per-subtopic totals; equals the question count when the
    /// breakdown is in sync with its question list.
    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.entries
            .iter()
            .fold(0, |sum, e| sum.saturating_add(e.total))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check every entry for count consistency.
    ///
    /// # Errors
    ///
    /// Returns `SubtopicError::ScoredExceedsTotal` for the first bad entry.
    pub fn validate(&self) -> Result<(), SubtopicError> {
        for entry in &self.entries {
            if entry.scored > entry.total {
                return Err(SubtopicError::ScoredExceedsTotal {
                    name: entry.name.clone(),
                    scored: entry.scored,
                    total: entry.total,
                });
            }
        }
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
