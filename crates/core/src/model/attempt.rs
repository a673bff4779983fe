use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::subtopic::SubtopicBreakdown;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("score percentage {got} exceeds 100")]
    PercentageOutOfRange { got: u8 },

    #[error("correct count ({correct}) exceeds total ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("stored percentage {stored} does not match counts (expected {computed})")]
    PercentageMismatch { stored: u8, computed: u8 },
}

/// Final percentage metrics for one run over a session's question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub percentage: u8,
    pub correct: u32,
    pub total: u32,
}

impl FinalScore {
    /// Build a score from raw counts.
    ///
    /// The percentage is an integer via round-half-up; an empty question
    /// list scores 0 rather than dividing by zero.
    #[must_use]
    pub fn from_counts(correct: u32, total: u32) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            // round-half-up without going through floats
            let scaled = (u64::from(correct) * 200 + u64::from(total)) / (u64::from(total) * 2);
            u8::try_from(scaled.min(100)).unwrap_or(100)
        };
        Self {
            percentage,
            correct,
            total,
        }
    }
}

/// Immutable snapshot of scoring taken at the moment a session is completed.
///
/// Records live in the session's append-only attempt history and are never
/// mutated after creation; in particular the frozen subtopic breakdown stays
/// fixed even when questions are added to the session later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    score_percentage: u8,
    score_correct: u32,
    score_total: u32,
    practice_date: DateTime<Utc>,
    subtopics: SubtopicBreakdown,
}

impl AttemptRecord {
    /// Freeze the given score and a deep copy of the breakdown.
    #[must_use]
    pub(crate) fn capture(
        score: FinalScore,
        subtopics: &SubtopicBreakdown,
        practice_date: DateTime<Utc>,
    ) -> Self {
        Self {
            score_percentage: score.percentage,
            score_correct: score.correct,
            score_total: score.total,
            practice_date,
            subtopics: subtopics.clone(),
        }
    }

    /// Rehydrate an attempt record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if counts or the stored percentage are
    /// inconsistent.
    pub fn from_persisted(
        score_percentage: u8,
        score_correct: u32,
        score_total: u32,
        practice_date: DateTime<Utc>,
        subtopics: SubtopicBreakdown,
    ) -> Result<Self, AttemptError> {
        let record = Self {
            score_percentage,
            score_correct,
            score_total,
            practice_date,
            subtopics,
        };
        record.validate()?;
        Ok(record)
    }

    /// Re-check score consistency, e.g. after deserialization.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the percentage is out of range or does not
    /// match the stored counts.
    pub fn validate(&self) -> Result<(), AttemptError> {
        if self.score_percentage > 100 {
            return Err(AttemptError::PercentageOutOfRange {
                got: self.score_percentage,
            });
        }
        if self.score_correct > self.score_total {
            return Err(AttemptError::CorrectExceedsTotal {
                correct: self.score_correct,
                total: self.score_total,
            });
        }
        let computed = FinalScore::from_counts(self.score_correct, self.score_total).percentage;
        if computed != self.score_percentage {
            return Err(AttemptError::PercentageMismatch {
                stored: self.score_percentage,
                computed,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn score_percentage(&self) -> u8 {
        self.score_percentage
    }

    #[must_use]
    pub fn score_correct(&self) -> u32 {
        self.score_correct
    }

    #[must_use]
    pub fn score_total(&self) -> u32 {
        self.score_total
    }

    #[must_use]
    pub fn practice_date(&self) -> DateTime<Utc> {
        self.practice_date
    }

    /// The subtopic breakdown as it stood at completion time.
    #[must_use]
    pub fn subtopics(&self) -> &SubtopicBreakdown {
        &self.subtopics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(FinalScore::from_counts(6, 10).percentage, 60);
        assert_eq!(FinalScore::from_counts(1, 3).percentage, 33);
        assert_eq!(FinalScore::from_counts(2, 3).percentage, 67);
        assert_eq!(FinalScore::from_counts(1, 8).percentage, 13);
        assert_eq!(FinalScore::from_counts(10, 10).percentage, 100);
    }

    #[test]
    fn empty_list_scores_zero_without_dividing() {
        let score = FinalScore::from_counts(0, 0);
        assert_eq!(score.percentage, 0);
        assert_eq!(score.correct, 0);
        assert_eq!(score.total, 0);
    }

    #[test]
    fn capture_freezes_breakdown_copy() {
        let breakdown = SubtopicBreakdown::default();
        let score = FinalScore::from_counts(3, 4);
        let record = AttemptRecord::capture(score, &breakdown, fixed_now());

        assert_eq!(record.score_percentage(), 75);
        assert_eq!(record.score_correct(), 3);
        assert_eq!(record.score_total(), 4);
        assert_eq!(record.practice_date(), fixed_now());
        assert_eq!(record.subtopics(), &breakdown);
    }

    #[test]
    fn from_persisted_rejects_percentage_over_100() {
        let err = AttemptRecord::from_persisted(
            101,
            1,
            1,
            fixed_now(),
            SubtopicBreakdown::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AttemptError::PercentageOutOfRange { got: 101 }));
    }

    #[test]
    fn from_persisted_rejects_correct_above_total() {
        let err = AttemptRecord::from_persisted(
            100,
            5,
            4,
            fixed_now(),
            SubtopicBreakdown::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AttemptError::CorrectExceedsTotal { .. }));
    }

    #[test]
    fn from_persisted_rejects_mismatched_percentage() {
        let err = AttemptRecord::from_persisted(
            50,
            6,
            10,
            fixed_now(),
            SubtopicBreakdown::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AttemptError::PercentageMismatch {
                stored: 50,
                computed: 60
            }
        );
    }
}
