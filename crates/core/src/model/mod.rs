mod attempt;
mod ids;
mod question;
mod session;
mod subtopic;

pub use attempt::{AttemptError, AttemptRecord, FinalScore};
pub use ids::{ParseIdError, QuestionId, SessionId, UserId, UserIdError};
pub use question::{GENERAL_SUBTOPIC, Question, QuestionDraft, QuestionError};
pub use session::{AnswerOutcome, SessionError, StudySession};
pub use subtopic::{SubtopicBreakdown, SubtopicError, SubtopicPerformance};
