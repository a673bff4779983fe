#![forbid(unsafe_code)]

pub mod auth;
pub mod billing;
pub mod error;
pub mod generator;
pub mod sessions;

pub use lunora_core::Clock;

pub use auth::AuthContext;
pub use error::{GeneratorError, SessionSyncError};
pub use generator::{GeneratorConfig, QuestionGenerator};
pub use sessions::{AnswerFeedback, SessionProgress, SessionSyncService};
