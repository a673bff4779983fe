use thiserror::Error;

use crate::model::{AttemptError, QuestionError, SessionError, SubtopicError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Subtopic(#[from] SubtopicError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
