use thiserror::Error;
use validator::ValidationErrors;

use crate::state::status::InvalidTransition;

/// Typed failure returned by every session command.
///
/// Duplicate-style situations (a second answer for the same question, a
/// repeat guess from a team that already found the word, a redundant drawing
/// upload) are deliberately NOT errors: they resolve to no-op successes
/// carried by the command's receipt type, so client retries stay idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Unknown session, participant, or question.
    #[error("not found: {0}")]
    NotFound(String),
    /// Command is illegal for the session's current status or phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Start requirements are not met (teams or content units).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// The actor lacks the role the command requires.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Malformed input (empty names, out-of-range configuration values).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ValidationErrors> for CommandError {
    fn from(err: ValidationErrors) -> Self {
        CommandError::InvalidInput(format!("validation failed: {err}"))
    }
}

impl From<InvalidTransition> for CommandError {
    fn from(err: InvalidTransition) -> Self {
        CommandError::InvalidState(err.to_string())
    }
}
