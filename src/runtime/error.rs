//! Errors surfaced by the session runtime

use crate::llm::ProviderError;
use crate::state_machine::TransitionError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CourtError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not interruptible: {0}")]
    NotInterruptible(String),
    #[error("A directive is already pending for the current turn")]
    DirectiveAlreadyPending,
    #[error("Provider failure: {0}")]
    ProviderFailure(#[from] ProviderError),
    /// The executor found the turn slot already occupied
    #[error("Validator inconsistency: {0}")]
    ValidatorInconsistency(String),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session already exists: {0}")]
    SessionExists(String),
}

impl CourtError {
    /// Whether the error ended the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, CourtError::ProviderFailure(_))
    }
}
