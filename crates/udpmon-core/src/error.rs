//! Domain-specific error types following panic-free policy.

use crate::{MachineId, SessionName};
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Machine identity has never been announced
    #[error("Machine not found: {machine_id}")]
    MachineNotFound { machine_id: MachineId },

    /// Session name has no current roster
    #[error("Session not found: {session}")]
    SessionNotFound { session: SessionName },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
