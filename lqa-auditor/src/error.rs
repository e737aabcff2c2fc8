//! Errors returned to callers of the audit state machine
//!
//! Collaborator failures (acquisition, model calls, unrecoverable output)
//! never surface here; they end the run in FAILED. Only problems with the
//! request itself or with persistence are reported to the caller.

use thiserror::Error;
use uuid::Uuid;

use crate::models::IllegalTransition;

#[derive(Debug, Error)]
pub enum AuditError {
    /// No job stored under this id
    #[error("Audit not found: {0}")]
    NotFound(Uuid),

    /// Operation not permitted in the job's current status
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// Store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] lqa_common::Error),
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;
