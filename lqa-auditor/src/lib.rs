//! lqa-auditor library interface
//!
//! Localization quality audit core: recovery of structured scores from model
//! output and the audit lifecycle built around it.

pub mod db;
pub mod error;
pub mod models;
pub mod recovery;
pub mod services;
pub mod types;
pub mod utils;

pub use crate::error::{AuditError, AuditResult};
pub use crate::services::AuditStateMachine;
