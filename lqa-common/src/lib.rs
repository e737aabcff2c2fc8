//! # LQA Common Library
//!
//! Shared code for the localization quality auditor crates:
//! - Error types
//! - Audit event types and the broadcast event bus
//! - Bootstrap configuration loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{AuditEvent, EventBus};
