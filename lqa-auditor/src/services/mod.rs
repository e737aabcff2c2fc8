//! Audit services
//!
//! - Lifecycle driver ([`AuditStateMachine`])
//! - Blocked-page screenshot classification
//! - Prompt construction
//! - Progress fan-out over the event bus

pub mod audit_state_machine;
pub mod blocked_page_guard;
pub mod progress;
pub mod prompt;

pub use audit_state_machine::{truncate_message, AuditStateMachine, NO_CONTENT_MESSAGE};
pub use blocked_page_guard::{parse_verdict, BlockVerdict, BlockedPageGuard};
pub use progress::EventBusProgressSink;
