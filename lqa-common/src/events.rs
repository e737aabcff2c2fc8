//! Event types for the LQA event system
//!
//! Provides audit event definitions and the EventBus used to publish them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Audit event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to whatever surface renders audit progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// Step-level progress of a running audit
    AuditProgress {
        /// Audit job UUID
        audit_id: Uuid,
        /// Human-readable description of the current step
        message: String,
        /// Current step (1-based, non-decreasing within one run)
        step: u32,
        /// Total number of steps in a run
        total: u32,
        /// When the progress was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Audit lifecycle status changed
    AuditStatusChanged {
        /// Audit job UUID
        audit_id: Uuid,
        /// Status before change (SCREAMING_SNAKE_CASE name)
        old_status: String,
        /// Status after change
        new_status: String,
        /// When status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AuditEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &str {
        match self {
            AuditEvent::AuditProgress { .. } => "AuditProgress",
            AuditEvent::AuditStatusChanged { .. } => "AuditStatusChanged",
        }
    }

    /// Audit the event belongs to
    pub fn audit_id(&self) -> Uuid {
        match self {
            AuditEvent::AuditProgress { audit_id, .. }
            | AuditEvent::AuditStatusChanged { audit_id, .. } => *audit_id,
        }
    }
}

/// Broadcast bus for audit events
///
/// Cloning is cheap; all clones share the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuditEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use lqa_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AuditEvent,
    ) -> Result<usize, broadcast::error::SendError<AuditEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// # Examples
    ///
    /// ```
    /// use lqa_common::events::{AuditEvent, EventBus};
    /// use uuid::Uuid;
    ///
    /// let event_bus = EventBus::new(100);
    ///
    /// // Progress updates - OK if no one is listening
    /// event_bus.emit_lossy(AuditEvent::AuditProgress {
    ///     audit_id: Uuid::new_v4(),
    ///     message: "Running analysis".to_string(),
    ///     step: 3,
    ///     total: 4,
    ///     timestamp: chrono::Utc::now(),
    /// });
    /// ```
    pub fn emit_lossy(&self, event: AuditEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
