//! Progress reporting over the shared event bus

use lqa_common::events::{AuditEvent, EventBus};
use uuid::Uuid;

use crate::models::AuditStatus;
use crate::types::ProgressSink;

/// [`ProgressSink`] publishing [`AuditEvent`]s
///
/// Events are emitted lossily: having no subscriber is not an error.
#[derive(Clone)]
pub struct EventBusProgressSink {
    bus: EventBus,
}

impl EventBusProgressSink {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl ProgressSink for EventBusProgressSink {
    fn report(&self, audit_id: Uuid, message: &str, step: u32, total: u32) {
        self.bus.emit_lossy(AuditEvent::AuditProgress {
            audit_id,
            message: message.to_string(),
            step,
            total,
            timestamp: chrono::Utc::now(),
        });
    }

    fn status_changed(&self, audit_id: Uuid, old: AuditStatus, new: AuditStatus) {
        self.bus.emit_lossy(AuditEvent::AuditStatusChanged {
            audit_id,
            old_status: old.as_str().to_string(),
            new_status: new.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}
