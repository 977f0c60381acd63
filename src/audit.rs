//! Structured audit event emission (spec 4.11).

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: String,
    pub actor: Option<String>,
    pub resource: Option<String>,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            actor: None,
            resource: None,
            metadata: Value::Null,
        }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Emission is sync and non-blocking by contract; a sink needing I/O spawns
/// its own task rather than stalling the caller.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Default sink: logs every event at `info!`, matching the host
/// application's "log, don't block" posture.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            target: "authkeep.audit",
            event = %event.event,
            actor = event.actor.as_deref().unwrap_or(""),
            resource = event.resource.as_deref().unwrap_or(""),
            "audit event"
        );
    }
}

/// No-op sink for tests that assert on emission counts independently of
/// global tracing state.
#[derive(Default)]
pub struct NullAuditSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl AuditSink for NullAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl NullAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}
