use async_trait::async_trait;

use crate::audit::AuditEvent;

/// Where audit events (spec §4.7) and metrics-adjacent signals leave the
/// core. The host decides whether that means a database table, a message
/// bus, or both; the core never assumes either.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: AuditEvent);
}

/// Reference sink that routes every event through `tracing`, matching the
/// way the teacher logs structured fields at `info!`/`warn!` call sites.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: AuditEvent) {
        tracing::info!(
            realm = %event.realm,
            user_id = %event.user_id,
            operation = %event.operation,
            outcome = %event.outcome,
            reason = event.reason.as_deref().unwrap_or(""),
            correlation_id = %event.correlation_id,
            "audit event"
        );
    }
}
