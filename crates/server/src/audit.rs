use tracing::{info, warn};

use lagertool_core::audit::{AuditEvent, AuditSink};

/// Writes audit events to the structured log stream. Failures go out at warn.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let kind = event.kind.as_str();
        if event.kind.is_failure() {
            warn!(
                event_name = "audit.event",
                audit_kind = kind,
                audit_event_id = %event.event_id,
                correlation_id = %event.correlation_id,
                user_id = %event.user_id,
                channel_id = %event.channel_id,
                details = ?event.details,
                "audit event"
            );
        } else {
            info!(
                event_name = "audit.event",
                audit_kind = kind,
                audit_event_id = %event.event_id,
                correlation_id = %event.correlation_id,
                user_id = %event.user_id,
                channel_id = %event.channel_id,
                details = ?event.details,
                "audit event"
            );
        }
    }
}
