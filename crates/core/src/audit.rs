//! Audit trail for borrow conversations.
//!
//! Events are fire-and-forget: a sink must never fail the workflow that emits
//! into it. The server logs them, tests collect them in an [`AuditLog`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    TransitionApplied,
    TransitionRejected,
    ReservationCreated,
    ReservationFailed,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransitionApplied => "flow.transition_applied",
            Self::TransitionRejected => "flow.transition_rejected",
            Self::ReservationCreated => "reservation.created",
            Self::ReservationFailed => "reservation.create_failed",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::TransitionRejected | Self::ReservationFailed)
    }
}

/// Who and which request an event belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditScope {
    pub user_id: String,
    pub channel_id: String,
    pub correlation_id: String,
}

impl AuditScope {
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn record(&self, kind: AuditKind) -> AuditEvent {
        AuditEvent {
            event_id: Uuid::new_v4(),
            kind,
            user_id: self.user_id.clone(),
            channel_id: self.channel_id.clone(),
            correlation_id: self.correlation_id.clone(),
            details: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub kind: AuditKind,
    pub user_id: String,
    pub channel_id: String,
    pub correlation_id: String,
    pub details: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_owned(), value.to_string());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

/// Keeps every event in memory. Clones share the same log.
#[derive(Clone, Default)]
pub struct AuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditLog {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_else(|poisoned| {
            poisoned.into_inner().clone()
        })
    }

    pub fn count(&self, kind: AuditKind) -> usize {
        self.events().iter().filter(|event| event.kind == kind).count()
    }
}

impl AuditSink for AuditLog {
    fn emit(&self, event: AuditEvent) {
        let mut events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }
}
