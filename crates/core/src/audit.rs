use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::inquiry::InquiryId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Flow,
    Narrative,
    Persistence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub inquiry_id: Option<InquiryId>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        inquiry_id: Option<InquiryId>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { inquiry_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }

    pub fn for_inquiry(&self, inquiry_id: &InquiryId) -> Self {
        Self { inquiry_id: Some(inquiry_id.clone()), ..self.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub inquiry_id: Option<InquiryId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        inquiry_id: Option<InquiryId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            inquiry_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Forwards audit events to the `tracing` pipeline.
#[derive(Clone, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let inquiry_id = event.inquiry_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown");
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                inquiry_id = %inquiry_id,
                actor = %event.actor,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => tracing::warn!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                inquiry_id = %inquiry_id,
                actor = %event.actor,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
