//! Structured audit events and the append-only trail that collects them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};

use crate::events::{EventBus, Subscription};

/// One audit record. There is no update or delete operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Type tag, e.g. `escrow_created`, `status_changed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
    /// Originating component, e.g. `tessera-escrow`.
    pub component: String,
    /// Numeric layer / severity of the originating component.
    pub layer: u8,
    /// Free-form details.
    pub details: Map<String, Value>,
}

impl AuditEvent {
    /// Build an event stamped with the current time.
    ///
    /// `details` should be a JSON object; any other value is stored under a
    /// single `value` key.
    pub fn new(
        event_type: impl Into<String>,
        component: impl Into<String>,
        layer: u8,
        details: Value,
    ) -> Self {
        let details = match details {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            component: component.into(),
            layer,
            details,
        }
    }

    /// ISO-8601 rendering of the timestamp.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

/// Component events that can be rendered as an audit record.
pub trait Auditable {
    fn audit_event(&self) -> AuditEvent;
}

/// Append-only, in-process audit trail.
///
/// Attach it to any component's [`EventBus`]; every event is converted to
/// an [`AuditEvent`], logged through `tracing`, and appended.
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: RwLock<Vec<AuditEvent>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "tessera::audit",
            event_type = %event.event_type,
            component = %event.component,
            layer = event.layer,
            details = %serde_json::Value::Object(event.details.clone()),
            "audit event"
        );
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Subscribe this trail to a component's event bus.
    pub fn attach<E>(self: &Arc<Self>, bus: &EventBus<E>) -> Subscription
    where
        E: Auditable + 'static,
    {
        let trail = Arc::clone(self);
        bus.subscribe(move |event: &E| trail.record(event.audit_event()))
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events with the given type tag.
    pub fn by_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export as JSON lines for archival.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let events = self.events();
        let mut out = String::new();
        for event in &events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}
