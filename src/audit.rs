use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit record (spec §4.7). Field list matches what the spec names
/// verbatim; shape is grounded on the teacher's `ActivityLogService`/
/// `activity_log` table (`causer_type`/`causer_id`/`properties`), adapted
/// to the names this spec actually uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub realm: String,
    pub user_id: String,
    pub operation: String,
    pub actor: String,
    pub remote_address: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    pub outcome: String,
    pub reason: Option<String>,
    pub properties: Value,
}

pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEvent {
    pub fn builder(realm: impl Into<String>, user_id: impl Into<String>, operation: impl Into<String>, actor: impl Into<String>) -> AuditEventBuilder {
        AuditEventBuilder {
            event: AuditEvent {
                realm: realm.into(),
                user_id: user_id.into(),
                operation: operation.into(),
                actor: actor.into(),
                remote_address: None,
                session_id: None,
                correlation_id: uuid::Uuid::new_v4(),
                timestamp: Utc::now(),
                outcome: "unknown".to_string(),
                reason: None,
                properties: Value::Null,
            },
        }
    }
}

impl AuditEventBuilder {
    pub fn remote_address(mut self, addr: impl Into<String>) -> Self {
        self.event.remote_address = Some(addr.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.event.session_id = Some(session_id.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: uuid::Uuid) -> Self {
        self.event.correlation_id = correlation_id;
        self
    }

    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.event.outcome = outcome.into();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.event.reason = Some(reason.into());
        self
    }

    pub fn properties(mut self, properties: Value) -> Self {
        self.event.properties = properties;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_outcome_to_unknown() {
        let event = AuditEvent::builder("realm-1", "user-1", "verify", "system").build();
        assert_eq!(event.outcome, "unknown");
        assert_eq!(event.realm, "realm-1");
    }

    #[test]
    fn builder_applies_overrides() {
        let event = AuditEvent::builder("realm-1", "user-1", "verify", "system")
            .outcome("success")
            .reason("matched")
            .remote_address("127.0.0.1")
            .build();
        assert_eq!(event.outcome, "success");
        assert_eq!(event.reason.as_deref(), Some("matched"));
        assert_eq!(event.remote_address.as_deref(), Some("127.0.0.1"));
    }
}
