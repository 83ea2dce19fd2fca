use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::app::models::DieselUlid;
use crate::schema::deletion_requests;

/// GDPR erasure request lifecycle (spec §3.1, §4.5.2).
///
/// `PENDING` -> `APPROVED` | `DECLINED` | `CANCELLED`
/// `APPROVED` -> `IN_PROGRESS` -> `COMPLETED` | `FAILED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeletionRequestState {
    Pending,
    Approved,
    Declined,
    Cancelled,
    InProgress,
    Completed,
    Failed,
}

impl DeletionRequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionRequestState::Pending => "PENDING",
            DeletionRequestState::Approved => "APPROVED",
            DeletionRequestState::Declined => "DECLINED",
            DeletionRequestState::Cancelled => "CANCELLED",
            DeletionRequestState::InProgress => "IN_PROGRESS",
            DeletionRequestState::Completed => "COMPLETED",
            DeletionRequestState::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "PENDING" => DeletionRequestState::Pending,
            "APPROVED" => DeletionRequestState::Approved,
            "DECLINED" => DeletionRequestState::Declined,
            "CANCELLED" => DeletionRequestState::Cancelled,
            "IN_PROGRESS" => DeletionRequestState::InProgress,
            "COMPLETED" => DeletionRequestState::Completed,
            "FAILED" => DeletionRequestState::Failed,
            _ => return None,
        })
    }

    /// Whether `next` is a legal transition from `self` (spec §4.5.2 state machine).
    pub fn can_transition_to(self, next: DeletionRequestState) -> bool {
        use DeletionRequestState::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Declined)
                | (Pending, Cancelled)
                | (Approved, InProgress)
                | (Approved, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeletionRequestState::Declined
                | DeletionRequestState::Cancelled
                | DeletionRequestState::Completed
                | DeletionRequestState::Failed
        )
    }
}

impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for DeletionRequestState {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
    ) -> diesel::serialize::Result {
        use std::io::Write;
        out.write_all(self.as_str().as_bytes())?;
        Ok(diesel::serialize::IsNull::No)
    }
}

impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for DeletionRequestState {
    fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
        let s = <String as diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg>>::from_sql(bytes)?;
        DeletionRequestState::from_str(&s).ok_or_else(|| format!("unknown deletion request state: {s}").into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPriority {
    Normal,
    Escalated,
}

impl DeletionPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionPriority::Normal => "normal",
            DeletionPriority::Escalated => "escalated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "normal" => DeletionPriority::Normal,
            "escalated" => DeletionPriority::Escalated,
            _ => return None,
        })
    }
}

impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for DeletionPriority {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
    ) -> diesel::serialize::Result {
        use std::io::Write;
        out.write_all(self.as_str().as_bytes())?;
        Ok(diesel::serialize::IsNull::No)
    }
}

impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for DeletionPriority {
    fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
        let s = <String as diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg>>::from_sql(bytes)?;
        DeletionPriority::from_str(&s).ok_or_else(|| format!("unknown deletion priority: {s}").into())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = deletion_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeletionRequest {
    pub id: DieselUlid,
    pub realm: String,
    pub user_id: String,
    pub state: DeletionRequestState,
    pub priority: DeletionPriority,
    pub reason: Option<String>,
    pub requested_by: String,
    pub decided_by: Option<String>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = deletion_requests)]
pub struct NewDeletionRequest {
    pub id: DieselUlid,
    pub realm: String,
    pub user_id: String,
    pub state: DeletionRequestState,
    pub priority: DeletionPriority,
    pub reason: Option<String>,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewDeletionRequest {
    pub fn new(realm: String, user_id: String, requested_by: String, reason: Option<String>) -> Self {
        let now = Utc::now();
        NewDeletionRequest {
            id: DieselUlid::new(),
            realm,
            user_id,
            state: DeletionRequestState::Pending,
            priority: DeletionPriority::Normal,
            reason,
            requested_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_allows_approve_decline_cancel_only() {
        let p = DeletionRequestState::Pending;
        assert!(p.can_transition_to(DeletionRequestState::Approved));
        assert!(p.can_transition_to(DeletionRequestState::Declined));
        assert!(p.can_transition_to(DeletionRequestState::Cancelled));
        assert!(!p.can_transition_to(DeletionRequestState::InProgress));
        assert!(!p.can_transition_to(DeletionRequestState::Completed));
    }

    #[test]
    fn approved_allows_in_progress_or_cancel() {
        let a = DeletionRequestState::Approved;
        assert!(a.can_transition_to(DeletionRequestState::InProgress));
        assert!(a.can_transition_to(DeletionRequestState::Cancelled));
        assert!(!a.can_transition_to(DeletionRequestState::Completed));
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        for terminal in [
            DeletionRequestState::Declined,
            DeletionRequestState::Cancelled,
            DeletionRequestState::Completed,
            DeletionRequestState::Failed,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(DeletionRequestState::Pending));
        }
    }

    #[test]
    fn state_round_trips_through_str() {
        for s in [
            DeletionRequestState::Pending,
            DeletionRequestState::Approved,
            DeletionRequestState::Declined,
            DeletionRequestState::Cancelled,
            DeletionRequestState::InProgress,
            DeletionRequestState::Completed,
            DeletionRequestState::Failed,
        ] {
            assert_eq!(DeletionRequestState::from_str(s.as_str()), Some(s));
        }
    }
}
