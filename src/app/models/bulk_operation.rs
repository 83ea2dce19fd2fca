use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::app::models::DieselUlid;
use crate::schema::{bulk_operation_errors, bulk_operations};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationKind {
    Enroll,
    Verify,
    Delete,
    Upgrade,
}

impl BulkOperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkOperationKind::Enroll => "enroll",
            BulkOperationKind::Verify => "verify",
            BulkOperationKind::Delete => "delete",
            BulkOperationKind::Upgrade => "upgrade",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "enroll" => BulkOperationKind::Enroll,
            "verify" => BulkOperationKind::Verify,
            "delete" => BulkOperationKind::Delete,
            "upgrade" => BulkOperationKind::Upgrade,
            _ => return None,
        })
    }
}

impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for BulkOperationKind {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
    ) -> diesel::serialize::Result {
        use std::io::Write;
        out.write_all(self.as_str().as_bytes())?;
        Ok(diesel::serialize::IsNull::No)
    }
}

impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for BulkOperationKind {
    fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
        let s = <String as diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg>>::from_sql(bytes)?;
        BulkOperationKind::from_str(&s).ok_or_else(|| format!("unknown bulk operation kind: {s}").into())
    }
}

/// Worker-pool progress state (spec §4.6), grounded on the teacher's
/// `WorkerStats`/queue-job status shape in `app/jobs/queue_worker.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationState {
    Queued,
    Running,
    Cancelling,
    Cancelled,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl BulkOperationState {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkOperationState::Queued => "queued",
            BulkOperationState::Running => "running",
            BulkOperationState::Cancelling => "cancelling",
            BulkOperationState::Cancelled => "cancelled",
            BulkOperationState::Completed => "completed",
            BulkOperationState::PartiallyCompleted => "partially_completed",
            BulkOperationState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => BulkOperationState::Queued,
            "running" => BulkOperationState::Running,
            "cancelling" => BulkOperationState::Cancelling,
            "cancelled" => BulkOperationState::Cancelled,
            "completed" => BulkOperationState::Completed,
            "partially_completed" => BulkOperationState::PartiallyCompleted,
            "failed" => BulkOperationState::Failed,
            _ => return None,
        })
    }

    /// Derives the terminal state from a finished run's tallies (spec §4.6:
    /// `COMPLETED` if all succeed, `PARTIALLY_COMPLETED` if some fail,
    /// `FAILED` if all fail, `CANCELLED` if cancelled).
    pub fn from_tally(cancelled: bool, succeeded: i32, failed: i32) -> Self {
        if cancelled {
            BulkOperationState::Cancelled
        } else if failed == 0 {
            BulkOperationState::Completed
        } else if succeeded == 0 {
            BulkOperationState::Failed
        } else {
            BulkOperationState::PartiallyCompleted
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BulkOperationState::Cancelled
                | BulkOperationState::Completed
                | BulkOperationState::PartiallyCompleted
                | BulkOperationState::Failed
        )
    }
}

impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for BulkOperationState {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
    ) -> diesel::serialize::Result {
        use std::io::Write;
        out.write_all(self.as_str().as_bytes())?;
        Ok(diesel::serialize::IsNull::No)
    }
}

impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for BulkOperationState {
    fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
        let s = <String as diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg>>::from_sql(bytes)?;
        BulkOperationState::from_str(&s).ok_or_else(|| format!("unknown bulk operation state: {s}").into())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = bulk_operations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BulkOperation {
    pub id: DieselUlid,
    pub realm: String,
    pub kind: BulkOperationKind,
    pub state: BulkOperationState,
    pub submitted_by: String,
    pub total: i32,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bulk_operations)]
pub struct NewBulkOperation {
    pub id: DieselUlid,
    pub realm: String,
    pub kind: BulkOperationKind,
    pub state: BulkOperationState,
    pub submitted_by: String,
    pub total: i32,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewBulkOperation {
    pub fn new(realm: String, kind: BulkOperationKind, submitted_by: String, total: usize) -> Self {
        let now = Utc::now();
        NewBulkOperation {
            id: DieselUlid::new(),
            realm,
            kind,
            state: BulkOperationState::Queued,
            submitted_by,
            total: total as i32,
            processed: 0,
            succeeded: 0,
            failed: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One row per failed item in a bulk operation (spec §4.6 `errors[]`,
/// persisted per the bulk-error-retention supplement in SPEC_FULL.md §3).
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = bulk_operation_errors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BulkOperationError {
    pub id: DieselUlid,
    pub bulk_operation_id: DieselUlid,
    pub item_index: i32,
    pub user_id: String,
    pub reason: String,
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bulk_operation_errors)]
pub struct NewBulkOperationError {
    pub id: DieselUlid,
    pub bulk_operation_id: DieselUlid,
    pub item_index: i32,
    pub user_id: String,
    pub reason: String,
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
}

impl NewBulkOperationError {
    pub fn new(bulk_operation_id: DieselUlid, item_index: usize, user_id: String, reason: String, retryable: bool) -> Self {
        NewBulkOperationError {
            id: DieselUlid::new(),
            bulk_operation_id,
            item_index: item_index as i32,
            user_id,
            reason,
            retryable,
            created_at: Utc::now(),
        }
    }
}
