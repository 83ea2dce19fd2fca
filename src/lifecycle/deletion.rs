use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;

use crate::app::models::{DeletionPriority, DeletionRequest, DeletionRequestState, DieselUlid, NewDeletionRequest};
use crate::app::traits::{CredentialStore, EventSink};
use crate::audit::AuditEvent;
use crate::database::DbPool;
use crate::error::{CoreError, CoreResult};
use crate::rpc::BwsClient;
use crate::schema::deletion_requests;

/// GDPR erasure request workflow (spec §4.5.2). Requests are queued here and
/// only actually erase the BWS template + host record once an operator moves
/// a request into `IN_PROGRESS`.
pub struct DeletionRequestService {
    pool: DbPool,
    bws: Arc<BwsClient>,
    store: Arc<dyn CredentialStore>,
    sink: Arc<dyn EventSink>,
}

impl DeletionRequestService {
    pub fn new(pool: DbPool, bws: Arc<BwsClient>, store: Arc<dyn CredentialStore>, sink: Arc<dyn EventSink>) -> Self {
        DeletionRequestService { pool, bws, store, sink }
    }

    pub async fn create(&self, realm: &str, user_id: &str, requested_by: &str, reason: Option<String>) -> CoreResult<DeletionRequest> {
        let new_request = NewDeletionRequest::new(realm.to_string(), user_id.to_string(), requested_by.to_string(), reason.clone());
        let mut conn = self.connection()?;

        let request: DeletionRequest = diesel::insert_into(deletion_requests::table)
            .values(&new_request)
            .get_result(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))?;

        crate::metrics::record_deletion_request(realm, "created");
        self.sink
            .emit(
                AuditEvent::builder(realm, user_id, "deletion_request_create", requested_by)
                    .outcome("success")
                    .reason(reason.unwrap_or_default())
                    .build(),
            )
            .await;

        Ok(request)
    }

    pub fn escalate(&self, id: &str) -> CoreResult<DeletionRequest> {
        let mut conn = self.connection()?;
        let uid = DieselUlid::from_string(id).map_err(|e| CoreError::Conflict(e.to_string()))?;

        diesel::update(deletion_requests::table.find(uid))
            .set((
                deletion_requests::priority.eq(DeletionPriority::Escalated),
                deletion_requests::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))
    }

    pub fn list(&self, realm: &str, state: Option<DeletionRequestState>) -> CoreResult<Vec<DeletionRequest>> {
        let mut conn = self.connection()?;
        let mut query = deletion_requests::table.filter(deletion_requests::realm.eq(realm)).into_boxed();
        if let Some(state) = state {
            query = query.filter(deletion_requests::state.eq(state));
        }
        query.load(&mut conn).map_err(|e| CoreError::Conflict(e.to_string()))
    }

    pub async fn approve(&self, id: &str, decided_by: &str, note: Option<String>) -> CoreResult<DeletionRequest> {
        let request = self.transition(id, DeletionRequestState::Approved, decided_by, note).await?;
        crate::metrics::record_deletion_request(&request.realm, "approved");
        Ok(request)
    }

    pub async fn decline(&self, id: &str, decided_by: &str, note: Option<String>) -> CoreResult<DeletionRequest> {
        let request = self.transition(id, DeletionRequestState::Declined, decided_by, note).await?;
        crate::metrics::record_deletion_request(&request.realm, "declined");
        Ok(request)
    }

    pub async fn cancel(&self, id: &str, decided_by: &str) -> CoreResult<DeletionRequest> {
        self.transition(id, DeletionRequestState::Cancelled, decided_by, None).await
    }

    /// Moves an approved request into `IN_PROGRESS`, calls BWS to delete the
    /// template and the host's credential record, then marks the request
    /// `COMPLETED` or `FAILED` depending on the outcome.
    pub async fn process(&self, id: &str, operator: &str) -> CoreResult<DeletionRequest> {
        let request = self.transition(id, DeletionRequestState::InProgress, operator, None).await?;

        let record = self.store.get(&request.realm, &request.user_id).await.map_err(|e| CoreError::Conflict(e.to_string()))?;

        let erasure = async {
            if let Some(record) = &record {
                // AlreadyAbsent is treated identically to Deleted here: either way
                // the BWS template is gone, so the credential purge below proceeds.
                self.bws.delete_template(&request.realm, record.template_id, None).await?;
            }
            self.store
                .delete(&request.realm, &request.user_id)
                .await
                .map_err(|e| CoreError::Conflict(e.to_string()))
        }
        .await;

        let (final_state, reason) = match &erasure {
            Ok(()) => (DeletionRequestState::Completed, None),
            Err(err) => (DeletionRequestState::Failed, Some(err.to_string())),
        };

        let completed = self.finish(&request.id.to_string(), final_state)?;
        if final_state == DeletionRequestState::Completed {
            crate::metrics::record_deletion_request(&request.realm, "completed");
        }

        self.sink
            .emit(
                AuditEvent::builder(&request.realm, &request.user_id, "deletion_process", operator)
                    .outcome(if final_state == DeletionRequestState::Completed { "success" } else { "failed" })
                    .reason(reason.unwrap_or_default())
                    .build(),
            )
            .await;

        erasure?;
        Ok(completed)
    }

    /// Applies a guarded state-machine move (spec §4.5 state machine) and
    /// emits one audit event per transition, successful or not.
    async fn transition(&self, id: &str, next: DeletionRequestState, decided_by: &str, note: Option<String>) -> CoreResult<DeletionRequest> {
        let mut conn = self.connection()?;
        let uid = DieselUlid::from_string(id).map_err(|e| CoreError::Conflict(e.to_string()))?;

        let current: DeletionRequest = deletion_requests::table
            .find(uid)
            .first(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))?;

        if !current.state.can_transition_to(next) {
            return Err(CoreError::Conflict(format!("cannot move {:?} to {:?}", current.state, next)));
        }

        let updated: DeletionRequest = diesel::update(deletion_requests::table.find(uid))
            .set((
                deletion_requests::state.eq(next),
                deletion_requests::decided_by.eq(Some(decided_by.to_string())),
                deletion_requests::decision_note.eq(note.clone()),
                deletion_requests::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))?;

        self.sink
            .emit(
                AuditEvent::builder(&updated.realm, &updated.user_id, "deletion_request_transition", decided_by)
                    .outcome("success")
                    .reason(note.unwrap_or_else(|| format!("{:?} -> {:?}", current.state, next)))
                    .build(),
            )
            .await;

        Ok(updated)
    }

    fn finish(&self, id: &str, state: DeletionRequestState) -> CoreResult<DeletionRequest> {
        let mut conn = self.connection()?;
        let uid = DieselUlid::from_string(id).map_err(|e| CoreError::Conflict(e.to_string()))?;
        let now = Utc::now();

        diesel::update(deletion_requests::table.find(uid))
            .set((
                deletion_requests::state.eq(state),
                deletion_requests::updated_at.eq(now),
                deletion_requests::completed_at.eq(Some(now)),
            ))
            .get_result(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))
    }

    fn connection(&self) -> CoreResult<crate::database::DbConnection> {
        self.pool.get().map_err(|e| {
            tracing::warn!(error = %e, "database pool exhausted");
            CoreError::Busy
        })
    }
}
