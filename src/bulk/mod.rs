use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use diesel::prelude::*;
use tokio::sync::Semaphore;

use crate::app::models::{
    BulkOperation, BulkOperationKind, BulkOperationState, DieselUlid, NewBulkOperation, NewBulkOperationError,
};
use crate::config::BulkConfig;
use crate::database::DbPool;
use crate::error::{CoreError, CoreResult};
use crate::schema::{bulk_operation_errors, bulk_operations};

/// Per-item work, supplied by the caller so the engine stays agnostic to
/// what `enroll`/`verify`/`delete`/`upgrade` actually do (the engine itself
/// only owns concurrency, progress, cancellation, and error persistence).
/// Grounded on the teacher's `JobFactory`/`Job` split in
/// `app/jobs/queue_worker.rs`: the worker pool is generic, the job body isn't.
pub type ItemHandler = Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send>> + Send + Sync>;

/// Bounded worker pool running a bulk enroll/verify/delete/upgrade batch
/// (spec §4.6): concurrency capped by `BulkConfig::max_concurrent_workers`,
/// each item bounded by `per_item_timeout`, cancellable mid-run.
pub struct BulkOperationEngine {
    config: BulkConfig,
    pool: DbPool,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl BulkOperationEngine {
    pub fn new(config: BulkConfig, pool: DbPool) -> Self {
        BulkOperationEngine {
            config,
            pool,
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn submit(&self, realm: &str, kind: BulkOperationKind, submitted_by: &str, item_count: usize) -> CoreResult<BulkOperation> {
        if item_count > self.config.max_batch_size {
            return Err(CoreError::Conflict(format!(
                "batch of {item_count} items exceeds max_batch_size {}",
                self.config.max_batch_size
            )));
        }

        let new_operation = NewBulkOperation::new(realm.to_string(), kind, submitted_by.to_string(), item_count);
        let mut conn = self.connection()?;

        diesel::insert_into(bulk_operations::table)
            .values(&new_operation)
            .get_result(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))
    }

    pub fn status(&self, operation_id: &str) -> CoreResult<BulkOperation> {
        let mut conn = self.connection()?;
        let uid = DieselUlid::from_string(operation_id).map_err(|e| CoreError::Conflict(e.to_string()))?;
        bulk_operations::table
            .find(uid)
            .first(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))
    }

    /// Signals a running operation to stop picking up new items. In-flight
    /// items are allowed to finish; already-queued items are skipped.
    pub fn cancel(&self, operation_id: &str) -> CoreResult<()> {
        if let Some(flag) = self.cancel_flags.lock().expect("cancel flag map poisoned").get(operation_id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.set_state(operation_id, BulkOperationState::Cancelling)
    }

    /// Runs `user_ids` through `handler`, one Semaphore permit per item.
    /// Updates the `bulk_operations` row's counters as items complete and
    /// records one `bulk_operation_errors` row per failure.
    pub async fn run(&self, operation_id: &str, user_ids: Vec<String>, handler: ItemHandler) -> CoreResult<BulkOperation> {
        let realm = self.status(operation_id)?.realm;
        let total = user_ids.len() as u64;
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .lock()
            .expect("cancel flag map poisoned")
            .insert(operation_id.to_string(), cancel_flag.clone());

        self.set_state(operation_id, BulkOperationState::Running)?;
        crate::metrics::record_bulk_operation(&realm, "started");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_workers));
        let mut handles = Vec::with_capacity(user_ids.len());

        for (index, user_id) in user_ids.into_iter().enumerate() {
            if cancel_flag.load(Ordering::SeqCst) {
                break;
            }
            let semaphore = semaphore.clone();
            let handler = handler.clone();
            let timeout = self.config.per_item_timeout;
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let result = tokio::time::timeout(timeout, handler(user_id.clone())).await;
                let outcome = match result {
                    Ok(inner) => inner,
                    Err(_) => Err(CoreError::RpcTransient("item processing timed out".to_string())),
                };
                (index, user_id, outcome)
            }));
        }

        let mut processed = 0i32;
        let mut succeeded = 0i32;
        let mut failed = 0i32;

        for handle in handles {
            let (index, user_id, outcome) = handle.await.expect("bulk item task panicked");
            processed += 1;
            match outcome {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    failed += 1;
                    if let Err(record_err) = self.record_error(operation_id, index, &user_id, &err) {
                        tracing::warn!(operation_id, user_id = %user_id, error = %record_err, "failed to persist bulk item error, continuing run");
                    }
                }
            }
            crate::metrics::set_bulk_progress(&realm, operation_id, processed as u64, total);
        }

        self.cancel_flags.lock().expect("cancel flag map poisoned").remove(operation_id);

        let was_cancelled = cancel_flag.load(Ordering::SeqCst);
        let final_state = BulkOperationState::from_tally(was_cancelled, succeeded, failed);

        let event = match final_state {
            BulkOperationState::Cancelled => "cancelled",
            BulkOperationState::Failed => "failed",
            BulkOperationState::PartiallyCompleted => "partially_completed",
            _ => "completed",
        };
        crate::metrics::record_bulk_operation(&realm, event);

        self.finish(operation_id, final_state, processed, succeeded, failed)
    }

    fn record_error(&self, operation_id: &str, index: usize, user_id: &str, err: &CoreError) -> CoreResult<()> {
        let mut conn = self.connection()?;
        let bulk_id = DieselUlid::from_string(operation_id).map_err(|e| CoreError::Conflict(e.to_string()))?;
        let new_error = NewBulkOperationError::new(bulk_id, index, user_id.to_string(), err.to_string(), err.is_retryable());

        diesel::insert_into(bulk_operation_errors::table)
            .values(&new_error)
            .execute(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))?;
        Ok(())
    }

    fn set_state(&self, operation_id: &str, state: BulkOperationState) -> CoreResult<()> {
        let mut conn = self.connection()?;
        let uid = DieselUlid::from_string(operation_id).map_err(|e| CoreError::Conflict(e.to_string()))?;

        diesel::update(bulk_operations::table.find(uid))
            .set((bulk_operations::state.eq(state), bulk_operations::updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .map_err(|e| CoreError::Conflict(e.to_string()))?;
        Ok(())
    }

    fn finish(&self, operation_id: &str, state: BulkOperationState, processed: i32, succeeded: i32, failed: i32) -> CoreResult<BulkOperation> {
        let mut conn = self.connection()?;
        let uid = DieselUlid::from_string(operation_id).map_err(|e| CoreError::Conflict(e.to_string()))?;
        let now = Utc::now();

        diesel::update(bulk_operations::table.find(uid))
            .set((
                bulk_operations::state.eq(state),
                bulk_operations::processed.eq(processed),
                bulk_operations::succeeded.eq(succeeded),
                bulk_operations::failed.eq(failed),
                bulk_operations::updated_at.eq(now),
                bulk_operations::completed_at.eq(Some(now)),
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
