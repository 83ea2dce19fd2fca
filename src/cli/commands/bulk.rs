use std::sync::Arc;

use anyhow::Result;
use biometric_core::app::models::BulkOperationKind;

use crate::commands::bootstrap;
use crate::{BulkCommands, BulkKindArg};

pub async fn handle(realm: String, cmd: BulkCommands) -> Result<()> {
    let core = bootstrap()?;

    match cmd {
        BulkCommands::Create { kind, submitted_by, user_ids } => {
            let user_ids: Vec<String> = user_ids.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            let kind = match kind {
                BulkKindArg::Delete => BulkOperationKind::Delete,
                BulkKindArg::Upgrade => BulkOperationKind::Upgrade,
            };

            let operation = core.bulk.submit(&realm, kind, &submitted_by, user_ids.len())?;
            let operation_id = operation.id.to_string();
            println!("submitted bulk operation {operation_id} ({} items)", user_ids.len());

            let lifecycle = core.lifecycle.clone();
            let bws = core.bws.clone();
            let realm_for_handler = realm.clone();

            let handler: biometric_core::bulk::ItemHandler = Arc::new(move |user_id: String| {
                let lifecycle = lifecycle.clone();
                let bws = bws.clone();
                let realm = realm_for_handler.clone();
                Box::pin(async move {
                    match kind {
                        BulkOperationKind::Upgrade => {
                            lifecycle.upgrade(&realm, &user_id).await?;
                            Ok(())
                        }
                        BulkOperationKind::Delete => {
                            let status = lifecycle.status(&realm, &user_id, false).await?;
                            bws.delete_template(&realm, status.template_id, None).await.map(|_| ())
                        }
                        BulkOperationKind::Enroll | BulkOperationKind::Verify => {
                            Err(biometric_core::CoreError::Conflict("bulk enroll/verify require image payloads not available over this CLI".to_string()))
                        }
                    }
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), biometric_core::CoreError>> + Send>>
            });

            let finished = core.bulk.run(&operation_id, user_ids, handler).await?;
            println!(
                "finished: state={:?} processed={} succeeded={} failed={}",
                finished.state, finished.processed, finished.succeeded, finished.failed
            );
        }
        BulkCommands::Status { operation_id } => {
            let operation = core.bulk.status(&operation_id)?;
            println!(
                "state={:?} total={} processed={} succeeded={} failed={}",
                operation.state, operation.total, operation.processed, operation.succeeded, operation.failed
            );
        }
        BulkCommands::Cancel { operation_id } => {
            core.bulk.cancel(&operation_id)?;
            println!("cancellation requested for {operation_id}");
        }
    }

    Ok(())
}
