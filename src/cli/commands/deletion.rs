use anyhow::Result;
use biometric_core::app::models::DeletionRequestState;

use crate::commands::bootstrap;
use crate::DeletionRequestCommands;

pub async fn handle(realm: String, cmd: DeletionRequestCommands) -> Result<()> {
    let core = bootstrap()?;

    match cmd {
        DeletionRequestCommands::Create { user_id, requested_by, reason } => {
            let request = core.deletion_requests.create(&realm, &user_id, &requested_by, reason).await?;
            println!("filed deletion request {} for {user_id}, state={:?}", request.id, request.state);
        }
        DeletionRequestCommands::List { state } => {
            let state = state.as_deref().and_then(DeletionRequestState::from_str);
            for request in core.deletion_requests.list(&realm, state)? {
                println!("{} user={} state={:?} priority={:?}", request.id, request.user_id, request.state, request.priority);
            }
        }
        DeletionRequestCommands::Approve { id, decided_by } => {
            let request = core.deletion_requests.approve(&id, &decided_by, None).await?;
            println!("{} -> {:?}", request.id, request.state);
        }
        DeletionRequestCommands::Decline { id, decided_by, note } => {
            let request = core.deletion_requests.decline(&id, &decided_by, note).await?;
            println!("{} -> {:?}", request.id, request.state);
        }
        DeletionRequestCommands::Cancel { id, decided_by } => {
            let request = core.deletion_requests.cancel(&id, &decided_by).await?;
            println!("{} -> {:?}", request.id, request.state);
        }
        DeletionRequestCommands::Process { id, operator } => {
            let request = core.deletion_requests.process(&id, &operator).await?;
            println!("{} -> {:?}", request.id, request.state);
        }
    }

    Ok(())
}
