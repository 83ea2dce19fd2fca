use anyhow::Result;

use crate::commands::bootstrap;
use crate::TemplateCommands;

pub async fn handle(realm: String, cmd: TemplateCommands) -> Result<()> {
    let core = bootstrap()?;

    match cmd {
        TemplateCommands::Status { user_id } => {
            let status = core.lifecycle.status(&realm, &user_id, false).await?;
            println!("template_id={} available={} encoder={} feature_vectors={}", status.template_id, status.available, status.encoder_version, status.feature_vector_count);
        }
        TemplateCommands::Health { user_id } => {
            let health = core.lifecycle.health(&realm, &user_id).await?;
            println!("{health:?}");
        }
        TemplateCommands::Upgrade { user_id } => {
            let template_id = core.lifecycle.upgrade(&realm, &user_id).await?;
            println!("upgraded template {template_id}");
        }
        TemplateCommands::Delete { user_id } => {
            let status = core.lifecycle.status(&realm, &user_id, false).await?;
            let outcome = core.bws.delete_template(&realm, status.template_id, None).await?;
            println!(
                "{outcome:?} template {} for {user_id} (bypassed the deletion-request workflow; no GDPR audit trail recorded)",
                status.template_id
            );
        }
    }

    Ok(())
}
