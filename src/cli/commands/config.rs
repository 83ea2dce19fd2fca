use anyhow::Result;

use crate::commands::bootstrap;
use crate::ConfigCommands;

pub async fn handle(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let core = bootstrap()?;
            let config = core.config.current();
            println!("app.env = {}", config.app.env);
            println!("bws.primary_endpoint = {}", config.bws.primary_endpoint);
            println!("bws.secondary_endpoints = {:?}", config.bws.secondary_endpoints);
            println!("verification.default_match_threshold = {}", config.verification.default_match_threshold);
            println!("liveness.default_mode = {:?}", config.liveness.default_mode);
            println!("bulk.max_concurrent_workers = {}", config.bulk.max_concurrent_workers);
            println!("template.current_encoder_version = {}", config.template.current_encoder_version);
        }
    }

    Ok(())
}
