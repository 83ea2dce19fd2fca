mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "biocorectl")]
#[command(about = "Admin CLI for the biometric authentication core")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Realm to operate against.
    #[arg(long, global = true, default_value = "default")]
    pub realm: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Template status/health/upgrade/delete operations
    #[command(subcommand)]
    Template(TemplateCommands),
    /// Bulk enroll/verify/delete/upgrade batches
    #[command(subcommand)]
    Bulk(BulkCommands),
    /// GDPR deletion request lifecycle
    #[command(name = "deletion-request")]
    #[command(subcommand)]
    DeletionRequest(DeletionRequestCommands),
    /// Configuration inspection
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Show a user's template status as reported by BWS
    Status { user_id: String },
    /// Classify a user's template health
    Health { user_id: String },
    /// Re-enroll a user against the current encoder version
    Upgrade { user_id: String },
    /// Delete a user's template immediately (bypasses the deletion-request workflow)
    Delete { user_id: String },
}

#[derive(Subcommand)]
pub enum BulkCommands {
    /// Submit a bulk delete or upgrade batch (bulk enroll/verify need image
    /// payloads and are driven programmatically through the engine, not this CLI)
    Create {
        #[arg(long, value_enum)]
        kind: BulkKindArg,
        submitted_by: String,
        /// Comma-separated user ids
        user_ids: String,
    },
    /// Show a bulk operation's progress
    Status { operation_id: String },
    /// Request cancellation of a running bulk operation
    Cancel { operation_id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum BulkKindArg {
    Delete,
    Upgrade,
}

#[derive(Subcommand)]
pub enum DeletionRequestCommands {
    /// File a new deletion request
    Create {
        user_id: String,
        requested_by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List deletion requests, optionally filtered by state
    List {
        #[arg(long)]
        state: Option<String>,
    },
    /// Approve a pending request
    Approve { id: String, decided_by: String },
    /// Decline a pending request
    Decline {
        id: String,
        decided_by: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Cancel a request before it completes
    Cancel { id: String, decided_by: String },
    /// Execute an approved request (erases the template and host record)
    Process { id: String, operator: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the currently loaded configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Template(cmd) => commands::template::handle(cli.realm, cmd).await,
        Commands::Bulk(cmd) => commands::bulk::handle(cli.realm, cmd).await,
        Commands::DeletionRequest(cmd) => commands::deletion::handle(cli.realm, cmd).await,
        Commands::Config(cmd) => commands::config::handle(cmd).await,
    }
}
