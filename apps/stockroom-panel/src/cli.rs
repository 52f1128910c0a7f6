use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use stockroom_db::Ledger;

use crate::services::retention_service::RetentionService;

#[derive(Parser)]
#[command(name = "stockroom-panel")]
#[command(about = "Stockroom fulfillment panel", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run the retention sweep once and exit
    Sweep,
    /// Apply pending database migrations and exit
    Migrate,
    /// Register a Telegram chat as an admin notification target
    RegisterAdmin {
        /// Telegram chat id
        #[arg(allow_negative_numbers = true)]
        chat_id: i64,
    },
}

pub async fn run_sweep(retention: &RetentionService) -> Result<()> {
    let report = retention
        .sweep(Utc::now())
        .await
        .context("Retention sweep failed")?;

    println!("\n=== RETENTION SWEEP ===");
    println!("Expired units: {}", report.scanned);
    println!("Deleted rows:  {}", report.deleted);
    for err in &report.errors {
        println!("  ✗ {}: {}", err.id, err.error);
    }
    println!("=======================\n");
    Ok(())
}

pub async fn register_admin(ledger: &dyn Ledger, chat_id: i64) -> Result<()> {
    let created = ledger
        .register_admin(chat_id)
        .await
        .context("Failed to register admin chat")?;
    if created {
        println!("Chat {} registered as admin target.", chat_id);
    } else {
        println!("Chat {} was already registered.", chat_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::parse_from(["stockroom-panel"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["stockroom-panel", "register-admin", "-100200"]);
        assert!(matches!(cli.command, Some(Commands::RegisterAdmin { chat_id: -100200 })));
    }
}
