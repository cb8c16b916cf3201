//! Status command handler.

use super::{print_status, restore_or_warn};
use clap::Args;
use docseek_core::{config::AppConfig, AppResult};
use docseek_knowledge::KnowledgeBase;

/// Show index status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let kb = KnowledgeBase::open(config)?;
        restore_or_warn(&kb).await;
        let status = kb.status();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            print_status(&status);
            if let Some(path) = kb.manager().snapshot_path() {
                println!("  Snapshot file: {}", path.display());
            }
        }

        Ok(())
    }
}
