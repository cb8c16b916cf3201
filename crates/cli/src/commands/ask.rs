//! Ask command handler.
//!
//! Retrieves the top-k passages for a question from the persisted index.

use super::{print_hits, restore_or_warn};
use clap::Args;
use docseek_core::{config::AppConfig, AppError, AppResult};
use docseek_knowledge::KnowledgeBase;

/// Retrieve passages relevant to a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Number of passages to retrieve (default: query.default_top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Print the assembled prompt payload instead of raw hits
    #[arg(long)]
    pub context: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Query: {}", self.query);

        let kb = KnowledgeBase::open(config)?;
        if !restore_or_warn(&kb).await {
            return Err(AppError::Index(
                "No index found. Run `docseek index <PATH>` first.".to_string(),
            ));
        }

        if self.context {
            let payload = kb.context(&self.query, self.top_k).await?;
            if self.json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", payload.prompt);
            }
            return Ok(());
        }

        let result = kb.ask(&self.query, self.top_k).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_hits(&result);
        }

        Ok(())
    }
}
