//! Index command handler.

use super::restore_or_warn;
use clap::Args;
use docseek_core::{config::AppConfig, AppError, AppResult};
use docseek_knowledge::{KnowledgeBase, RebuildOutcome};
use std::path::PathBuf;

/// Build or refresh the index
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Files or directories to index (default: source_paths from config)
    pub paths: Vec<PathBuf>,

    /// Rebuild even when the documents are unchanged
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        let kb = KnowledgeBase::open(config)?;
        // The restored snapshot lets an unchanged corpus skip the rebuild
        restore_or_warn(&kb).await;

        let source = kb.directory_source(&self.paths)?;
        let status = kb.reindex(source, self.force).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            if status.last_outcome == Some(RebuildOutcome::Failed) {
                return Err(AppError::Index("rebuild failed".to_string()));
            }
            return Ok(());
        }

        match status.last_outcome {
            Some(RebuildOutcome::Installed) => println!(
                "Indexed {} documents ({} chunks) in {}ms [generation {}]",
                status.document_count,
                status.chunk_count,
                status.last_build_duration_ms.unwrap_or_default(),
                status.generation.unwrap_or_default()
            ),
            Some(RebuildOutcome::Unchanged) => println!(
                "Documents unchanged; keeping existing index ({} documents, {} chunks)",
                status.document_count, status.chunk_count
            ),
            Some(RebuildOutcome::Failed) | None => {
                return Err(AppError::Index(format!(
                    "Rebuild failed: {}",
                    status.last_error.as_deref().unwrap_or("unknown error")
                )));
            }
        }

        Ok(())
    }
}
