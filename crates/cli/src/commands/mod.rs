//! Command handlers for the docseek CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod index;
pub mod shell;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use index::IndexCommand;
pub use shell::ShellCommand;
pub use status::StatusCommand;

use docseek_knowledge::{IndexStatus, KnowledgeBase, RetrievalResult};

/// Restore the persisted snapshot, treating an unusable file as absent.
async fn restore_or_warn(kb: &KnowledgeBase) -> bool {
    match kb.restore().await {
        Ok(restored) => restored,
        Err(e) => {
            tracing::warn!("Ignoring persisted snapshot: {}", e);
            false
        }
    }
}

fn print_hits(result: &RetrievalResult) {
    if result.is_empty() {
        println!("No matching passages.");
        return;
    }

    for (rank, hit) in result.iter().enumerate() {
        let source = hit.chunk.source_name().unwrap_or(&hit.chunk.document_id);
        println!(
            "{}. [{:.3}] {} (part {})",
            rank + 1,
            hit.score,
            source,
            hit.chunk.ordinal
        );
        println!("   {}", hit.chunk.text);
    }
}

fn print_status(status: &IndexStatus) {
    println!("State: {:?}", status.state);
    match status.generation {
        Some(generation) => {
            println!("  Generation: {}", generation);
            println!("  Documents: {}", status.document_count);
            println!("  Chunks: {}", status.chunk_count);
        }
        None => println!("  No index installed"),
    }
    if let Some(model) = &status.model {
        println!("  Model: {}", model);
    }
    if let Some(built_at) = status.last_build_at {
        println!("  Built at: {}", built_at);
    }
    if let Some(outcome) = status.last_outcome {
        print!("  Last rebuild: {:?}", outcome);
        match status.last_build_duration_ms {
            Some(ms) => println!(" ({}ms)", ms),
            None => println!(),
        }
    }
    if let Some(error) = &status.last_error {
        println!("  Last error: {}", error);
    }
}
