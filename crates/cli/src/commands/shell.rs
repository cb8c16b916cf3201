//! Interactive shell.
//!
//! Each input line is a query. Rebuilds run in the background, so queries
//! keep being answered from the previous index while one is in progress.

use super::{print_hits, print_status, restore_or_warn};
use clap::Args;
use docseek_core::{config::AppConfig, AppResult};
use docseek_knowledge::{IndexError, KnowledgeBase, LifecycleState};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Type a question to search the index.
  :reindex     rebuild in the background (skipped when unchanged)
  :reindex!    rebuild even when unchanged
  :wait        wait for the running rebuild to finish
  :status      show index status
  :context Q   show the prompt payload for question Q
  :quit        exit";

/// Interactive query loop
#[derive(Args, Debug)]
pub struct ShellCommand {
    /// Document paths used by :reindex (default: source_paths from config)
    pub paths: Vec<PathBuf>,

    /// Number of passages per query (default: query.default_top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

impl ShellCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing shell command");

        let kb = KnowledgeBase::open(config)?;
        if !restore_or_warn(&kb).await {
            println!("No persisted index; building one in the background.");
            self.reindex(&kb, false);
        }
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();

            match line {
                "" => continue,
                ":quit" | ":q" | ":exit" => break,
                ":help" => println!("{}", HELP),
                ":status" => print_status(&kb.status()),
                ":reindex" => self.reindex(&kb, false),
                ":reindex!" => self.reindex(&kb, true),
                ":wait" => print_status(&kb.manager().wait_for_rebuild().await),
                _ => {
                    if let Some(query) = line.strip_prefix(":context ") {
                        match kb.context(query, self.top_k).await {
                            Ok(payload) => println!("{}", payload.prompt),
                            Err(e) => report_query_error(&kb, e),
                        }
                    } else if line.starts_with(':') {
                        println!("Unknown command {}; try :help", line);
                    } else {
                        match kb.ask(line, self.top_k).await {
                            Ok(result) => print_hits(&result),
                            Err(e) => report_query_error(&kb, e),
                        }
                    }
                }
            }
        }

        if kb.manager().state() == LifecycleState::Rebuilding {
            println!("Waiting for the running rebuild to finish...");
            kb.manager().wait_for_rebuild().await;
        }

        Ok(())
    }

    fn reindex(&self, kb: &KnowledgeBase, force: bool) {
        let source = match kb.directory_source(&self.paths) {
            Ok(source) => source,
            Err(e) => {
                println!("Cannot reindex: {}", e);
                return;
            }
        };

        let triggered = if force {
            kb.manager().trigger_forced_reindex(source)
        } else {
            kb.manager().trigger_reindex(source)
        };
        match triggered {
            Ok(()) => println!("Rebuild started; queries use the current index until it finishes."),
            Err(IndexError::RebuildInProgress) => println!("A rebuild is already in progress."),
            Err(e) => println!("Cannot reindex: {}", e),
        }
    }
}

fn report_query_error(kb: &KnowledgeBase, err: IndexError) {
    match err {
        IndexError::EmptyIndex if kb.manager().state() == LifecycleState::Rebuilding => {
            println!("The index is still being built; try again shortly.")
        }
        IndexError::EmptyIndex => println!("The index is empty. Use :reindex to build it."),
        other => println!("Query failed: {}", other),
    }
}
