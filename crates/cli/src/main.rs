//! Docseek CLI
//!
//! Main entry point for the docseek command-line tool.
//! Indexes local documents and answers retrieval queries against them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, ShellCommand, StatusCommand};
use docseek_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Docseek - semantic search over your own documents
#[derive(Parser, Debug)]
#[command(name = "docseek")]
#[command(about = "Semantic search over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCSEEK_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.docseek/config.yaml)
    #[arg(short, long, global = true, env = "DOCSEEK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Embedding provider (hashing, ollama)
    #[arg(short, long, global = true, env = "DOCSEEK_EMBED_PROVIDER")]
    provider: Option<String>,

    /// Embedding model identifier
    #[arg(short, long, global = true, env = "DOCSEEK_EMBED_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build or refresh the index from document paths
    Index(IndexCommand),

    /// Retrieve the passages most relevant to a question
    Ask(AskCommand),

    /// Show index status
    Status(StatusCommand),

    /// Interactive query loop with background reindexing
    Shell(ShellCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then config file, then environment
    let config = AppConfig::load_with(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.provider,
        cli.model,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Docseek CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding: {} / {} ({} dims)",
        config.index.embedding.provider,
        config.index.embedding.model,
        config.index.embedding.dimensions
    );

    config.ensure_docseek_dir()?;

    let command_name = match &cli.command {
        Commands::Index(_) => "index",
        Commands::Ask(_) => "ask",
        Commands::Status(_) => "status",
        Commands::Shell(_) => "shell",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Shell(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
