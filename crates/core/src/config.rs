//! Configuration management for docseek.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - The workspace config file (`.docseek/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric; persisted state lives in `.docseek/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Embedding providers the knowledge crate knows how to construct.
pub const KNOWN_PROVIDERS: [&str; 2] = ["hashing", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docseek/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Indexing and retrieval settings
    pub index: IndexSettings,
}

/// Settings for chunking, embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub chunk: ChunkSettings,
    pub embedding: EmbeddingSettings,
    pub query: QuerySettings,

    /// Write each installed snapshot to `.docseek/index/snapshot.json`
    pub persist_snapshot: bool,

    /// Default document paths for `index` when none are given on the command line
    pub source_paths: Vec<PathBuf>,

    /// File extensions read by the directory loader
    pub source_extensions: Vec<String>,
}

/// Chunking parameters, measured in characters of normalized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    pub max_length: usize,
    pub overlap_length: usize,
}

/// Embedding provider and gateway tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider name: "hashing" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint (Ollama base URL)
    pub endpoint: Option<String>,

    /// Maximum number of texts per provider call
    pub batch_size: usize,

    /// Retries after the first failed attempt of a batch
    pub max_retries: u32,

    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,

    /// Number of batches allowed in flight at once
    pub max_concurrent_batches: usize,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub default_top_k: usize,

    /// Handlebars template for assembled context prompts; built-in when unset
    pub prompt_template: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk: ChunkSettings::default(),
            embedding: EmbeddingSettings::default(),
            query: QuerySettings::default(),
            persist_snapshot: true,
            source_paths: Vec::new(),
            source_extensions: ["txt", "md", "markdown", "csv", "json", "html"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            max_length: 1000,
            overlap_length: 150,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(), // Offline default
            model: "hashing-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: 32,
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            max_concurrent_batches: 1,
            request_timeout_secs: 30,
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            prompt_template: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    index: Option<IndexSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            index: IndexSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and the
    /// environment.
    ///
    /// Environment variables:
    /// - `DOCSEEK_WORKSPACE`: Workspace path
    /// - `DOCSEEK_CONFIG`: Path to config file
    /// - `DOCSEEK_EMBED_PROVIDER`: Embedding provider
    /// - `DOCSEEK_EMBED_MODEL`: Embedding model identifier
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docseek_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with explicit workspace and config file
    /// paths taking precedence over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("DOCSEEK_WORKSPACE")) {
            config.workspace = workspace;
        }
        config.config_file = config_file.or_else(|| env_path("DOCSEEK_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.docseek_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCSEEK_EMBED_PROVIDER") {
            config.index.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCSEEK_EMBED_MODEL") {
            config.index.embedding.model = model;
        }

        if let Ok(endpoint) = std::env::var("OLLAMA_URL") {
            config.index.embedding.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(index) = config_file.index {
            result.index = index;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the environment and the
    /// config file.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        provider: Option<String>,
        model: Option<String>,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if let Some(provider) = provider {
            self.index.embedding.provider = provider;
        }

        if let Some(model) = model {
            self.index.embedding.model = model;
        }

        self
    }

    /// Get the path to the .docseek directory.
    pub fn docseek_dir(&self) -> PathBuf {
        self.workspace.join(".docseek")
    }

    /// Ensure the .docseek directory exists.
    pub fn ensure_docseek_dir(&self) -> AppResult<()> {
        let dir = self.docseek_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docseek directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Location of the persisted index snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.docseek_dir().join("index").join("snapshot.json")
    }

    /// Validate the settings before any indexing work starts.
    pub fn validate(&self) -> AppResult<()> {
        let embedding = &self.index.embedding;

        if !KNOWN_PROVIDERS.contains(&embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                embedding.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if embedding.batch_size == 0 || embedding.max_concurrent_batches == 0 {
            return Err(AppError::Config(
                "embedding.batch_size and embedding.max_concurrent_batches must be at least 1"
                    .to_string(),
            ));
        }

        let chunk = &self.index.chunk;
        if chunk.overlap_length >= chunk.max_length {
            return Err(AppError::Config(format!(
                "chunk.overlap_length ({}) must be smaller than chunk.max_length ({})",
                chunk.overlap_length, chunk.max_length
            )));
        }

        if self.index.query.default_top_k == 0 {
            return Err(AppError::Config(
                "query.default_top_k must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}
