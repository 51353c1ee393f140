/// Configuration system for kb-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, KbError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector store configuration
    pub database: DatabaseConfig,

    /// Embedding model configuration
    pub embedding: EmbeddingConfig,

    /// Document processing configuration
    pub processing: ProcessingConfig,

    /// Server configuration
    pub server: ServerConfig,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// LanceDB data directory path
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Prefix for the documents/chunks table names, so multiple logical
    /// knowledge bases can share one storage root
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier (e.g., "sentence-transformers/all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Directory for downloaded model weights
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for embedding generation
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Document processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Target chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of context repeated between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Maximum file size to ingest (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// File extensions accepted for ingestion (without the leading dot)
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported over MCP
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_database_path() -> PathBuf {
    crate::paths::PlatformPaths::default_database_path()
}

fn default_table_prefix() -> String {
    "kb_".to_string()
}

fn default_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_model_cache_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_model_cache_dir()
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_file_size() -> u64 {
    10_485_760 // 10 MB
}

fn default_supported_extensions() -> Vec<String> {
    ["txt", "md", "py", "rs", "js", "ts", "go"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_server_name() -> String {
    "kb-rag".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            table_prefix: default_table_prefix(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cache_dir: default_model_cache_dir(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
            supported_extensions: default_supported_extensions(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, KbError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, KbError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values; run once at startup
    pub fn validate(&self) -> Result<(), KbError> {
        if self.processing.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "processing.chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.processing.chunk_overlap >= self.processing.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "processing.chunk_overlap".to_string(),
                reason: format!(
                    "must be strictly less than chunk_size ({} >= {})",
                    self.processing.chunk_overlap, self.processing.chunk_size
                ),
            }
            .into());
        }

        if self.processing.max_file_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "processing.max_file_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.processing.supported_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "processing.supported_extensions".to_string(),
                reason: "must list at least one extension".to_string(),
            }
            .into());
        }

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "embedding.model".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        // Prefix is spliced into table names, keep it identifier-safe
        if !self
            .database
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                key: "database.table_prefix".to_string(),
                reason: format!(
                    "must contain only alphanumerics and underscores, got '{}'",
                    self.database.table_prefix
                ),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("KB_RAG_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(prefix) = std::env::var("KB_RAG_TABLE_PREFIX") {
            self.database.table_prefix = prefix;
        }

        if let Ok(model) = std::env::var("KB_RAG_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(dir) = std::env::var("KB_RAG_MODEL_CACHE_DIR") {
            self.embedding.cache_dir = PathBuf::from(dir);
        }

        if let Ok(batch_size) = std::env::var("KB_RAG_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.embedding.batch_size = size;
        }

        if let Ok(chunk_size) = std::env::var("KB_RAG_CHUNK_SIZE")
            && let Ok(size) = chunk_size.parse()
        {
            self.processing.chunk_size = size;
        }

        if let Ok(overlap) = std::env::var("KB_RAG_CHUNK_OVERLAP")
            && let Ok(size) = overlap.parse()
        {
            self.processing.chunk_overlap = size;
        }

        if let Ok(level) = std::env::var("KB_RAG_LOG_LEVEL") {
            self.server.log_level = level;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, KbError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing.chunk_size, 1000);
        assert_eq!(config.processing.chunk_overlap, 200);
        assert_eq!(config.database.table_prefix, "kb_");
    }

    #[test]
    fn test_overlap_must_be_less_than_chunk_size() {
        let mut config = Config::default();
        config.processing.chunk_size = 100;
        config.processing.chunk_overlap = 100;
        assert!(config.validate().is_err());

        config.processing.chunk_overlap = 99;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = Config::default();
        config.processing.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_model_rejected() {
        let mut config = Config::default();
        config.embedding.model = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_extensions_rejected() {
        let mut config = Config::default();
        config.processing.supported_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_prefix_identifier_safe() {
        let mut config = Config::default();
        config.database.table_prefix = "kb-1".to_string();
        assert!(config.validate().is_err());

        config.database.table_prefix = "kb_1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.processing.chunk_size, config.processing.chunk_size);
        assert_eq!(parsed.embedding.model, config.embedding.model);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [processing]
            chunk_size = 100
            chunk_overlap = 20
            "#,
        )
        .unwrap();
        assert_eq!(parsed.processing.chunk_size, 100);
        assert_eq!(parsed.processing.chunk_overlap, 20);
        assert_eq!(parsed.embedding.batch_size, 32);
    }
}
