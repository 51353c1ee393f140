/// Centralized platform-specific path computation
///
/// Default locations for the database, the embedding model cache, and the
/// configuration file, following each platform's conventions via `dirs`.
use std::path::PathBuf;

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Project-specific data directory: {data_dir}/kb-rag
    pub fn project_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kb-rag")
    }

    /// Project-specific cache directory: {cache_dir}/kb-rag
    pub fn project_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kb-rag")
    }

    /// Project-specific config directory: {config_dir}/kb-rag
    pub fn project_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kb-rag")
    }

    /// Default LanceDB database path: {data_dir}/kb-rag/knowledge_base
    pub fn default_database_path() -> PathBuf {
        Self::project_data_dir().join("knowledge_base")
    }

    /// Default embedding model cache: {cache_dir}/kb-rag/models
    pub fn default_model_cache_dir() -> PathBuf {
        Self::project_cache_dir().join("models")
    }

    /// Default configuration file: {config_dir}/kb-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}
