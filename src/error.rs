/// Centralized error types for kb-rag using thiserror
///
/// Provides domain-specific error types for better error handling and for the
/// structured error envelope returned over the MCP boundary.
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the knowledge base
#[derive(Error, Debug)]
pub enum KbError {
    #[error("File processing error: {0}")]
    FileProcessing(#[from] FileProcessingError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

    #[error("Failed to add document '{path}': {source}")]
    Ingestion {
        path: String,
        #[source]
        source: Box<KbError>,
    },

    #[error("Failed to search documents for '{query}': {source}")]
    Search {
        query: String,
        #[source]
        source: Box<KbError>,
    },

    #[error("Failed to list documents: {source}")]
    Listing {
        limit: Option<usize>,
        offset: usize,
        #[source]
        source: Box<KbError>,
    },

    #[error("Failed to clear knowledge base: {source}")]
    Clear {
        #[source]
        source: Box<KbError>,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while validating and reading a file before ingestion
#[derive(Error, Debug)]
pub enum FileProcessingError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Path is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Unsupported file extension '{extension}' for {}", path.display())]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("File size exceeds maximum: {size} > {max} bytes for {}", path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("File is not valid UTF-8 text: {}", .0.display())]
    InvalidUtf8(PathBuf),

    #[error("File contains binary content: {}", .0.display())]
    BinaryContent(PathBuf),

    #[error("Failed to read file '{}': {reason}", path.display())]
    ReadFailed { path: PathBuf, reason: String },
}

impl FileProcessingError {
    /// The offending path, for error details
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound(p)
            | Self::NotAFile(p)
            | Self::InvalidUtf8(p)
            | Self::BinaryContent(p) => p,
            Self::UnsupportedExtension { path, .. }
            | Self::FileTooLarge { path, .. }
            | Self::ReadFailed { path, .. } => path,
        }
    }

    /// Machine-checkable error type for the response envelope
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::NotAFile(_) => "file_not_found",
            Self::UnsupportedExtension { .. } => "unsupported_file_type",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::InvalidUtf8(_) | Self::BinaryContent(_) => "encoding_error",
            Self::ReadFailed { .. } => "file_read_error",
        }
    }
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model '{model}': {reason}")]
    InitializationFailed { model: String, reason: String },

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),
}

/// Errors related to the vector store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to initialize vector store: {0}")]
    InitializationFailed(String),

    #[error("Failed to connect to vector store: {0}")]
    ConnectionFailed(String),

    #[error("Vector store is not initialized")]
    NotInitialized,

    #[error("Failed to store document vectors: {0}")]
    WriteFailed(String),

    #[error("Failed to search vectors: {0}")]
    SearchFailed(String),

    #[error("Failed to read from vector store: {0}")]
    ReadFailed(String),

    #[error("Failed to clear vector store: {0}")]
    ClearFailed(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// Errors related to input validation at the tool boundary
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{parameter} must not be empty")]
    Empty { parameter: &'static str },

    #[error("{parameter} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        parameter: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("{parameter} is too long: {actual} > {max} characters")]
    TooLong {
        parameter: &'static str,
        max: usize,
        actual: usize,
    },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors related to GitHub repository ingestion
#[derive(Error, Debug)]
pub enum GitHubError {
    /// The URL does not point at github.com at all
    #[error("Not a GitHub URL: {0}")]
    NotGitHubUrl(String),

    /// The URL points at github.com but cannot be parsed into owner/repo
    #[error("Malformed GitHub URL: {0}")]
    MalformedUrl(String),

    #[error("Failed to clone repository '{url}': {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Subpath '{subpath}' does not exist in repository {url}")]
    SubpathNotFound { url: String, subpath: String },

    #[error("No ingestible files found in repository {0}")]
    NoFilesFound(String),
}

// Conversion from anyhow::Error for glue code in the binary and tests
impl From<anyhow::Error> for KbError {
    fn from(err: anyhow::Error) -> Self {
        KbError::Other(format!("{:#}", err))
    }
}

impl KbError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        KbError::Other(msg.into())
    }

    /// Machine-checkable error type string for the response envelope
    pub fn error_type(&self) -> &'static str {
        match self {
            KbError::FileProcessing(e) => e.error_type(),
            KbError::Embedding(_) => "embedding_generation_error",
            KbError::Store(_) => "storage_error",
            KbError::Validation(_) => "parameter_validation_error",
            KbError::Config(_) => "configuration_error",
            KbError::GitHub(GitHubError::NotGitHubUrl(_)) => "unsupported_repository_host",
            KbError::GitHub(_) => "github_repository_error",
            KbError::Ingestion { source, .. } => match source.as_ref() {
                KbError::FileProcessing(e) => e.error_type(),
                KbError::Validation(_) => "parameter_validation_error",
                KbError::Embedding(_) => "embedding_generation_error",
                _ => "document_ingestion_error",
            },
            KbError::Search { .. } => "document_search_error",
            KbError::Listing { .. } => "document_listing_error",
            KbError::Clear { .. } => "knowledge_base_clear_error",
            KbError::Cancelled => "operation_cancelled",
            KbError::Io(_) => "io_error",
            KbError::Other(_) => "internal_error",
        }
    }

    /// Structured context for the `error_details` field of the envelope
    pub fn error_details(&self) -> serde_json::Value {
        match self {
            KbError::FileProcessing(e) => json!({ "file_path": e.path().display().to_string() }),
            KbError::Ingestion { path, source } => {
                json!({ "file_path": path, "error": source.to_string() })
            }
            KbError::Search { query, source } => {
                json!({ "query": query, "error": source.to_string() })
            }
            KbError::Listing {
                limit,
                offset,
                source,
            } => json!({ "limit": limit, "offset": offset, "error": source.to_string() }),
            KbError::Clear { source } => json!({ "error": source.to_string() }),
            KbError::GitHub(GitHubError::CloneFailed { url, reason }) => {
                json!({ "url": url, "error": reason })
            }
            KbError::GitHub(e) => json!({ "error": e.to_string() }),
            other => json!({ "error": other.to_string() }),
        }
    }

    /// Check if this is a user error (validation, bad input) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            KbError::Validation(_)
                | KbError::FileProcessing(_)
                | KbError::GitHub(GitHubError::NotGitHubUrl(_))
                | KbError::GitHub(GitHubError::MalformedUrl(_))
        )
    }
}
