use crate::error::{KbError, ValidationError};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata for one ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Opaque unique identifier, generated at ingestion
    pub id: String,
    /// Source path as given by the caller
    pub file_path: String,
    /// File name component of the path
    pub file_name: String,
    /// Size in bytes at ingestion time
    pub file_size: u64,
    /// Coarse category ("source" or "text") used to pick the chunking strategy
    pub file_type: String,
    /// SHA-256 hex digest of the full raw text
    pub content_hash: String,
    /// Set once, at successful ingestion (UTC)
    pub ingestion_timestamp: DateTime<Utc>,
    /// Number of chunks persisted for this document
    pub chunk_count: usize,
}

/// One bounded slice of a document's text, the unit of embedding and retrieval
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    /// Zero-based position within the document; dense and unique per document
    pub chunk_index: usize,
    pub content: String,
    /// Absent only between chunk creation and embedding assignment; never
    /// persisted without it
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    pub fn new(document_id: &str, chunk_index: usize, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index,
            content,
            embedding: None,
        }
    }
}

/// A single ranked search hit (derived per query, never persisted)
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document_id: String,
    pub document_path: String,
    /// Similarity in [0, 1], higher is better
    pub relevance_score: f32,
    /// Chunk content truncated for display
    pub content_excerpt: String,
    pub metadata: DocumentPayload,
}

// ---------------------------------------------------------------------------
// Tool requests
// ---------------------------------------------------------------------------

/// Request to add a document to the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddDocumentRequest {
    /// Path to the document file
    pub file_path: String,
}

impl AddDocumentRequest {
    pub fn validate(&self) -> Result<(), KbError> {
        if self.file_path.trim().is_empty() {
            return Err(ValidationError::Empty {
                parameter: "file_path",
            }
            .into());
        }
        if self.file_path.len() > 4096 {
            return Err(ValidationError::TooLong {
                parameter: "file_path",
                max: 4096,
                actual: self.file_path.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Request to list documents with pagination
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListDocumentsRequest {
    /// Maximum number of documents to return (0 for no limit)
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    /// Number of documents to skip
    #[serde(default)]
    pub offset: usize,
}

fn default_list_limit() -> usize {
    100
}

impl Default for ListDocumentsRequest {
    fn default() -> Self {
        Self {
            limit: default_list_limit(),
            offset: 0,
        }
    }
}

impl ListDocumentsRequest {
    /// Validate and normalize: limit 0 means unbounded
    pub fn validate(&self) -> Result<Option<usize>, KbError> {
        let limit = match self.limit {
            0 => None,
            n if n > 1000 => {
                return Err(ValidationError::OutOfRange {
                    parameter: "limit",
                    min: 1,
                    max: 1000,
                    actual: n,
                }
                .into());
            }
            n => Some(n),
        };
        if self.offset > 100_000 {
            return Err(ValidationError::OutOfRange {
                parameter: "offset",
                min: 0,
                max: 100_000,
                actual: self.offset,
            }
            .into());
        }
        Ok(limit)
    }
}

/// Request to search the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchDocumentsRequest {
    /// The search query text
    pub query: String,
    /// Maximum number of results to return
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    10
}

impl SearchDocumentsRequest {
    pub fn validate(&self) -> Result<(), KbError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::Empty { parameter: "query" }.into());
        }
        if self.query.len() > 10_000 {
            return Err(ValidationError::TooLong {
                parameter: "query",
                max: 10_000,
                actual: self.query.len(),
            }
            .into());
        }
        if self.limit == 0 || self.limit > 100 {
            return Err(ValidationError::OutOfRange {
                parameter: "limit",
                min: 1,
                max: 100,
                actual: self.limit,
            }
            .into());
        }
        Ok(())
    }
}

/// Request to clear the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClearKnowledgeBaseRequest {}

/// Request to ingest every supported file from a GitHub repository
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddRepositoryRequest {
    /// Repository URL (https://github.com/owner/repo, .../tree/branch/subpath,
    /// .../blob/branch/file, or git@github.com:owner/repo.git)
    pub url: String,
    /// Branch override; defaults to the branch encoded in the URL or the
    /// repository default
    #[serde(default)]
    pub branch: Option<String>,
}

impl AddRepositoryRequest {
    pub fn validate(&self) -> Result<(), KbError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::Empty { parameter: "url" }.into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tool responses
// ---------------------------------------------------------------------------

/// Serialized document metadata as returned over the tool boundary
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentPayload {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub content_hash: String,
    /// RFC 3339 UTC timestamp
    pub ingestion_timestamp: String,
    pub chunk_count: usize,
}

impl From<&DocumentMetadata> for DocumentPayload {
    fn from(meta: &DocumentMetadata) -> Self {
        Self {
            id: meta.id.clone(),
            file_path: meta.file_path.clone(),
            file_name: meta.file_name.clone(),
            file_size: meta.file_size,
            file_type: meta.file_type.clone(),
            content_hash: meta.content_hash.clone(),
            ingestion_timestamp: meta.ingestion_timestamp.to_rfc3339(),
            chunk_count: meta.chunk_count,
        }
    }
}

/// Response from adding a document
#[derive(Debug, Clone, Serialize)]
pub struct AddDocumentResponse {
    pub success: bool,
    pub document: DocumentPayload,
    pub message: String,
}

/// Pagination block for listing responses
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total_count: usize,
    pub returned_count: usize,
    pub offset: usize,
    /// None means unbounded
    pub limit: Option<usize>,
}

/// Response from listing documents
#[derive(Debug, Clone, Serialize)]
pub struct ListDocumentsResponse {
    pub success: bool,
    pub documents: Vec<DocumentPayload>,
    pub pagination: Pagination,
    pub message: String,
}

/// Timing and model info attached to every successful search
#[derive(Debug, Clone, Serialize)]
pub struct SearchMetadata {
    pub query_processed: String,
    pub embedding_model: String,
    pub search_time_ms: u64,
    pub total_documents_searched: usize,
}

/// Response from searching documents
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchResult>,
    pub query: String,
    pub result_count: usize,
    pub search_metadata: SearchMetadata,
    pub message: String,
}

/// Response from clearing the knowledge base
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub documents_removed: usize,
    pub message: String,
}

/// Response from ingesting a GitHub repository
#[derive(Debug, Clone, Serialize)]
pub struct AddRepositoryResponse {
    pub success: bool,
    pub repository: String,
    pub branch: Option<String>,
    pub documents_added: usize,
    pub documents_failed: usize,
    /// Non-fatal per-file errors
    pub errors: Vec<String>,
    pub message: String,
}

/// Knowledge base statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsPayload {
    pub document_count: usize,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub supported_extensions: Vec<String>,
}

/// Error envelope shared by every tool on failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub success: bool,
    pub error_type: String,
    pub error_message: String,
    pub error_details: serde_json::Value,
}

impl From<&KbError> for ErrorPayload {
    fn from(err: &KbError) -> Self {
        Self {
            success: false,
            error_type: err.error_type().to_string(),
            error_message: err.to_string(),
            error_details: err.error_details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_request_limit_zero_means_unbounded() {
        let req = ListDocumentsRequest {
            limit: 0,
            offset: 0,
        };
        assert_eq!(req.validate().unwrap(), None);
    }

    #[test]
    fn test_list_request_rejects_excessive_offset() {
        let req = ListDocumentsRequest {
            limit: 10,
            offset: 100_001,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_search_request_rejects_empty_query() {
        let req = SearchDocumentsRequest {
            query: "   ".to_string(),
            limit: 10,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_search_request_rejects_bad_limit() {
        let req = SearchDocumentsRequest {
            query: "rust".to_string(),
            limit: 0,
        };
        assert!(req.validate().is_err());

        let req = SearchDocumentsRequest {
            query: "rust".to_string(),
            limit: 101,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_add_request_rejects_empty_path() {
        let req = AddDocumentRequest {
            file_path: "".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_document_payload_conversion() {
        let meta = DocumentMetadata {
            id: "doc-1".to_string(),
            file_path: "/tmp/a.txt".to_string(),
            file_name: "a.txt".to_string(),
            file_size: 42,
            file_type: "text".to_string(),
            content_hash: "deadbeef".to_string(),
            ingestion_timestamp: Utc::now(),
            chunk_count: 3,
        };
        let payload = DocumentPayload::from(&meta);
        assert_eq!(payload.id, "doc-1");
        assert_eq!(payload.chunk_count, 3);
        assert!(payload.ingestion_timestamp.contains('T'));
    }

    #[test]
    fn test_error_payload_envelope() {
        let err = KbError::Validation(ValidationError::Empty { parameter: "query" });
        let payload = ErrorPayload::from(&err);
        assert!(!payload.success);
        assert_eq!(payload.error_type, "parameter_validation_error");
        assert!(!payload.error_message.is_empty());
    }

    #[test]
    fn test_request_deserialization_defaults() {
        let req: SearchDocumentsRequest = serde_json::from_str(r#"{"query": "q"}"#).unwrap();
        assert_eq!(req.limit, 10);

        let req: ListDocumentsRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.limit, 100);
        assert_eq!(req.offset, 0);
    }
}
