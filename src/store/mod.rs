//! Vector store abstraction
//!
//! Two logical tables keyed by document id: one row per document, one row per
//! chunk. The store answers listing, point lookup, nearest-neighbor search,
//! and full clear; distance-to-similarity conversion is deliberately left to
//! the caller so the contract stays metric-agnostic.

mod lance_store;
pub use lance_store::LanceStore;

use crate::error::StoreError;
use crate::types::{DocumentChunk, DocumentMetadata};

/// A chunk-level nearest-neighbor match
#[derive(Debug, Clone)]
pub struct VectorQueryResult {
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    /// Raw distance to the query vector; smaller is closer
    pub score: f32,
}

/// Trait for document/chunk vector storage
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the documents and chunks tables if absent; idempotent.
    /// Fixes the store-wide embedding dimensionality.
    async fn initialize_database(&self, dimension: usize) -> Result<(), StoreError>;

    /// Persist one document and all its chunks as a single logical unit.
    /// On failure nothing from this call is observable to readers.
    async fn add_document_vectors(
        &self,
        metadata: &DocumentMetadata,
        chunks: &[DocumentChunk],
    ) -> Result<(), StoreError>;

    /// List documents in stable ingestion order with offset/limit paging;
    /// `limit = None` means unbounded
    async fn list_all_documents(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DocumentMetadata>, StoreError>;

    /// Total number of documents currently stored
    async fn get_document_count(&self) -> Result<usize, StoreError>;

    /// Point lookup by document id
    async fn get_document_metadata(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentMetadata>, StoreError>;

    /// Up to `limit` chunk matches ordered by ascending distance, ties broken
    /// by (chunk_index, document_id)
    async fn search_vectors(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<VectorQueryResult>, StoreError>;

    /// Delete every document and chunk; returns the number of documents
    /// removed. Exclusive with concurrent ingestion.
    async fn clear_all_documents(&self) -> Result<usize, StoreError>;

    /// Release underlying storage handles
    async fn close(&self) -> Result<(), StoreError>;
}
