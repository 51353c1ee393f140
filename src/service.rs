//! Document pipeline orchestrator
//!
//! `DocumentService` wires the extractor, the embedding provider, and the
//! vector store together: extraction -> embedding -> store for ingestion,
//! embedding -> store -> metadata join for search. It owns the
//! distance-to-similarity conversion and excerpt truncation so the store
//! contract stays metric-agnostic. All components are constructed once at
//! process start and shared across concurrent tool calls.

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, FastEmbedManager};
use crate::error::{KbError, ValidationError};
use crate::github;
use crate::processor::ContentExtractor;
use crate::store::{DocumentStore, LanceStore};
use crate::types::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Display length cap for search result excerpts
const EXCERPT_MAX_CHARS: usize = 200;

/// Return early with `KbError::Cancelled` if the token has fired
macro_rules! check_cancelled {
    ($cancel:expr) => {
        if $cancel.is_cancelled() {
            tracing::info!("Operation cancelled");
            return Err(KbError::Cancelled);
        }
    };
}

pub struct DocumentService {
    config: Arc<Config>,
    extractor: ContentExtractor,
    embeddings: Arc<FastEmbedManager>,
    store: Arc<dyn DocumentStore>,
}

impl DocumentService {
    /// Create a service with configuration from file/environment
    pub async fn new() -> Result<Self, KbError> {
        let config = Config::new()?;
        Self::with_config(config).await
    }

    /// Create a service with explicit configuration
    ///
    /// Validates the configuration, constructs every component, and
    /// initializes the store tables. The embedding model itself stays
    /// unloaded until the first embedding request.
    pub async fn with_config(config: Config) -> Result<Self, KbError> {
        config.validate()?;

        tracing::info!("Initializing document service");
        tracing::debug!("Store path: {}", config.database.path.display());
        tracing::debug!("Embedding model: {}", config.embedding.model);
        tracing::debug!(
            "Chunking: size={} overlap={}",
            config.processing.chunk_size,
            config.processing.chunk_overlap
        );

        let embeddings = Arc::new(FastEmbedManager::new(&config.embedding)?);
        let extractor = ContentExtractor::new(&config.processing);
        let store: Arc<dyn DocumentStore> = Arc::new(LanceStore::new(
            &config.database.path,
            &config.database.table_prefix,
        ));

        store.initialize_database(embeddings.dimension()).await?;

        Ok(Self {
            config: Arc::new(config),
            extractor,
            embeddings,
            store,
        })
    }

    /// Ingest one file: extract, chunk, embed, persist
    pub async fn add_document(
        &self,
        file_path: &str,
        cancel: &CancellationToken,
    ) -> Result<AddDocumentResponse, KbError> {
        check_cancelled!(cancel);
        tracing::info!("Adding document: {}", file_path);

        let (metadata, mut chunks) = self
            .extractor
            .extract_and_chunk(Path::new(file_path))
            .map_err(|e| wrap_ingestion(file_path, e.into()))?;

        check_cancelled!(cancel);

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let embeddings = self
                .embeddings
                .generate_embeddings(texts)
                .await
                .map_err(|e| wrap_ingestion(file_path, e.into()))?;

            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = Some(embedding);
            }
        }

        check_cancelled!(cancel);

        self.store
            .add_document_vectors(&metadata, &chunks)
            .await
            .map_err(|e| wrap_ingestion(file_path, e.into()))?;

        tracing::info!(
            "Successfully added document {} with {} chunks",
            file_path,
            chunks.len()
        );

        let document = DocumentPayload::from(&metadata);
        let message = format!(
            "Document '{}' added successfully with {} chunks",
            metadata.file_name,
            chunks.len()
        );
        Ok(AddDocumentResponse {
            success: true,
            document,
            message,
        })
    }

    /// List documents in ingestion order with pagination
    pub async fn list_documents(
        &self,
        limit: Option<usize>,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<ListDocumentsResponse, KbError> {
        check_cancelled!(cancel);
        tracing::info!("Listing documents with limit={:?}, offset={}", limit, offset);

        let wrap = |e: KbError| wrap_listing(limit, offset, e);

        let documents = self
            .store
            .list_all_documents(limit, offset)
            .await
            .map_err(|e| wrap(e.into()))?;
        let total_count = self
            .store
            .get_document_count()
            .await
            .map_err(|e| wrap(e.into()))?;

        let payloads: Vec<DocumentPayload> = documents.iter().map(DocumentPayload::from).collect();
        let returned_count = payloads.len();

        let mut message = format!("Found {} documents", returned_count);
        if total_count > returned_count && returned_count > 0 {
            message.push_str(&format!(
                " (showing {}-{} of {})",
                offset + 1,
                offset + returned_count,
                total_count
            ));
        }

        Ok(ListDocumentsResponse {
            success: true,
            documents: payloads,
            pagination: Pagination {
                total_count,
                returned_count,
                offset,
                limit,
            },
            message,
        })
    }

    /// Search chunks by semantic similarity and join document metadata
    pub async fn search_documents(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, KbError> {
        check_cancelled!(cancel);

        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::Empty { parameter: "query" }.into());
        }

        tracing::info!("Searching documents: '{}' (limit {})", query, limit);
        let start = Instant::now();
        let wrap = |e: KbError| wrap_search(query, e);

        let query_embedding = self
            .embeddings
            .generate_embedding(query)
            .await
            .map_err(|e| wrap(e.into()))?;

        check_cancelled!(cancel);

        let vector_results = self
            .store
            .search_vectors(query_embedding, limit)
            .await
            .map_err(|e| wrap(e.into()))?;

        let mut results = Vec::with_capacity(vector_results.len());
        for hit in vector_results {
            // A clear racing this search can remove the document between the
            // vector lookup and the metadata join; such hits are dropped
            let Some(metadata) = self
                .store
                .get_document_metadata(&hit.document_id)
                .await
                .map_err(|e| wrap(e.into()))?
            else {
                tracing::debug!("Dropping hit for vanished document {}", hit.document_id);
                continue;
            };

            results.push(SearchResult {
                document_id: hit.document_id,
                document_path: metadata.file_path.clone(),
                relevance_score: to_relevance(hit.score),
                content_excerpt: make_excerpt(&hit.content),
                metadata: DocumentPayload::from(&metadata),
            });
        }

        let total_documents = self
            .store
            .get_document_count()
            .await
            .map_err(|e| wrap(e.into()))?;

        let result_count = results.len();
        let mut message = format!("Found {} relevant documents", result_count);
        if result_count == limit {
            message.push_str(&format!(" (showing top {})", limit));
        }

        tracing::info!("Search returned {} results for '{}'", result_count, query);

        Ok(SearchResponse {
            success: true,
            results,
            query: query.to_string(),
            result_count,
            search_metadata: SearchMetadata {
                query_processed: query.to_string(),
                embedding_model: self.embeddings.model_name().to_string(),
                search_time_ms: start.elapsed().as_millis() as u64,
                total_documents_searched: total_documents,
            },
            message,
        })
    }

    /// Remove every document and chunk from the store
    pub async fn clear_knowledge_base(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ClearResponse, KbError> {
        check_cancelled!(cancel);
        tracing::info!("Clearing knowledge base");

        let documents_removed = self
            .store
            .clear_all_documents()
            .await
            .map_err(|e| KbError::Clear {
                source: Box::new(e.into()),
            })?;

        tracing::info!("Cleared {} documents from knowledge base", documents_removed);

        Ok(ClearResponse {
            success: true,
            documents_removed,
            message: format!(
                "Successfully cleared {} documents from the knowledge base",
                documents_removed
            ),
        })
    }

    /// Clone a GitHub repository and ingest every supported file
    pub async fn add_repository(
        &self,
        url: &str,
        branch_override: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AddRepositoryResponse, KbError> {
        check_cancelled!(cancel);

        let parsed = github::parse_github_url(url)?;
        let branch = branch_override.or_else(|| parsed.branch.clone());
        tracing::info!(
            "Ingesting repository {} (branch {:?})",
            parsed.repo_url,
            branch
        );

        let extensions = self.config.processing.supported_extensions.clone();
        let clone_branch = branch.clone();
        let checkout = tokio::task::spawn_blocking(move || {
            github::fetch_repository(&parsed, clone_branch.as_deref(), &extensions)
        })
        .await
        .map_err(|e| KbError::Other(format!("repository fetch task failed: {}", e)))??;

        let mut documents_added = 0usize;
        let mut errors = Vec::new();

        for file in &checkout.files {
            check_cancelled!(cancel);
            let path = file.display().to_string();
            match self.add_document(&path, cancel).await {
                Ok(_) => documents_added += 1,
                Err(KbError::Cancelled) => return Err(KbError::Cancelled),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path, e);
                    errors.push(format!("{}: {}", path, e));
                }
            }
        }

        let documents_failed = errors.len();
        let message = format!(
            "Ingested {} of {} files from {}",
            documents_added,
            checkout.files.len(),
            checkout.repo_url
        );

        Ok(AddRepositoryResponse {
            success: true,
            repository: checkout.repo_url,
            branch,
            documents_added,
            documents_failed,
            errors,
            message,
        })
    }

    /// Point lookup by document id
    pub async fn get_document_by_id(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentPayload>, KbError> {
        let metadata = self.store.get_document_metadata(document_id).await?;
        Ok(metadata.as_ref().map(DocumentPayload::from))
    }

    /// Knowledge base statistics
    pub async fn get_statistics(&self) -> Result<StatisticsPayload, KbError> {
        let document_count = self.store.get_document_count().await?;
        Ok(StatisticsPayload {
            document_count,
            embedding_model: self.config.embedding.model.clone(),
            chunk_size: self.config.processing.chunk_size,
            supported_extensions: self.config.processing.supported_extensions.clone(),
        })
    }

    /// Release the embedding model and storage handles
    pub async fn cleanup(&self) {
        tracing::info!("Cleaning up document service");
        self.embeddings.cleanup().await;
        if let Err(e) = self.store.close().await {
            tracing::warn!("Failed to close store: {}", e);
        }
    }

    /// The configuration used by this service
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dimensionality of the configured embedding model
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension()
    }
}

/// Distance to similarity: smaller distance, higher score
fn to_relevance(distance: f32) -> f32 {
    let similarity = (1.0 - distance).clamp(0.0, 1.0);
    (similarity * 10_000.0).round() / 10_000.0
}

/// Truncate chunk content to the display length, marking the cut
fn make_excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let excerpt: String = chars.by_ref().take(EXCERPT_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", excerpt)
    } else {
        excerpt
    }
}

fn wrap_ingestion(path: &str, err: KbError) -> KbError {
    match err {
        KbError::Cancelled => KbError::Cancelled,
        e => KbError::Ingestion {
            path: path.to_string(),
            source: Box::new(e),
        },
    }
}

fn wrap_search(query: &str, err: KbError) -> KbError {
    match err {
        KbError::Cancelled => KbError::Cancelled,
        e => KbError::Search {
            query: query.to_string(),
            source: Box::new(e),
        },
    }
}

fn wrap_listing(limit: Option<usize>, offset: usize, err: KbError) -> KbError {
    match err {
        KbError::Cancelled => KbError::Cancelled,
        e => KbError::Listing {
            limit,
            offset,
            source: Box::new(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_relevance_inverts_distance() {
        assert_eq!(to_relevance(0.0), 1.0);
        assert_eq!(to_relevance(0.25), 0.75);
        assert_eq!(to_relevance(1.0), 0.0);
    }

    #[test]
    fn test_to_relevance_clamps_out_of_range() {
        // Distances above 1 (e.g. squared L2) must not go negative
        assert_eq!(to_relevance(3.5), 0.0);
        assert_eq!(to_relevance(-0.5), 1.0);
    }

    #[test]
    fn test_to_relevance_rounds_to_four_decimals() {
        assert_eq!(to_relevance(0.123_456), 0.8765);
    }

    #[test]
    fn test_excerpt_short_content_untouched() {
        assert_eq!(make_excerpt("short"), "short");
    }

    #[test]
    fn test_excerpt_truncates_with_marker() {
        let content = "x".repeat(250);
        let excerpt = make_excerpt(&content);
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_excerpt_exact_length_has_no_marker() {
        let content = "y".repeat(EXCERPT_MAX_CHARS);
        assert_eq!(make_excerpt(&content), content);
    }

    #[test]
    fn test_excerpt_multibyte_safe() {
        let content = "é".repeat(300);
        let excerpt = make_excerpt(&content);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 3);
    }

    #[test]
    fn test_wrap_ingestion_passes_cancellation_through() {
        let wrapped = wrap_ingestion("/a.txt", KbError::Cancelled);
        assert!(matches!(wrapped, KbError::Cancelled));

        let wrapped = wrap_ingestion("/a.txt", KbError::other("boom"));
        assert!(matches!(wrapped, KbError::Ingestion { .. }));
    }
}
