//! LanceDB implementation of `DocumentStore`
//!
//! Documents and chunks live in two tables named `{prefix}documents` and
//! `{prefix}chunks` under a shared storage path, so several logical knowledge
//! bases can coexist in one directory. `add_document_vectors` writes chunk
//! rows first and the document row last; every read path joins through the
//! document row, which makes it the commit point for the whole write.

use crate::error::StoreError;
use crate::store::{DocumentStore, VectorQueryResult};
use crate::types::{DocumentChunk, DocumentMetadata};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array, UInt64Array, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

pub struct LanceStore {
    db_path: String,
    documents_table: String,
    chunks_table: String,
    connection: RwLock<Option<Connection>>,
    /// Fixed at initialize_database; every write is checked against it
    dimension: OnceLock<usize>,
    /// Document writes take this shared; clear takes it exclusively
    write_gate: RwLock<()>,
    #[cfg(test)]
    fail_before_document_write: std::sync::atomic::AtomicBool,
}

impl LanceStore {
    /// Create a store rooted at `db_path` with the given table-name prefix
    pub fn new(db_path: &Path, table_prefix: &str) -> Self {
        Self {
            db_path: db_path.to_string_lossy().to_string(),
            documents_table: format!("{}documents", table_prefix),
            chunks_table: format!("{}chunks", table_prefix),
            connection: RwLock::new(None),
            dimension: OnceLock::new(),
            write_gate: RwLock::new(()),
            #[cfg(test)]
            fail_before_document_write: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Get or open the connection
    async fn connection(&self) -> Result<Connection, StoreError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn = self.connection.write().await;
        if let Some(ref c) = *conn {
            return Ok(c.clone());
        }

        tracing::info!("Connecting to LanceDB at: {}", self.db_path);
        let new_conn = lancedb::connect(&self.db_path)
            .execute()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        *conn = Some(new_conn.clone());
        Ok(new_conn)
    }

    fn dimension(&self) -> Result<usize, StoreError> {
        self.dimension.get().copied().ok_or(StoreError::NotInitialized)
    }

    fn documents_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("file_name", DataType::Utf8, false),
            Field::new("file_size", DataType::UInt64, false),
            Field::new("file_type", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("ingestion_timestamp", DataType::Utf8, false),
            Field::new("chunk_count", DataType::UInt32, false),
        ]))
    }

    fn chunks_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self, name: &str) -> Result<Table, StoreError> {
        let connection = self.connection().await?;
        connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| StoreError::ReadFailed(format!("Failed to open table '{}': {}", name, e)))
    }

    /// Create a table with an empty batch if it does not exist yet
    async fn ensure_table(&self, name: &str, schema: Arc<Schema>) -> Result<(), StoreError> {
        let connection = self.connection().await?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::InitializationFailed(e.to_string()))?;

        if table_names.contains(&name.to_string()) {
            return Ok(());
        }

        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        connection
            .create_table(name, Box::new(batches))
            .execute()
            .await
            .map_err(|e| {
                StoreError::InitializationFailed(format!(
                    "Failed to create table '{}': {}",
                    name, e
                ))
            })?;

        tracing::info!("Created table '{}'", name);
        Ok(())
    }

    /// Validate the write-time invariants and collect the embeddings
    fn validate_write(
        &self,
        metadata: &DocumentMetadata,
        chunks: &[DocumentChunk],
        dimension: usize,
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        if metadata.chunk_count != chunks.len() {
            return Err(StoreError::Integrity(format!(
                "chunk_count {} does not match {} chunk records for document {}",
                metadata.chunk_count,
                chunks.len(),
                metadata.id
            )));
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.document_id != metadata.id {
                return Err(StoreError::Integrity(format!(
                    "chunk {} references document {} instead of {}",
                    chunk.id, chunk.document_id, metadata.id
                )));
            }
            if chunk.chunk_index != index {
                return Err(StoreError::Integrity(format!(
                    "chunk indices for document {} are not dense: expected {}, got {}",
                    metadata.id, index, chunk.chunk_index
                )));
            }
            let embedding = chunk.embedding.clone().ok_or_else(|| {
                StoreError::Integrity(format!(
                    "chunk {} of document {} has no embedding",
                    chunk.chunk_index, metadata.id
                ))
            })?;
            if embedding.len() != dimension {
                return Err(StoreError::Integrity(format!(
                    "embedding dimension {} does not match store dimension {}",
                    embedding.len(),
                    dimension
                )));
            }
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    fn chunks_batch(
        chunks: &[DocumentChunk],
        embeddings: Vec<Vec<f32>>,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch, StoreError> {
        let dimension = embeddings
            .first()
            .map(|e| e.len())
            .unwrap_or_default();

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            embeddings
                .into_iter()
                .map(|v| Some(v.into_iter().map(Some))),
            dimension as i32,
        );

        let id_array = StringArray::from(chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>());
        let document_id_array = StringArray::from(
            chunks
                .iter()
                .map(|c| c.document_id.as_str())
                .collect::<Vec<_>>(),
        );
        let index_array = UInt32Array::from(
            chunks
                .iter()
                .map(|c| c.chunk_index as u32)
                .collect::<Vec<_>>(),
        );
        let content_array = StringArray::from(
            chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>(),
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(id_array),
                Arc::new(document_id_array),
                Arc::new(index_array),
                Arc::new(content_array),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(format!("Failed to create chunk batch: {}", e)))
    }

    fn document_batch(
        metadata: &DocumentMetadata,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch, StoreError> {
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![metadata.id.as_str()])),
                Arc::new(StringArray::from(vec![metadata.file_path.as_str()])),
                Arc::new(StringArray::from(vec![metadata.file_name.as_str()])),
                Arc::new(UInt64Array::from(vec![metadata.file_size])),
                Arc::new(StringArray::from(vec![metadata.file_type.as_str()])),
                Arc::new(StringArray::from(vec![metadata.content_hash.as_str()])),
                Arc::new(StringArray::from(vec![
                    metadata.ingestion_timestamp.to_rfc3339(),
                ])),
                Arc::new(UInt32Array::from(vec![metadata.chunk_count as u32])),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(format!("Failed to create document batch: {}", e)))
    }

    async fn write_batch(
        &self,
        table_name: &str,
        batch: RecordBatch,
        schema: Arc<Schema>,
    ) -> Result<(), StoreError> {
        let table = self.open_table(table_name).await?;
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    /// Vector width of the persisted chunks table, if any
    async fn persisted_dimension(&self) -> Result<Option<usize>, StoreError> {
        let table = self.open_table(&self.chunks_table).await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        match schema.field_with_name("vector").map(|f| f.data_type().clone()) {
            Ok(DataType::FixedSizeList(_, size)) => Ok(Some(size as usize)),
            _ => Ok(None),
        }
    }

    /// Compensation path: remove chunk rows for a document whose metadata
    /// write did not complete
    async fn delete_chunks_for_document(&self, document_id: &str) -> Result<(), StoreError> {
        let table = self.open_table(&self.chunks_table).await?;
        let filter = format!("document_id = '{}'", document_id.replace('\'', "''"));
        table
            .delete(&filter)
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn parse_documents(batch: &RecordBatch) -> Result<Vec<DocumentMetadata>, StoreError> {
        let id = string_column(batch, "id")?;
        let file_path = string_column(batch, "file_path")?;
        let file_name = string_column(batch, "file_name")?;
        let file_size = batch
            .column_by_name("file_size")
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| StoreError::ReadFailed("Missing file_size column".to_string()))?;
        let file_type = string_column(batch, "file_type")?;
        let content_hash = string_column(batch, "content_hash")?;
        let ingestion_timestamp = string_column(batch, "ingestion_timestamp")?;
        let chunk_count = batch
            .column_by_name("chunk_count")
            .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
            .ok_or_else(|| StoreError::ReadFailed("Missing chunk_count column".to_string()))?;

        let mut documents = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let timestamp = DateTime::parse_from_rfc3339(ingestion_timestamp.value(i))
                .map_err(|e| {
                    StoreError::ReadFailed(format!("Invalid stored timestamp: {}", e))
                })?
                .with_timezone(&Utc);

            documents.push(DocumentMetadata {
                id: id.value(i).to_string(),
                file_path: file_path.value(i).to_string(),
                file_name: file_name.value(i).to_string(),
                file_size: file_size.value(i),
                file_type: file_type.value(i).to_string(),
                content_hash: content_hash.value(i).to_string(),
                ingestion_timestamp: timestamp,
                chunk_count: chunk_count.value(i) as usize,
            });
        }
        Ok(documents)
    }

    async fn scan_documents(&self) -> Result<Vec<DocumentMetadata>, StoreError> {
        let table = self.open_table(&self.documents_table).await?;

        let stream = table
            .query()
            .execute()
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let mut documents = Vec::new();
        for batch in &batches {
            documents.extend(Self::parse_documents(batch)?);
        }

        // Physical row order is not guaranteed stable; sort by ingestion
        // order with the id as a deterministic tie-break
        documents.sort_by(|a, b| {
            a.ingestion_timestamp
                .cmp(&b.ingestion_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(documents)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::ReadFailed(format!("Missing column '{}'", name)))
}

#[async_trait::async_trait]
impl DocumentStore for LanceStore {
    async fn initialize_database(&self, dimension: usize) -> Result<(), StoreError> {
        if let Some(existing) = self.dimension.get() {
            if *existing != dimension {
                return Err(StoreError::InitializationFailed(format!(
                    "store dimension already fixed at {}, cannot reinitialize with {}",
                    existing, dimension
                )));
            }
        } else {
            // A racing initializer setting the same value is fine
            let _ = self.dimension.set(dimension);
        }

        tracing::info!(
            "Initializing vector store at {} (dimension {})",
            self.db_path,
            dimension
        );

        self.ensure_table(&self.documents_table, Self::documents_schema())
            .await?;
        self.ensure_table(&self.chunks_table, Self::chunks_schema(dimension))
            .await?;

        // A pre-existing chunks table written by a different model is a
        // configuration error, not something to discover on first write
        let persisted = self.persisted_dimension().await?;
        if let Some(persisted) = persisted {
            if persisted != dimension {
                return Err(StoreError::InitializationFailed(format!(
                    "existing chunks table holds {}-dimensional vectors, configured model produces {}",
                    persisted, dimension
                )));
            }
        }

        Ok(())
    }

    async fn add_document_vectors(
        &self,
        metadata: &DocumentMetadata,
        chunks: &[DocumentChunk],
    ) -> Result<(), StoreError> {
        let dimension = self.dimension()?;
        let embeddings = self.validate_write(metadata, chunks, dimension)?;

        let _shared = self.write_gate.read().await;

        if !chunks.is_empty() {
            let schema = Self::chunks_schema(dimension);
            let batch = Self::chunks_batch(chunks, embeddings, schema.clone())?;
            self.write_batch(&self.chunks_table, batch, schema).await?;
        }

        #[cfg(test)]
        let inject_failure = self
            .fail_before_document_write
            .load(std::sync::atomic::Ordering::SeqCst);
        #[cfg(not(test))]
        let inject_failure = false;

        let document_write = if inject_failure {
            Err(StoreError::WriteFailed(
                "injected failure before document write".to_string(),
            ))
        } else {
            let schema = Self::documents_schema();
            match Self::document_batch(metadata, schema.clone()) {
                Ok(batch) => self.write_batch(&self.documents_table, batch, schema).await,
                Err(e) => Err(e),
            }
        };

        if let Err(e) = document_write {
            // The document row is the commit point; roll the chunk rows back
            if !chunks.is_empty() {
                if let Err(cleanup) = self.delete_chunks_for_document(&metadata.id).await {
                    tracing::warn!(
                        "Failed to remove chunks for aborted document {}: {}",
                        metadata.id,
                        cleanup
                    );
                }
            }
            return Err(e);
        }

        tracing::debug!(
            "Stored document {} with {} chunks",
            metadata.id,
            chunks.len()
        );
        Ok(())
    }

    async fn list_all_documents(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DocumentMetadata>, StoreError> {
        let documents = self.scan_documents().await?;
        let page = documents
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }

    async fn get_document_count(&self) -> Result<usize, StoreError> {
        let table = self.open_table(&self.documents_table).await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))
    }

    async fn get_document_metadata(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        let table = self.open_table(&self.documents_table).await?;

        let stream = table
            .query()
            .only_if(format!("id = '{}'", document_id.replace('\'', "''")))
            .limit(1)
            .execute()
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        for batch in &batches {
            if let Some(document) = Self::parse_documents(batch)?.into_iter().next() {
                return Ok(Some(document));
            }
        }
        Ok(None)
    }

    async fn search_vectors(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<VectorQueryResult>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let dimension = self.dimension()?;
        if query_vector.len() != dimension {
            return Err(StoreError::Integrity(format!(
                "query vector dimension {} does not match store dimension {}",
                query_vector.len(),
                dimension
            )));
        }

        let table = self.open_table(&self.chunks_table).await?;

        let stream = table
            .vector_search(query_vector)
            .map_err(|e| StoreError::SearchFailed(e.to_string()))?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| StoreError::SearchFailed(e.to_string()))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| StoreError::SearchFailed(e.to_string()))?;

        let mut results = Vec::new();
        for batch in &batches {
            let document_id = string_column(batch, "document_id")?;
            let content = string_column(batch, "content")?;
            let chunk_index = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
                .ok_or_else(|| StoreError::SearchFailed("Missing chunk_index column".to_string()))?;
            let distance = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| StoreError::SearchFailed("Missing _distance column".to_string()))?;

            for i in 0..batch.num_rows() {
                results.push(VectorQueryResult {
                    document_id: document_id.value(i).to_string(),
                    chunk_index: chunk_index.value(i) as usize,
                    content: content.value(i).to_string(),
                    score: distance.value(i),
                });
            }
        }

        // Nearest first; ties resolved deterministically
        results.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn clear_all_documents(&self) -> Result<usize, StoreError> {
        let _exclusive = self.write_gate.write().await;

        let removed = self.get_document_count().await?;

        let connection = self.connection().await?;
        for name in [&self.documents_table, &self.chunks_table] {
            connection
                .drop_table(name)
                .await
                .map_err(|e| StoreError::ClearFailed(format!("Failed to drop '{}': {}", name, e)))?;
        }

        let dimension = self.dimension()?;
        self.ensure_table(&self.documents_table, Self::documents_schema())
            .await
            .map_err(|e| StoreError::ClearFailed(e.to_string()))?;
        self.ensure_table(&self.chunks_table, Self::chunks_schema(dimension))
            .await
            .map_err(|e| StoreError::ClearFailed(e.to_string()))?;

        tracing::info!("Cleared {} documents from the store", removed);
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.write().await;
        if conn.take().is_some() {
            tracing::info!("Closed vector store at {}", self.db_path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn test_metadata(id: &str, chunk_count: usize) -> DocumentMetadata {
        DocumentMetadata {
            id: id.to_string(),
            file_path: format!("/docs/{}.txt", id),
            file_name: format!("{}.txt", id),
            file_size: 123,
            file_type: "text".to_string(),
            content_hash: "abc123".to_string(),
            ingestion_timestamp: Utc::now(),
            chunk_count,
        }
    }

    fn test_chunks(document_id: &str, embeddings: &[Vec<f32>]) -> Vec<DocumentChunk> {
        embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut chunk =
                    DocumentChunk::new(document_id, i, format!("chunk {} of {}", i, document_id));
                chunk.embedding = Some(e.clone());
                chunk
            })
            .collect()
    }

    async fn test_store(dir: &TempDir) -> LanceStore {
        let store = LanceStore::new(&dir.path().join("db"), "test_");
        store.initialize_database(DIM).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_initialize_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        store.initialize_database(DIM).await.unwrap();
        assert_eq!(store.get_document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_initialize_rejects_dimension_change() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        let err = store.initialize_database(DIM + 1).await.unwrap_err();
        assert!(matches!(err, StoreError::InitializationFailed(_)));
    }

    #[tokio::test]
    async fn test_persisted_dimension_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");

        let store = LanceStore::new(&path, "test_");
        store.initialize_database(DIM).await.unwrap();

        // A fresh handle over the same tables with a different model width
        let reopened = LanceStore::new(&path, "test_");
        let err = reopened.initialize_database(DIM * 2).await.unwrap_err();
        assert!(matches!(err, StoreError::InitializationFailed(_)));

        // The original width still initializes cleanly
        let same = LanceStore::new(&path, "test_");
        same.initialize_database(DIM).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_and_point_lookup() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 2);
        let chunks = test_chunks("doc-1", &[vec![0.1; DIM], vec![0.2; DIM]]);
        store.add_document_vectors(&metadata, &chunks).await.unwrap();

        let found = store.get_document_metadata("doc-1").await.unwrap().unwrap();
        assert_eq!(found.id, "doc-1");
        assert_eq!(found.chunk_count, 2);
        assert_eq!(found.file_name, "doc-1.txt");

        assert!(store.get_document_metadata("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunk_count_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 3);
        let chunks = test_chunks("doc-1", &[vec![0.1; DIM]]);
        let err = store
            .add_document_vectors(&metadata, &chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
        assert_eq!(store.get_document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_embedding_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 1);
        let chunks = vec![DocumentChunk::new("doc-1", 0, "no vector".to_string())];
        let err = store
            .add_document_vectors(&metadata, &chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 1);
        let chunks = test_chunks("doc-1", &[vec![0.1; DIM + 3]]);
        let err = store
            .add_document_vectors(&metadata, &chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_non_dense_indices_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 2);
        let mut chunks = test_chunks("doc-1", &[vec![0.1; DIM], vec![0.2; DIM]]);
        chunks[1].chunk_index = 5;
        let err = store
            .add_document_vectors(&metadata, &chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_atomicity_failure_between_chunk_and_document_write() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 2);
        let chunks = test_chunks("doc-1", &[vec![0.1; DIM], vec![0.2; DIM]]);

        store
            .fail_before_document_write
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = store.add_document_vectors(&metadata, &chunks).await;
        assert!(err.is_err());
        store
            .fail_before_document_write
            .store(false, std::sync::atomic::Ordering::SeqCst);

        // Nothing from the failed call is visible: no document, no chunks
        assert_eq!(store.get_document_count().await.unwrap(), 0);
        assert!(store.get_document_metadata("doc-1").await.unwrap().is_none());
        let hits = store.search_vectors(vec![0.1; DIM], 10).await.unwrap();
        assert!(hits.is_empty());

        // The same write succeeds afterwards
        store.add_document_vectors(&metadata, &chunks).await.unwrap();
        assert_eq!(store.get_document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listing_order_and_pagination() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let base = Utc::now();
        for i in 0..5i64 {
            let mut metadata = test_metadata(&format!("doc-{}", i), 1);
            metadata.ingestion_timestamp = base + chrono::Duration::seconds(i);
            let chunks = test_chunks(&metadata.id, &[vec![i as f32 / 10.0; DIM]]);
            store.add_document_vectors(&metadata, &chunks).await.unwrap();
        }

        let all = store.list_all_documents(None, 0).await.unwrap();
        assert_eq!(all.len(), 5);
        let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-0", "doc-1", "doc-2", "doc-3", "doc-4"]);

        // documents[offset..offset+limit] of the full ordering
        let page = store.list_all_documents(Some(2), 1).await.unwrap();
        let page_ids: Vec<&str> = page.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(page_ids, vec!["doc-1", "doc-2"]);

        let tail = store.list_all_documents(Some(10), 4).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].id, "doc-4");

        let past_end = store.list_all_documents(Some(10), 9).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        // doc-near sits at the query point, doc-far does not
        let near = test_metadata("doc-near", 1);
        store
            .add_document_vectors(&near, &test_chunks("doc-near", &[vec![1.0; DIM]]))
            .await
            .unwrap();
        let far = test_metadata("doc-far", 1);
        store
            .add_document_vectors(&far, &test_chunks("doc-far", &[vec![-1.0; DIM]]))
            .await
            .unwrap();

        let results = store.search_vectors(vec![1.0; DIM], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "doc-near");
        assert!(results[0].score <= results[1].score);
    }

    #[tokio::test]
    async fn test_search_ties_break_deterministically() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        // Two identical vectors in different documents: equal distance
        for id in ["doc-b", "doc-a"] {
            let metadata = test_metadata(id, 1);
            store
                .add_document_vectors(&metadata, &test_chunks(id, &[vec![0.5; DIM]]))
                .await
                .unwrap();
        }

        let first = store.search_vectors(vec![0.5; DIM], 2).await.unwrap();
        let second = store.search_vectors(vec![0.5; DIM], 2).await.unwrap();

        let first_ids: Vec<&str> = first.iter().map(|r| r.document_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
        // Equal chunk_index, so document_id decides
        assert_eq!(first_ids, vec!["doc-a", "doc-b"]);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 4);
        let chunks = test_chunks(
            "doc-1",
            &[
                vec![0.1; DIM],
                vec![0.2; DIM],
                vec![0.3; DIM],
                vec![0.4; DIM],
            ],
        );
        store.add_document_vectors(&metadata, &chunks).await.unwrap();

        let results = store.search_vectors(vec![0.1; DIM], 2).await.unwrap();
        assert_eq!(results.len(), 2);

        let none = store.search_vectors(vec![0.1; DIM], 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let err = store.search_vectors(vec![0.1; DIM + 1], 5).await.unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_clear_counts_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        for i in 0..2 {
            let metadata = test_metadata(&format!("doc-{}", i), 1);
            let chunks = test_chunks(&metadata.id, &[vec![0.3; DIM]]);
            store.add_document_vectors(&metadata, &chunks).await.unwrap();
        }

        assert_eq!(store.clear_all_documents().await.unwrap(), 2);
        assert_eq!(store.get_document_count().await.unwrap(), 0);
        assert!(store.list_all_documents(None, 0).await.unwrap().is_empty());
        assert!(store.search_vectors(vec![0.3; DIM], 5).await.unwrap().is_empty());

        // Second clear removes nothing
        assert_eq!(store.clear_all_documents().await.unwrap(), 0);

        // Store remains writable after a clear
        let metadata = test_metadata("doc-after", 1);
        let chunks = test_chunks("doc-after", &[vec![0.9; DIM]]);
        store.add_document_vectors(&metadata, &chunks).await.unwrap();
        assert_eq!(store.get_document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_document_with_zero_chunks() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("empty-doc", 0);
        store.add_document_vectors(&metadata, &[]).await.unwrap();

        assert_eq!(store.get_document_count().await.unwrap(), 1);
        let found = store
            .get_document_metadata("empty-doc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let metadata = test_metadata("doc-1", 1);
        let chunks = test_chunks("doc-1", &[vec![0.7; DIM]]);
        store.add_document_vectors(&metadata, &chunks).await.unwrap();

        store.close().await.unwrap();

        // The lazy connection re-opens on the next call
        assert_eq!(store.get_document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_stores_share_root_with_different_prefixes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");

        let store_a = LanceStore::new(&path, "a_");
        store_a.initialize_database(DIM).await.unwrap();
        let store_b = LanceStore::new(&path, "b_");
        store_b.initialize_database(DIM).await.unwrap();

        let metadata = test_metadata("doc-1", 1);
        let chunks = test_chunks("doc-1", &[vec![0.2; DIM]]);
        store_a.add_document_vectors(&metadata, &chunks).await.unwrap();

        assert_eq!(store_a.get_document_count().await.unwrap(), 1);
        assert_eq!(store_b.get_document_count().await.unwrap(), 0);
    }
}
