use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// FastEmbed-based embedding provider
///
/// The model is loaded lazily on first use behind a double-checked lock, so
/// concurrent first calls initialize it exactly once; `cleanup` releases it.
pub struct FastEmbedManager {
    model_name: String,
    model_kind: EmbeddingModel,
    dimension: usize,
    cache_dir: PathBuf,
    batch_size: usize,
    timeout_secs: u64,
    model: RwLock<Option<Arc<Mutex<TextEmbedding>>>>,
}

impl FastEmbedManager {
    /// Create a manager for the configured model; the weights are not loaded
    /// until the first embedding request
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let (model_kind, dimension) = Self::resolve_model(&config.model)?;

        Ok(Self {
            model_name: config.model.clone(),
            model_kind,
            dimension,
            cache_dir: config.cache_dir.clone(),
            batch_size: config.batch_size,
            timeout_secs: config.timeout_secs,
            model: RwLock::new(None),
        })
    }

    /// Map a model identifier to the fastembed model and its dimensionality
    fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), EmbeddingError> {
        // Accept both bare names and the sentence-transformers/ prefix the
        // upstream hub uses
        let short = name.strip_prefix("sentence-transformers/").unwrap_or(name);

        match short {
            "all-MiniLM-L6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
            "all-MiniLM-L12-v2" => Ok((EmbeddingModel::AllMiniLML12V2, 384)),
            "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => {
                Ok((EmbeddingModel::BGESmallENV15, 384))
            }
            "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => {
                Ok((EmbeddingModel::BGEBaseENV15, 768))
            }
            other => Err(EmbeddingError::UnknownModel(other.to_string())),
        }
    }

    /// Get the loaded model, initializing it on first call.
    ///
    /// Read lock first for the common path; the write lock plus re-check
    /// guarantees a single initialization under concurrent first calls.
    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>, EmbeddingError> {
        {
            let model = self.model.read().await;
            if let Some(ref m) = *model {
                return Ok(m.clone());
            }
        }

        let mut model = self.model.write().await;
        if let Some(ref m) = *model {
            return Ok(m.clone());
        }

        tracing::info!("Loading embedding model: {}", self.model_name);

        let kind = self.model_kind.clone();
        let cache_dir = self.cache_dir.clone();
        let name = self.model_name.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let mut options = InitOptions::default();
            options.model_name = kind;
            options.cache_dir = cache_dir;
            options.show_download_progress = false;
            TextEmbedding::try_new(options)
        })
        .await
        .map_err(|e| EmbeddingError::InitializationFailed {
            model: name.clone(),
            reason: format!("model load task failed: {}", e),
        })?
        .map_err(|e| EmbeddingError::InitializationFailed {
            model: name,
            reason: e.to_string(),
        })?;

        let arc = Arc::new(Mutex::new(loaded));
        *model = Some(arc.clone());

        tracing::info!(
            "Embedding model loaded ({} dimensions)",
            self.dimension
        );
        Ok(arc)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FastEmbedManager {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Degenerate inputs are rejected before touching the model
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let model = self.model().await?;
        let batch_size = self.batch_size;
        let count = texts.len();

        tracing::debug!("Generating embeddings for {} texts", count);

        let embed_task = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| EmbeddingError::GenerationFailed(format!("model lock poisoned: {}", e)))?;
            guard
                .embed(texts, Some(batch_size))
                .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))
        });

        let embeddings = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            embed_task,
        )
        .await
        .map_err(|_| EmbeddingError::Timeout(self.timeout_secs))?
        .map_err(|e| EmbeddingError::GenerationFailed(format!("embedding task failed: {}", e)))??;

        if embeddings.len() != count {
            return Err(EmbeddingError::GenerationFailed(format!(
                "expected {} embeddings, got {}",
                count,
                embeddings.len()
            )));
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut embeddings = self.generate_embeddings(vec![trimmed.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationFailed("no embedding produced".to_string()))
    }

    async fn load_model(&self) -> Result<(), EmbeddingError> {
        self.model().await.map(|_| ())
    }

    async fn cleanup(&self) {
        let mut model = self.model.write().await;
        if model.take().is_some() {
            tracing::info!("Released embedding model: {}", self.model_name);
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> FastEmbedManager {
        FastEmbedManager::new(&EmbeddingConfig::default()).unwrap()
    }

    #[test]
    fn test_resolve_default_model() {
        let (_, dim) =
            FastEmbedManager::resolve_model("sentence-transformers/all-MiniLM-L6-v2").unwrap();
        assert_eq!(dim, 384);

        let (_, dim) = FastEmbedManager::resolve_model("all-MiniLM-L6-v2").unwrap();
        assert_eq!(dim, 384);
    }

    #[test]
    fn test_resolve_bge_base_dimension() {
        let (_, dim) = FastEmbedManager::resolve_model("BAAI/bge-base-en-v1.5").unwrap();
        assert_eq!(dim, 768);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let err = FastEmbedManager::resolve_model("no-such-model").unwrap_err();
        assert!(matches!(err, EmbeddingError::UnknownModel(_)));
    }

    #[test]
    fn test_dimension_known_without_loading() {
        let manager = manager();
        assert_eq!(manager.dimension(), 384);
        assert_eq!(
            manager.model_name(),
            "sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_is_ok_without_model() {
        let manager = manager();
        let embeddings = manager.generate_embeddings(vec![]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_blank_text_rejected_before_model_load() {
        let manager = manager();

        let err = manager.generate_embedding("   ").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));

        let err = manager
            .generate_embeddings(vec!["ok".to_string(), "  ".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
    }

    #[tokio::test]
    async fn test_cleanup_without_load_is_noop() {
        let manager = manager();
        manager.cleanup().await;
        assert_eq!(manager.dimension(), 384);
    }
}
