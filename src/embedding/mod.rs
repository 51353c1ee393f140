mod fastembed_manager;

pub use fastembed_manager::FastEmbedManager;

use crate::error::EmbeddingError;

/// Trait for embedding generation
///
/// Implementations own the model lifecycle: lazy load on first use, explicit
/// release via `cleanup`. Vector dimensionality is fixed per model and known
/// without loading the weights.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate one embedding per input text, order-preserving
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Generate an embedding for a single text
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Force the model to load now instead of on first use
    async fn load_model(&self) -> Result<(), EmbeddingError>;

    /// Release the loaded model
    async fn cleanup(&self);

    /// Dimensionality of the vectors this model produces
    fn dimension(&self) -> usize;

    /// The configured model identifier
    fn model_name(&self) -> &str;
}
