//! Embedding provider trait and factory.

use crate::types::KnowledgeConfig;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// Implementations must be deterministic for identical input and return the
/// same dimension on every call; the index treats a dimension change as a
/// fatal consistency error.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results.pop().ok_or_else(|| {
            AppError::ProviderUnavailable("No embedding returned".to_string())
        })
    }
}

/// Create an embedding provider from configuration.
///
/// Probes the backend with a test embedding where the backend is remote, so
/// a misconfigured or unreachable provider fails here rather than halfway
/// through an index build.
pub async fn create_provider(config: &KnowledgeConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "trigram" => {
            let provider =
                super::providers::trigram::TrigramProvider::new(config.dimensions as usize);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::ollama::OllamaProvider::connect(
                &config.model,
                config.dimensions as usize,
            )
            .await?;
            Ok(Arc::new(provider))
        }

        other => Err(AppError::ProviderUnavailable(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_trigram_provider() {
        let config = KnowledgeConfig::default();
        let provider = create_provider(&config).await.unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.dimensions(), 384);
    }

    #[tokio::test]
    async fn test_create_unknown_provider() {
        let mut config = KnowledgeConfig::default();
        config.provider = "nonexistent".to_string();

        let result = create_provider(&config).await;
        assert!(matches!(result, Err(AppError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let config = KnowledgeConfig::default();
        let provider = create_provider(&config).await.unwrap();

        let embedding = provider.embed("probe text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
