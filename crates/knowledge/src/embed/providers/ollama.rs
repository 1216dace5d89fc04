//! Ollama embedding provider.
//!
//! Calls a local Ollama server for neural embeddings (e.g. nomic-embed-text).
//! Requests retry with exponential backoff, every response is checked
//! against the configured dimension, and construction probes the server
//! with a test embedding so an unreachable or misconfigured backend fails
//! fast as `ProviderUnavailable`.

use crate::embed::provider::EmbeddingProvider;
use grounded_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Connect to Ollama and verify the model answers with the expected
    /// dimension.
    ///
    /// The base URL comes from `OLLAMA_URL` when set. Mirrors the startup
    /// probe the index lifecycle depends on: a provider that constructs
    /// successfully is ready to embed.
    pub async fn connect(model: &str, dimensions: usize) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::ProviderUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());

        let provider = Self {
            client,
            base_url,
            model: model.to_string(),
            dimensions,
        };

        debug!("Probing Ollama at {} with model '{}'", provider.base_url, provider.model);
        let probe = provider.embed_with_retries("probe").await.map_err(|e| {
            AppError::ProviderUnavailable(format!(
                "Ollama not available at {}: {}. Ensure the server is running and run: ollama pull {}",
                provider.base_url, e, provider.model
            ))
        })?;

        debug!(
            "Ollama model '{}' ready, embedding dimension {}",
            provider.model,
            probe.len()
        );

        Ok(provider)
    }

    async fn embed_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < MAX_RETRIES {
            match self.embed_once(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    attempt += 1;
                    last_error = Some(e);

                    if attempt < MAX_RETRIES {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
                        warn!(
                            "Embedding request failed (attempt {}/{}), retrying in {}ms",
                            attempt, MAX_RETRIES, backoff_ms
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::ProviderUnavailable("Unknown embedding error".to_string())
        }))
    }

    async fn embed_once(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::ProviderUnavailable(format!("Request to Ollama failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);

            return Err(AppError::ProviderUnavailable(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::ProviderUnavailable(format!("Failed to parse Ollama response: {}", e))
        })?;

        if body.embedding.len() != self.dimensions {
            return Err(AppError::ProviderUnavailable(format!(
                "Model '{}' returned {} dimensions, expected {}",
                self.model,
                body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(body.embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} texts", texts.len());

        // The embeddings endpoint takes one prompt at a time; requests run
        // sequentially and rely on the per-request retry logic.
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                warn!("Empty text at batch index {}, embedding zero vector", i);
                embeddings.push(vec![0.0; self.dimensions]);
                continue;
            }

            embeddings.push(self.embed_with_retries(text).await?);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// These tests need a running Ollama server; they are skipped when one
    /// is not reachable.
    async fn connect_or_skip() -> Option<OllamaProvider> {
        match OllamaProvider::connect("nomic-embed-text", 768).await {
            Ok(provider) => Some(provider),
            Err(_) => {
                eprintln!("Skipping test: Ollama not running");
                None
            }
        }
    }

    #[tokio::test]
    async fn test_embed_single() {
        let Some(provider) = connect_or_skip().await else {
            return;
        };

        let embedding = provider.embed("Hello, world!").await.unwrap();
        assert_eq!(embedding.len(), 768);
        assert!(embedding.iter().any(|&x| x != 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let Some(provider) = connect_or_skip().await else {
            return;
        };

        let texts = vec!["First text".to_string(), "Second text".to_string()];
        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        for embedding in embeddings {
            assert_eq!(embedding.len(), 768);
        }
    }

    #[tokio::test]
    async fn test_provider_metadata() {
        let Some(provider) = connect_or_skip().await else {
            return;
        };

        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }
}
