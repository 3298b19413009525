// src/embeddings/mod.rs
// Embedding provider abstraction with a coalescing cache

mod ollama;
mod openai;

pub use self::ollama::OllamaEmbeddings;
pub use self::openai::OpenAiCompatEmbeddings;

use crate::config::{CacheConfig, Config};
use crate::error::{MnemoError, Result};
use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Backend contract every embedding provider implements
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, preserving order
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> String;
}

/// Embedding client with dimension enforcement and an LRU/TTL cache.
///
/// Cache keys are SHA-256 of the trimmed text, so concurrent identical
/// requests coalesce into a single provider call (`try_get_with`).
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingClient {
    pub fn with_provider(
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        cache_cfg: &CacheConfig,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_cfg.capacity)
            .time_to_live(Duration::from_secs(cache_cfg.ttl_secs.max(1)))
            .build();
        Self {
            provider,
            dimension,
            cache,
        }
    }

    /// Select a provider from config.
    ///
    /// `embeddingProvider` names the provider type; the matching
    /// `llmProviders` entry must carry the "embedding" capability.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self> {
        let wanted = config.embedding_provider.as_str();
        let entry = config
            .llm_providers
            .iter()
            .find(|p| p.provider_type == wanted && p.has_capability("embedding"))
            .ok_or_else(|| {
                MnemoError::InvalidParameter(format!(
                    "no embedding-capable provider of type '{wanted}' configured"
                ))
            })?;

        let model = if config.embedding_model.is_empty() {
            None
        } else {
            Some(config.embedding_model.clone())
        };

        let provider: Arc<dyn EmbeddingProvider> = match entry.provider_type.as_str() {
            "ollama" => Arc::new(OllamaEmbeddings::new(entry.base_url.clone(), model, http)),
            _ => Arc::new(OpenAiCompatEmbeddings::new(
                entry.base_url.clone(),
                crate::config::api_key_for(&entry.provider_type, entry.api_key.as_deref()),
                model,
                http,
            )),
        };
        info!(
            provider = provider.provider_name(),
            model = %provider.model_name(),
            dimensions = config.embedding_dimension_or_default(),
            "Embedding client initialized"
        );
        Ok(Self::with_provider(
            provider,
            config.embedding_dimension_or_default(),
            &config.cache,
        ))
    }

    pub fn dimensions(&self) -> usize {
        self.dimension
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> String {
        self.provider.model_name()
    }

    /// Embed one text, serving from the cache when possible
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key(text);
        let provider = self.provider.clone();
        let dimension = self.dimension;
        let owned = text.trim().to_string();
        let entry = self
            .cache
            .try_get_with(key, async move {
                let mut vectors = provider.embed_texts(&[owned]).await?;
                let vector = vectors
                    .pop()
                    .ok_or_else(|| MnemoError::Provider("empty embedding response".to_string()))?;
                check_dimension(&vector, dimension)?;
                Ok::<Arc<Vec<f32>>, MnemoError>(Arc::new(vector))
            })
            .await
            .map_err(|e: Arc<MnemoError>| (*e).clone())?;
        Ok(entry.as_ref().clone())
    }

    /// Embed many texts, batching the cache misses into one provider call
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut missing: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(hit) = self.cache.get(&cache_key(text)).await {
                results[i] = Some(hit.as_ref().clone());
            } else {
                missing.push((i, text.trim().to_string()));
            }
        }
        debug!(
            total = texts.len(),
            misses = missing.len(),
            "batch embedding request"
        );

        if !missing.is_empty() {
            let inputs: Vec<String> = missing.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.provider.embed_texts(&inputs).await?;
            if vectors.len() != inputs.len() {
                return Err(MnemoError::MalformedResponse(format!(
                    "provider returned {} embeddings for {} inputs",
                    vectors.len(),
                    inputs.len()
                )));
            }
            for ((i, text), vector) in missing.into_iter().zip(vectors) {
                check_dimension(&vector, self.dimension)?;
                let shared = Arc::new(vector);
                self.cache.insert(cache_key(&text), shared.clone()).await;
                results[i] = Some(shared.as_ref().clone());
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Cached entry count (diagnostics)
    pub fn cache_len(&self) -> u64 {
        self.cache.entry_count()
    }
}

fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(MnemoError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// SHA-256 of the trimmed text
fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}
