// src/embeddings/ollama.rs
// Ollama embeddings via the OpenAI-compatible /v1/embeddings endpoint

use super::EmbeddingProvider;
use crate::error::{MnemoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Default Ollama embedding model
const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Max texts per request (conservative for local models)
const MAX_BATCH_SIZE: usize = 64;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Ollama embeddings client (no auth required)
pub struct OllamaEmbeddings {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(base_url: String, model: Option<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            http,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(count = texts.len(), model = %self.model, "ollama embedding request");
        let resp = self
            .http
            .post(self.api_url())
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| MnemoError::Provider(format!("ollama request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(MnemoError::Provider(format!(
                "ollama API error {status}: {text}"
            )));
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| MnemoError::MalformedResponse(format!("ollama response: {e}")))?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            all.extend(self.embed_chunk(chunk).await?);
        }
        Ok(all)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_strips_trailing_slash() {
        let client = OllamaEmbeddings::new(
            "http://localhost:11434/".to_string(),
            None,
            reqwest::Client::new(),
        );
        assert_eq!(client.api_url(), "http://localhost:11434/v1/embeddings");
        assert_eq!(client.model_name(), DEFAULT_MODEL);
    }
}
