// src/embeddings/openai.rs
// OpenAI-compatible embeddings endpoint (/embeddings)

use super::EmbeddingProvider;
use crate::error::{MnemoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Default model when config doesn't name one
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Max characters per input (truncate longer text)
const MAX_TEXT_CHARS: usize = 32_000;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for any OpenAI-compatible embeddings API
pub struct OpenAiCompatEmbeddings {
    base_url: String,
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl OpenAiCompatEmbeddings {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: Option<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            http,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatEmbeddings {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let inputs: Vec<&str> = texts
            .iter()
            .map(|t| truncate_chars(t, MAX_TEXT_CHARS))
            .collect();
        debug!(count = inputs.len(), model = %self.model, "embedding request");

        let mut req = self.http.post(self.api_url()).json(&json!({
            "model": self.model,
            "input": inputs,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| MnemoError::Provider(format!("embedding request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(MnemoError::Provider(format!(
                "embedding API error {status}: {text}"
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| MnemoError::MalformedResponse(format!("embedding response: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(MnemoError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn provider_name(&self) -> &str {
        "openai-compat"
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

/// Truncate at a char boundary so multi-byte text never splits
fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = OpenAiCompatEmbeddings::new(
            "https://api.openai.com/v1/".to_string(),
            Some("key".to_string()),
            None,
            reqwest::Client::new(),
        );
        assert_eq!(client.api_url(), "https://api.openai.com/v1/embeddings");
        assert_eq!(client.model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "héllo wörld";
        let truncated = truncate_chars(text, 2);
        assert!(truncated.len() <= 2);
        assert!(text.starts_with(truncated));
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
