// src/llm/ollama.rs
// Chat client for a local Ollama instance

use super::provider::{ChatProvider, GenerateOptions};
use crate::error::{MnemoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

/// Ollama chat client (native /api/chat endpoint, no auth)
pub struct OllamaChat {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaChat {
    pub fn new(base_url: String, model: String, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ChatProvider for OllamaChat {
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let mut options = json!({
            "num_predict": opts.effective_max_tokens(),
        });
        if let Some(t) = opts.temperature {
            options["temperature"] = json!(t);
        }
        if !opts.stop_sequences.is_empty() {
            options["stop"] = json!(opts.stop_sequences);
        }

        debug!(model = %self.model, "ollama chat request");
        let resp = self
            .http
            .post(self.api_url())
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
                "options": options,
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

        let parsed: OllamaChatResponse = resp
            .json()
            .await
            .map_err(|e| MnemoError::MalformedResponse(format!("ollama response: {e}")))?;
        Ok(parsed.message.content)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}
