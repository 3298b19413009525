// src/llm/openai_compat.rs
// Chat client for OpenAI-compatible /chat/completions endpoints

use super::provider::{ChatProvider, GenerateOptions};
use crate::error::{MnemoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible chat API
pub struct OpenAiCompatChat {
    base_url: String,
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl OpenAiCompatChat {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            http,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatChat {
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

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": opts.effective_max_tokens(),
        });
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
        if !opts.stop_sequences.is_empty() {
            body["stop"] = json!(opts.stop_sequences);
        }

        debug!(model = %self.model, "chat completion request");
        let mut req = self.http.post(self.api_url()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| MnemoError::Provider(format!("chat request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(MnemoError::Provider(format!(
                "chat API error {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| MnemoError::MalformedResponse(format!("chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| MnemoError::MalformedResponse("chat response had no content".to_string()))
    }

    fn provider_name(&self) -> &str {
        "openai-compat"
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}
