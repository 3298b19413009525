// src/llm/provider.rs
// Chat provider abstraction layer

use crate::config::Config;
use crate::error::{MnemoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generation mode; comprehensive raises the token budget for long answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    #[default]
    Standard,
    Comprehensive,
}

impl GenerateMode {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "standard" => Some(Self::Standard),
            "comprehensive" => Some(Self::Comprehensive),
            _ => None,
        }
    }
}

/// Options for a single generation call
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub mode: GenerateMode,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            stop_sequences: Vec::new(),
            mode: GenerateMode::Standard,
        }
    }
}

impl GenerateOptions {
    /// Effective token budget given the mode
    pub fn effective_max_tokens(&self) -> u32 {
        match (self.max_tokens, self.mode) {
            (Some(n), _) => n,
            (None, GenerateMode::Standard) => 1024,
            (None, GenerateMode::Comprehensive) => 4096,
        }
    }
}

/// Diagnostics from the most recent provider call
#[derive(Debug, Clone, Serialize)]
pub struct LastCallInfo {
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    pub status: String,
    pub at: DateTime<Utc>,
}

/// Trait for chat providers - all backends must implement this
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a single-turn completion request and return the text
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> String;
}

/// Pick the chat provider named first in `llmProviders` with the "chat"
/// capability
pub fn chat_provider_from_config(
    config: &Config,
    http: reqwest::Client,
) -> Result<std::sync::Arc<dyn ChatProvider>> {
    let entry = config.provider_with_capability("chat").ok_or_else(|| {
        MnemoError::InvalidParameter("no chat-capable provider configured".to_string())
    })?;
    let provider: std::sync::Arc<dyn ChatProvider> = match entry.provider_type.as_str() {
        "ollama" => std::sync::Arc::new(super::OllamaChat::new(
            entry.base_url.clone(),
            entry.chat_model.clone(),
            http,
        )),
        _ => std::sync::Arc::new(super::OpenAiCompatChat::new(
            entry.base_url.clone(),
            crate::config::api_key_for(&entry.provider_type, entry.api_key.as_deref()),
            entry.chat_model.clone(),
            http,
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_token() {
        assert_eq!(GenerateMode::from_token("standard"), Some(GenerateMode::Standard));
        assert_eq!(
            GenerateMode::from_token("comprehensive"),
            Some(GenerateMode::Comprehensive)
        );
        assert_eq!(GenerateMode::from_token("verbose"), None);
    }

    #[test]
    fn test_effective_max_tokens() {
        let standard = GenerateOptions::default();
        assert_eq!(standard.effective_max_tokens(), 1024);

        let comprehensive = GenerateOptions {
            mode: GenerateMode::Comprehensive,
            ..Default::default()
        };
        assert_eq!(comprehensive.effective_max_tokens(), 4096);

        let explicit = GenerateOptions {
            max_tokens: Some(99),
            mode: GenerateMode::Comprehensive,
            ..Default::default()
        };
        assert_eq!(explicit.effective_max_tokens(), 99);
    }
}
