// src/config/file.rs
// File-based configuration from ./config.json

use crate::error::{MnemoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Top-level config structure (config.json, camelCase on disk)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub servers: ServersConfig,
    pub llm_providers: Vec<LlmProviderConfig>,
    /// Provider type used for embeddings (must match an llmProviders entry
    /// carrying the "embedding" capability, or "stub" for offline use)
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub sparql_endpoints: Vec<SparqlEndpointConfig>,
    pub session: SessionConfig,
    pub retrieval: RetrievalConfig,
    pub memory: MemoryConfig,
    pub cache: CacheConfig,
    pub verbs: VerbConfig,
    pub compose: ComposeConfig,
    pub decompose: DecomposeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServersConfig {
    pub bind: String,
    /// HTTP verb surface port
    pub http: u16,
    /// MCP mount path on the same listener
    pub mcp: String,
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            http: 4100,
            mcp: "/mcp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub chat_model: String,
    pub base_url: String,
    /// Discouraged outside dev; prefer `<TYPE>_API_KEY` env vars
    pub api_key: Option<String>,
    pub capabilities: Vec<String>,
}

impl LlmProviderConfig {
    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.iter().any(|c| c == cap)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SparqlEndpointConfig {
    pub query_url: String,
    pub update_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub graphs: GraphsConfig,
    /// INSERT DATA chunk size
    pub insert_batch_size: usize,
}

impl Default for SparqlEndpointConfig {
    fn default() -> Self {
        Self {
            query_url: "http://localhost:3030/mnemo/query".to_string(),
            update_url: "http://localhost:3030/mnemo/update".to_string(),
            user: None,
            password: None,
            graphs: GraphsConfig::default(),
            insert_batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphsConfig {
    /// ZPT navigation metadata graph
    pub navigation: String,
    /// Corpus content graph
    pub content: String,
    /// Derived entities graph
    pub ragno: String,
}

impl Default for GraphsConfig {
    fn default() -> Self {
        Self {
            navigation: "http://purl.org/stuff/mnemo/navigation".to_string(),
            content: "http://purl.org/stuff/mnemo/content".to_string(),
            ragno: "http://purl.org/stuff/mnemo/ragno".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Idle seconds before a session is evicted
    pub idle_timeout_secs: u64,
    /// Bounded per-session verb queue; overflow returns Busy
    pub queue_depth: usize,
    /// Recent-interaction cache per session
    pub recent_capacity: usize,
    /// Eviction sweep interval
    pub eviction_tick_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
            queue_depth: 32,
            recent_capacity: 20,
            eviction_tick_secs: 60,
        }
    }
}

/// Weight vector `(w_e, w_c, w_r, w_a)` for one tilt projection
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TiltWeights {
    pub embedding: f32,
    pub concepts: f32,
    pub recency: f32,
    pub access: f32,
}

impl Default for TiltWeights {
    fn default() -> Self {
        Self {
            embedding: 0.5,
            concepts: 0.3,
            recency: 0.15,
            access: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Default similarity threshold when the session doesn't override it
    pub threshold: f32,
    pub limit: usize,
    /// Coarse cosine pre-filter for the long-term tier
    pub pre_filter_similarity: f32,
    pub weights_embedding: TiltWeights,
    pub weights_keywords: TiltWeights,
    pub weights_temporal: TiltWeights,
    /// Cap on the normalised score contribution of hypothesis candidates
    pub hypothesis_weight: f32,
    /// Prompts starting with any of these prefixes are infrastructure,
    /// never surfaced as results
    pub system_prefixes: Vec<String>,
    /// Graph candidate fetch bound per zoom level
    pub graph_candidate_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 10,
            pre_filter_similarity: 0.3,
            weights_embedding: TiltWeights::default(),
            weights_keywords: TiltWeights {
                embedding: 0.25,
                concepts: 0.55,
                recency: 0.15,
                access: 0.05,
            },
            weights_temporal: TiltWeights {
                embedding: 0.25,
                concepts: 0.15,
                recency: 0.55,
                access: 0.05,
            },
            hypothesis_weight: 0.3,
            system_prefixes: vec![
                "ZPT State Change:".to_string(),
                "System:".to_string(),
            ],
            graph_candidate_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Short-term tier capacity per session
    pub short_term_capacity: usize,
    /// α in `decay := min(1, decay + α·(1−decay))` applied on access
    pub access_boost_alpha: f32,
    /// Multiplicative aging factor applied by each decay pass
    pub aging_factor: f32,
    /// Items whose decay factor falls below this move to long-term only
    pub promotion_threshold: f32,
    /// Decay pass interval
    pub decay_tick_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 200,
            access_boost_alpha: 0.3,
            aging_factor: 0.95,
            promotion_threshold: 0.4,
            decay_tick_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Embedding cache capacity (entries)
    pub capacity: u64,
    /// Embedding cache TTL in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerbConfig {
    /// Per-verb deadline; a timeout raises the same kind as cancellation
    pub timeout_secs: u64,
}

impl Default for VerbConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComposeConfig {
    /// Most-recent session interactions included in context
    pub k_session: usize,
    /// Retriever results included in context
    pub k_memory: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            k_session: 5,
            k_memory: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecomposeConfig {
    /// Entities below this LLM confidence are marked `ragno:maybe`
    pub min_entity_confidence: f32,
    /// Hard bound on decomposable content length (bytes)
    pub max_content_length: usize,
    /// Chunk length target when the caller doesn't pre-chunk
    pub chunk_length: usize,
    /// Hypotheses generated per HyDE request
    pub hyde_hypotheses: usize,
    /// Temperature bump for hypothesis generation
    pub hyde_temperature: f32,
    /// Minimum member count for a community
    pub min_community_size: usize,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            min_entity_confidence: 0.5,
            max_content_length: 262_144,
            chunk_length: 2000,
            hyde_hypotheses: 3,
            hyde_temperature: 0.9,
            min_community_size: 3,
        }
    }
}

impl Config {
    /// Load config from a JSON file, falling back to defaults when absent
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Reject inconsistent values before the server starts
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension_or_default() == 0 {
            return Err(MnemoError::InvalidParameter(
                "embeddingDimension must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(MnemoError::InvalidParameter(
                "retrieval.threshold must be in [0,1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.hypothesis_weight) {
            return Err(MnemoError::InvalidParameter(
                "retrieval.hypothesisWeight must be in [0,1]".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.memory.aging_factor) {
            return Err(MnemoError::InvalidParameter(
                "memory.agingFactor must be in (0,1)".to_string(),
            ));
        }
        if self.session.queue_depth == 0 {
            return Err(MnemoError::InvalidParameter(
                "session.queueDepth must be positive".to_string(),
            ));
        }
        for ep in &self.sparql_endpoints {
            if ep.insert_batch_size == 0 {
                return Err(MnemoError::InvalidParameter(
                    "sparql insertBatchSize must be positive".to_string(),
                ));
            }
            for raw in [&ep.query_url, &ep.update_url] {
                url::Url::parse(raw).map_err(|e| {
                    MnemoError::InvalidParameter(format!("sparql endpoint URL '{raw}': {e}"))
                })?;
            }
        }
        for provider in &self.llm_providers {
            url::Url::parse(&provider.base_url).map_err(|e| {
                MnemoError::InvalidParameter(format!(
                    "provider '{}' baseUrl '{}': {e}",
                    provider.provider_type, provider.base_url
                ))
            })?;
        }
        Ok(())
    }

    /// Configured embedding dimension, defaulting to 768
    pub fn embedding_dimension_or_default(&self) -> usize {
        if self.embedding_dimension == 0 {
            768
        } else {
            self.embedding_dimension
        }
    }

    /// First provider carrying the given capability
    pub fn provider_with_capability(&self, cap: &str) -> Option<&LlmProviderConfig> {
        self.llm_providers.iter().find(|p| p.has_capability(cap))
    }

    /// Redacted copy safe for `config show` and `inspect`
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for p in &mut copy.llm_providers {
            if p.api_key.is_some() {
                p.api_key = Some("***".to_string());
            }
        }
        for ep in &mut copy.sparql_endpoints {
            if ep.password.is_some() {
                ep.password = Some("***".to_string());
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedding_dimension_or_default(), 768);
        assert_eq!(config.verbs.timeout_secs, 30);
        assert_eq!(config.retrieval.threshold, 0.7);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/config.json"));
        assert_eq!(config.servers.http, 4100);
    }

    #[test]
    fn test_parse_camel_case_fields() {
        let json = r#"{
            "llmProviders": [
                {"type": "ollama", "chatModel": "qwen2:1.5b",
                 "baseUrl": "http://localhost:11434", "capabilities": ["chat", "embedding"]}
            ],
            "embeddingProvider": "ollama",
            "embeddingModel": "nomic-embed-text",
            "embeddingDimension": 768,
            "servers": {"http": 4200, "mcp": "/mcp"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.llm_providers.len(), 1);
        assert_eq!(config.llm_providers[0].provider_type, "ollama");
        assert!(config.llm_providers[0].has_capability("embedding"));
        assert_eq!(config.servers.http, 4200);
        assert_eq!(config.embedding_dimension, 768);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = Config::default();
        config.retrieval.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_endpoint_url_rejected() {
        let mut config = Config::default();
        config.sparql_endpoints.push(SparqlEndpointConfig {
            query_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"servers": {"http": 9999}}"#).unwrap();
        let config = Config::load(&path);
        assert_eq!(config.servers.http, 9999);

        std::fs::write(&path, "{ this is not json").unwrap();
        let fallback = Config::load(&path);
        assert_eq!(fallback.servers.http, 4100);
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = Config::default();
        config.llm_providers.push(LlmProviderConfig {
            provider_type: "openai".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: Some("sk-secret".to_string()),
            capabilities: vec!["chat".to_string()],
        });
        let redacted = config.redacted();
        assert_eq!(redacted.llm_providers[0].api_key.as_deref(), Some("***"));
    }
}
