// tests/test_utils.rs
// Shared fixtures: deterministic stub providers and a wired AppState

use async_trait::async_trait;
use mnemo::config::Config;
use mnemo::embeddings::EmbeddingProvider;
use mnemo::error::{MnemoError, Result};
use mnemo::llm::{ChatProvider, GenerateOptions};
use mnemo::state::AppState;
use mnemo::verbs::Dispatcher;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const STUB_DIMENSION: usize = 8;

/// Deterministic bag-of-words embeddings: shared tokens give related texts
/// a high cosine similarity
pub struct StubEmbeddings;

fn token_vector(token: &str) -> [f32; STUB_DIMENSION] {
    let digest = Sha256::digest(token.to_lowercase().as_bytes());
    let mut v = [0f32; STUB_DIMENSION];
    for (i, slot) in v.iter_mut().enumerate() {
        *slot = (digest[i] as f32 / 127.5) - 1.0;
    }
    v
}

pub fn stub_embedding(text: &str) -> Vec<f32> {
    let mut acc = [0f32; STUB_DIMENSION];
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        let tv = token_vector(token);
        for (a, t) in acc.iter_mut().zip(tv.iter()) {
            *a += t;
        }
    }
    let norm: f32 = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for a in &mut acc {
            *a /= norm;
        }
    }
    acc.to_vec()
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddings {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| stub_embedding(t)).collect())
    }

    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> String {
        "stub-embed".to_string()
    }
}

/// Embedding provider that is always down (degradation tests)
pub struct FailingEmbeddings;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(MnemoError::Provider("embedding provider offline".to_string()))
    }

    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> String {
        "failing-embed".to_string()
    }
}

/// Deterministic chat stub. The system prompt selects the behaviour:
/// concept extraction returns proper-noun runs, decomposition returns a
/// structured object over the same runs, hypothesis generation returns a
/// hedged canned answer, and plain generation echoes its prompt (so
/// answers provably contain whatever context was assembled).
pub struct StubChat {
    /// When set, concept-extraction calls return this literal instead
    pub canned_concepts: Option<String>,
}

impl StubChat {
    pub fn new() -> Self {
        Self {
            canned_concepts: None,
        }
    }

    pub fn with_canned_concepts(raw: &str) -> Self {
        Self {
            canned_concepts: Some(raw.to_string()),
        }
    }
}

const STOPWORDS: &[&str] = &[
    "The", "A", "An", "Where", "What", "Who", "Is", "In", "At", "On", "Of",
];

/// Runs of capitalized words, leading stopwords stripped
pub fn proper_noun_runs(text: &str) -> Vec<String> {
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let mut runs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for token in tokens {
        if token.chars().next().is_some_and(|c| c.is_uppercase()) {
            current.push(token);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    let mut out = Vec::new();
    for mut run in runs {
        while run.first().is_some_and(|t| STOPWORDS.contains(t)) {
            run.remove(0);
        }
        if run.is_empty() {
            continue;
        }
        let label = run.join(" ");
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

#[async_trait]
impl ChatProvider for StubChat {
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        _opts: &GenerateOptions,
    ) -> Result<String> {
        match system {
            Some(s) if s.contains("extract key concepts") => {
                if let Some(canned) = &self.canned_concepts {
                    return Ok(canned.clone());
                }
                let concepts = proper_noun_runs(prompt);
                Ok(serde_json::to_string(&concepts).unwrap_or_else(|_| "[]".to_string()))
            }
            Some(s) if s.contains("decompose text") => {
                let labels = proper_noun_runs(prompt);
                let entities: Vec<serde_json::Value> = labels
                    .iter()
                    .map(|label| {
                        serde_json::json!({
                            "label": label,
                            "type": "other",
                            "confidence": 0.9,
                        })
                    })
                    .collect();
                let relations: Vec<serde_json::Value> = if labels.len() >= 2 {
                    vec![serde_json::json!({
                        "source": labels[0],
                        "type": "related_to",
                        "target": labels[1],
                        "weight": 0.5,
                    })]
                } else {
                    vec![]
                };
                let summary: String =
                    prompt.split_whitespace().take(10).collect::<Vec<_>>().join(" ");
                Ok(serde_json::json!({
                    "summary": summary,
                    "entities": entities,
                    "relations": relations,
                })
                .to_string())
            }
            Some(s) if s.contains("hypothetical") => Ok(format!(
                "It might be that {}, though this is uncertain.",
                prompt.trim_end_matches('?')
            )),
            _ => Ok(format!("Based on the available context. {prompt}")),
        }
    }

    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> String {
        "stub-chat".to_string()
    }
}

/// Config tuned for the stub providers
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding_dimension = STUB_DIMENSION;
    config
}

/// Fully wired in-memory state with the deterministic stubs
pub fn test_state() -> Arc<AppState> {
    AppState::with_providers(test_config(), Arc::new(StubChat::new()), Arc::new(StubEmbeddings))
        .expect("test state")
}

pub fn test_dispatcher() -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(test_state()))
}

pub fn dispatcher_with(
    chat: Arc<dyn ChatProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
) -> Arc<Dispatcher> {
    let state =
        AppState::with_providers(test_config(), chat, embeddings).expect("test state");
    Arc::new(Dispatcher::new(state))
}
