// src/enrich/mod.rs
// External enrichment collaborators. The built-ins return canned content;
// real providers plug in behind the same trait without touching the
// composer.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Enrichment payload: content plus where it came from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub content: String,
    pub sources: Vec<String>,
}

#[async_trait]
pub trait Enrichment: Send + Sync {
    async fn enrich(&self, query: &str) -> Result<EnrichmentResult>;

    fn name(&self) -> &'static str;
}

/// Placeholder Wikipedia enrichment
pub struct WikipediaEnrichment;

#[async_trait]
impl Enrichment for WikipediaEnrichment {
    async fn enrich(&self, query: &str) -> Result<EnrichmentResult> {
        Ok(EnrichmentResult {
            content: format!("No Wikipedia provider configured; query was: {query}"),
            sources: vec!["wikipedia:stub".to_string()],
        })
    }

    fn name(&self) -> &'static str {
        "wikipedia"
    }
}

/// Placeholder Wikidata enrichment
pub struct WikidataEnrichment;

#[async_trait]
impl Enrichment for WikidataEnrichment {
    async fn enrich(&self, query: &str) -> Result<EnrichmentResult> {
        Ok(EnrichmentResult {
            content: format!("No Wikidata provider configured; query was: {query}"),
            sources: vec!["wikidata:stub".to_string()],
        })
    }

    fn name(&self) -> &'static str {
        "wikidata"
    }
}

/// Placeholder web-search enrichment
pub struct WebSearchEnrichment;

#[async_trait]
impl Enrichment for WebSearchEnrichment {
    async fn enrich(&self, query: &str) -> Result<EnrichmentResult> {
        Ok(EnrichmentResult {
            content: format!("No web search provider configured; query was: {query}"),
            sources: vec!["web:stub".to_string()],
        })
    }

    fn name(&self) -> &'static str {
        "web-search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_enrichments_return_sources() {
        let providers: Vec<Box<dyn Enrichment>> = vec![
            Box::new(WikipediaEnrichment),
            Box::new(WikidataEnrichment),
            Box::new(WebSearchEnrichment),
        ];
        for provider in providers {
            let result = provider.enrich("anything").await.unwrap();
            assert!(!result.sources.is_empty());
            assert!(result.content.contains("anything"));
        }
    }
}
