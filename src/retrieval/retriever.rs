// src/retrieval/retriever.rs
// Candidate gathering, scoring, normalisation, and ranking

use super::candidates::{Candidate, CandidateSource, Corpuscle, RankedResult};
use super::scoring::{
    cosine_similarity, dedup_key, normalize_by_source, score_candidate, SystemPrefixes,
};
use crate::config::{RetrievalConfig, TiltWeights};
use crate::embeddings::EmbeddingClient;
use crate::error::Result;
use crate::graph::{GraphEntity, GraphStore};
use crate::llm::ChatClient;
use crate::memory::{Interaction, MemoryStore, ScanFilter};
use crate::ontology::{Tilt, Zoom};
use crate::zpt::{PanFilters, ZptState};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Ranked results plus degradation diagnostics
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub results: Vec<RankedResult>,
    /// Embedding provider was down; scoring fell back to concepts only
    pub degraded_embedding: bool,
    /// Concept extraction failed; scoring fell back to embeddings only
    pub degraded_concepts: bool,
    pub query_concepts: Vec<String>,
}

pub struct Retriever {
    embeddings: Arc<EmbeddingClient>,
    chat: Arc<ChatClient>,
    memory: Arc<MemoryStore>,
    graph: Arc<dyn GraphStore>,
    system_prefixes: SystemPrefixes,
    cfg: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embeddings: Arc<EmbeddingClient>,
        chat: Arc<ChatClient>,
        memory: Arc<MemoryStore>,
        graph: Arc<dyn GraphStore>,
        cfg: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            chat,
            memory,
            graph,
            system_prefixes: SystemPrefixes::compile(&cfg.system_prefixes),
            cfg,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.cfg
    }

    /// Retrieve ranked candidates for a query under the given lens.
    ///
    /// `extra` carries caller-provided candidates (HyDE) whose normalised
    /// contribution is capped by the configured hypothesis weight.
    pub async fn retrieve(
        &self,
        session_id: &str,
        query: &str,
        zpt: &ZptState,
        limit: Option<usize>,
        threshold: Option<f32>,
        extra: Vec<Candidate>,
    ) -> Result<RetrievalOutcome> {
        let limit = limit.unwrap_or(self.cfg.limit);
        let threshold = threshold.unwrap_or(zpt.threshold);
        let now = Utc::now();

        // Degradable inputs: either provider being down narrows the score,
        // it doesn't fail the retrieval.
        let (query_embedding, degraded_embedding) = match self.embeddings.embed(query).await {
            Ok(v) => (Some(v), false),
            Err(e) if e.is_degradable() => {
                warn!(error = %e, "embedding unavailable, falling back to concept-only scoring");
                (None, true)
            }
            Err(e) => return Err(e),
        };
        let (query_concepts, degraded_concepts) = match self.chat.extract_concepts(query).await {
            Ok(c) => (c, false),
            Err(e) if e.is_degradable() => {
                warn!(error = %e, "concept extraction unavailable, falling back to embedding-only scoring");
                (Vec::new(), true)
            }
            Err(e) => return Err(e),
        };

        let mut weights = self.weights_for(zpt.tilt);
        if degraded_embedding {
            weights.embedding = 0.0;
        }
        if degraded_concepts {
            weights.concepts = 0.0;
        }

        let mut candidates = self
            .gather(session_id, zpt, query_embedding.as_deref())
            .await?;
        candidates.extend(extra);

        let proximity = if zpt.tilt == Tilt::Graph {
            Some(self.graph_proximity_map(&zpt.pan, &query_concepts).await?)
        } else {
            None
        };

        for candidate in &mut candidates {
            let graph_proximity = proximity.as_ref().map(|map| {
                candidate
                    .corpuscle
                    .uri()
                    .and_then(|uri| map.get(&uri).copied())
                    .unwrap_or(0.1)
            });
            candidate.raw_score = score_candidate(
                &candidate.corpuscle,
                query_embedding.as_deref(),
                &query_concepts,
                &weights,
                now,
                // only graph-backed corpuscles get the substituted term
                if candidate.source == CandidateSource::Graph {
                    graph_proximity
                } else {
                    None
                },
            );
        }

        // Infrastructure prompts never surface as results
        candidates.retain(|c| !self.system_prefixes.matches(&c.corpuscle.display_prompt()));

        normalize_by_source(&mut candidates);

        // Speculation is capped so it cannot dominate factual retrieval
        for candidate in &mut candidates {
            if candidate.source == CandidateSource::Hypothesis {
                candidate.norm_score = candidate.norm_score.min(self.cfg.hypothesis_weight);
            }
        }

        candidates.retain(|c| c.norm_score >= threshold || c.source == CandidateSource::Hypothesis);

        // Dedup by normalised (prompt, response); first (highest) wins
        candidates.sort_by(|a, b| {
            b.norm_score
                .partial_cmp(&a.norm_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut seen: HashSet<(String, String)> = HashSet::new();
        candidates.retain(|c| {
            seen.insert(dedup_key(
                &c.corpuscle.display_prompt(),
                &c.corpuscle.display_response(),
            ))
        });
        candidates.truncate(limit);

        // Access bookkeeping for returned interactions
        let touched: Vec<Uuid> = candidates
            .iter()
            .filter(|c| c.source != CandidateSource::Hypothesis)
            .filter_map(|c| c.corpuscle.interaction_id())
            .collect();
        for id in &touched {
            self.memory.touch(*id).await?;
        }

        debug!(
            results = candidates.len(),
            touched = touched.len(),
            degraded_embedding,
            degraded_concepts,
            "retrieval complete"
        );

        Ok(RetrievalOutcome {
            results: candidates.iter().map(RankedResult::from_candidate).collect(),
            degraded_embedding,
            degraded_concepts,
            query_concepts,
        })
    }

    fn weights_for(&self, tilt: Tilt) -> TiltWeights {
        match tilt {
            Tilt::Embedding | Tilt::Graph => self.cfg.weights_embedding,
            Tilt::Keywords => self.cfg.weights_keywords,
            Tilt::Temporal => self.cfg.weights_temporal,
        }
    }

    /// Candidate set from the three sources: short-term interactions,
    /// pre-filtered long-term interactions, and zoom-shaped graph
    /// corpuscles constrained by pan.
    async fn gather(
        &self,
        session_id: &str,
        zpt: &ZptState,
        query_embedding: Option<&[f32]>,
    ) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut short_ids: HashSet<Uuid> = HashSet::new();

        for interaction in self.memory.short_term_snapshot(session_id).await {
            if !pan_allows_interaction(&zpt.pan, &interaction) {
                continue;
            }
            short_ids.insert(interaction.id);
            candidates.push(Candidate::new(
                Corpuscle::Interaction(interaction),
                CandidateSource::ShortTerm,
            ));
        }

        let filter = ScanFilter {
            domains: zpt.pan.domains.clone(),
            after: zpt.pan.temporal.and_then(|t| t.start),
            before: zpt.pan.temporal.and_then(|t| t.end),
            text: None,
            limit: Some(self.cfg.graph_candidate_limit * 10),
        };
        for interaction in self.memory.scan_long(&filter).await? {
            if short_ids.contains(&interaction.id) {
                continue;
            }
            if !pan_allows_interaction(&zpt.pan, &interaction) {
                continue;
            }
            // coarse cosine pre-filter keeps the long tier from flooding
            if let (Some(q), false) = (query_embedding, interaction.embedding.is_empty()) {
                if cosine_similarity(q, &interaction.embedding) < self.cfg.pre_filter_similarity {
                    continue;
                }
            }
            candidates.push(Candidate::new(
                Corpuscle::Interaction(interaction),
                CandidateSource::LongTerm,
            ));
        }

        let limit = self.cfg.graph_candidate_limit;
        match zpt.zoom {
            Zoom::Text => {}
            Zoom::Entity => {
                for entity in self.graph.entities(&zpt.pan, limit).await? {
                    let description = describe_entity(&entity);
                    candidates.push(Candidate::new(
                        Corpuscle::Entity { entity, description },
                        CandidateSource::Graph,
                    ));
                }
            }
            Zoom::Unit => {
                for unit in self.graph.units(&zpt.pan, limit).await? {
                    candidates.push(Candidate::new(
                        Corpuscle::Unit(unit),
                        CandidateSource::Graph,
                    ));
                }
            }
            Zoom::Community => {
                for community in self.graph.communities(&zpt.pan, limit).await? {
                    candidates.push(Candidate::new(
                        Corpuscle::Community(community),
                        CandidateSource::Graph,
                    ));
                }
            }
            Zoom::Corpus => {
                let overview = self.graph.corpus_overview().await?;
                candidates.push(Candidate::new(
                    Corpuscle::Corpus(overview),
                    CandidateSource::Graph,
                ));
            }
        }

        Ok(candidates)
    }

    /// Proximity over the RDF view for graph tilt.
    ///
    /// Pan entities seed the map at 1.0, their direct relationship
    /// neighbours at 0.6. Without seeds, entities matching a query concept
    /// by label seed the map instead.
    async fn graph_proximity_map(
        &self,
        pan: &PanFilters,
        query_concepts: &[String],
    ) -> Result<HashMap<String, f32>> {
        let mut map: HashMap<String, f32> = HashMap::new();
        let mut seeds: Vec<String> = pan.entities.clone();

        if seeds.is_empty() && !query_concepts.is_empty() {
            for concept in query_concepts {
                let normalized = crate::graph::normalize_label(concept);
                if let Some(entity) = self.graph.entity_by_label(&normalized).await? {
                    seeds.push(entity.uri);
                }
            }
        }

        for seed in &seeds {
            map.insert(seed.clone(), 1.0);
        }
        for seed in seeds {
            for rel in self.graph.relationships_of(&seed).await? {
                let neighbour = if rel.source == seed { rel.target } else { rel.source };
                map.entry(neighbour).or_insert(0.6);
            }
        }
        Ok(map)
    }
}

fn pan_allows_interaction(pan: &PanFilters, interaction: &Interaction) -> bool {
    if !interaction.in_domains(&pan.domains) {
        return false;
    }
    if let Some(temporal) = &pan.temporal {
        if !temporal.contains(interaction.timestamp) {
            return false;
        }
    }
    if !pan.keywords.is_empty() {
        let haystack =
            format!("{} {}", interaction.prompt, interaction.response).to_lowercase();
        if !pan
            .keywords
            .iter()
            .any(|kw| haystack.contains(&kw.to_lowercase()))
        {
            return false;
        }
    }
    true
}

fn describe_entity(entity: &GraphEntity) -> String {
    let sub_type = entity.sub_type.as_deref().unwrap_or("concept");
    let mut description = format!(
        "{} ({}), mentioned {} time{}",
        entity.pref_label,
        sub_type,
        entity.frequency,
        if entity.frequency == 1 { "" } else { "s" }
    );
    if entity.is_entry_point {
        description.push_str(", entry point");
    }
    if entity.maybe {
        description.push_str(", hypothetical");
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zpt::TemporalRange;

    #[test]
    fn test_pan_allows_interaction_domains() {
        let mut interaction = Interaction::new("p".to_string(), "r".to_string());
        interaction.metadata.domains = vec!["a".to_string()];
        let mut pan = PanFilters::default();
        assert!(pan_allows_interaction(&pan, &interaction));
        pan.domains = vec!["b".to_string()];
        assert!(!pan_allows_interaction(&pan, &interaction));
        pan.domains = vec!["a".to_string()];
        assert!(pan_allows_interaction(&pan, &interaction));
    }

    #[test]
    fn test_pan_allows_interaction_keywords_and_time() {
        let interaction = Interaction::new(
            "Where is the Eiffel Tower".to_string(),
            "Paris".to_string(),
        );
        let pan = PanFilters {
            keywords: vec!["eiffel".to_string()],
            ..Default::default()
        };
        assert!(pan_allows_interaction(&pan, &interaction));

        let pan_miss = PanFilters {
            keywords: vec!["pyramid".to_string()],
            ..Default::default()
        };
        assert!(!pan_allows_interaction(&pan_miss, &interaction));

        let pan_past = PanFilters {
            temporal: Some(TemporalRange {
                start: None,
                end: Some(Utc::now() - chrono::Duration::days(1)),
            }),
            ..Default::default()
        };
        assert!(!pan_allows_interaction(&pan_past, &interaction));
    }

    #[test]
    fn test_describe_entity() {
        let entity = GraphEntity {
            uri: "http://example.org/entity/e".to_string(),
            pref_label: "Eiffel Tower".to_string(),
            sub_type: Some("place".to_string()),
            is_entry_point: true,
            frequency: 1,
            maybe: false,
        };
        let description = describe_entity(&entity);
        assert!(description.contains("Eiffel Tower (place)"));
        assert!(description.contains("mentioned 1 time,"));
        assert!(description.contains("entry point"));
    }
}
