// src/hyde/mod.rs
// Hypothetical-answer engine: speculative units that sharpen retrieval on
// vague queries, always marked uncertain in RDF

use crate::config::DecomposeConfig;
use crate::decompose::{Decomposer, TextChunk};
use crate::error::Result;
use crate::graph::{GraphEntity, GraphStore, Relationship};
use crate::llm::{ChatClient, GenerateOptions};
use crate::memory::Interaction;
use crate::ontology::{Namespaces, UriKind};
use crate::rdf::{lit, lit_f32, quad, ragno, rdf_type, zpt};
use crate::retrieval::{Candidate, CandidateSource, Corpuscle};
use oxrdf::{NamedNode, Quad};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One generated hypothesis with its RDF identity
#[derive(Debug, Clone)]
pub struct HypothesisRecord {
    pub uri: String,
    pub original_query: String,
    pub text: String,
    pub confidence: f32,
}

/// Everything one HyDE run produced
#[derive(Debug, Clone, Default)]
pub struct HypothesisOutcome {
    pub hypotheses: Vec<HypothesisRecord>,
    pub entities: Vec<GraphEntity>,
    pub relationships: Vec<Relationship>,
    pub quads: Vec<Quad>,
    pub processing_time_ms: u64,
}

impl HypothesisOutcome {
    /// Retrieval candidates for the hypotheses, flagged so the retriever
    /// caps their contribution
    pub fn as_candidates(&self) -> Vec<Candidate> {
        self.hypotheses
            .iter()
            .map(|h| {
                let mut interaction =
                    Interaction::new(h.original_query.clone(), h.text.clone());
                interaction.metadata.hypothetical = true;
                Candidate::new(
                    Corpuscle::Interaction(interaction),
                    CandidateSource::Hypothesis,
                )
            })
            .collect()
    }
}

pub struct HypothesisEngine {
    chat: Arc<ChatClient>,
    decomposer: Arc<Decomposer>,
    ns: Arc<Namespaces>,
    graph: Arc<dyn GraphStore>,
    graph_name: NamedNode,
    cfg: DecomposeConfig,
}

impl HypothesisEngine {
    pub fn new(
        chat: Arc<ChatClient>,
        decomposer: Arc<Decomposer>,
        ns: Arc<Namespaces>,
        graph: Arc<dyn GraphStore>,
        graph_name: NamedNode,
        cfg: DecomposeConfig,
    ) -> Self {
        Self {
            chat,
            decomposer,
            ns,
            graph,
            graph_name,
            cfg,
        }
    }

    /// Generate `n` hypothetical answers (config default when zero),
    /// decompose each with everything marked `ragno:maybe`, and link the
    /// units to a query URI via `zpt:answersQuery`.
    pub async fn generate(&self, query: &str, n: usize, store: bool) -> Result<HypothesisOutcome> {
        let start = Instant::now();
        let n = if n == 0 { self.cfg.hyde_hypotheses } else { n };
        let query_uri = self.ns.mint(UriKind::Query, Some(query));
        let mut outcome = HypothesisOutcome::default();

        outcome.quads.push(quad(
            &query_uri,
            ragno("content"),
            lit(query),
            &self.graph_name,
        ));

        let opts = GenerateOptions {
            temperature: Some(self.cfg.hyde_temperature),
            max_tokens: Some(512),
            ..Default::default()
        };

        let generations = futures::future::join_all(
            (0..n).map(|_| self.chat.generate_hypothesis(query, &opts)),
        )
        .await;

        for (i, generated) in generations.into_iter().enumerate() {
            let hypothesis = match generated {
                Ok(h) => h,
                Err(e) if e.is_degradable() => {
                    // degraded: fewer hypotheses, never a failed verb
                    warn!(error = %e, attempt = i, "hypothesis generation failed");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if hypothesis.text.trim().is_empty() {
                continue;
            }

            let chunk = TextChunk {
                content: hypothesis.text.clone(),
                source: format!("{}#hyp-{i}", query_uri.as_str()),
                index: i,
            };
            let decomposition = self.decomposer.decompose(&[chunk], true, false).await?;

            let unit_uri = decomposition
                .units
                .first()
                .map(|u| u.uri.clone())
                .unwrap_or_else(|| {
                    self.ns
                        .mint(UriKind::Hypothesis, Some(&format!("{query}#{i}")))
                        .as_str()
                        .to_string()
                });
            let unit_node = NamedNode::new_unchecked(unit_uri.clone());

            outcome.quads.extend(decomposition.quads);
            outcome
                .quads
                .push(quad(&unit_node, rdf_type(), ragno("Hypothesis"), &self.graph_name));
            outcome.quads.push(quad(
                &unit_node,
                zpt("answersQuery"),
                query_uri.clone(),
                &self.graph_name,
            ));
            outcome.quads.push(quad(
                &unit_node,
                ragno("originalQuery"),
                lit(query),
                &self.graph_name,
            ));
            outcome.quads.push(quad(
                &unit_node,
                ragno("confidence"),
                lit_f32(hypothesis.confidence),
                &self.graph_name,
            ));

            outcome.entities.extend(decomposition.entities);
            outcome.relationships.extend(decomposition.relationships);
            outcome.hypotheses.push(HypothesisRecord {
                uri: unit_uri,
                original_query: query.to_string(),
                text: hypothesis.text,
                confidence: hypothesis.confidence,
            });
        }

        if store && !outcome.quads.is_empty() {
            self.graph.insert_quads(outcome.quads.clone()).await?;
        }
        outcome.processing_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            hypotheses = outcome.hypotheses.len(),
            entities = outcome.entities.len(),
            elapsed_ms = outcome.processing_time_ms,
            "HyDE run complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_candidates_are_flagged_hypothetical() {
        let outcome = HypothesisOutcome {
            hypotheses: vec![HypothesisRecord {
                uri: "http://example.org/hypothesis/h1".to_string(),
                original_query: "Where is Atlantis?".to_string(),
                text: "Atlantis may lie near Santorini.".to_string(),
                confidence: 0.3,
            }],
            ..Default::default()
        };
        let candidates = outcome.as_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, CandidateSource::Hypothesis);
        assert!(candidates[0].corpuscle.maybe());
    }
}
