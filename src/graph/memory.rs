// src/graph/memory.rs
// In-process graph store over a deduplicating quad set. Default backend
// when no SPARQL endpoint is configured; also the test double.

use super::model::{Community, CorpusOverview, GraphEntity, Relationship, SemanticUnit};
use super::GraphStore;
use crate::error::Result;
use crate::rdf::{is_functional, ragno, rdf_type, skos};
use crate::zpt::PanFilters;
use async_trait::async_trait;
use oxrdf::{NamedNode, Quad, Subject, Term};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryGraphStore {
    quads: RwLock<HashSet<Quad>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored quad (test assertions)
    pub async fn all_quads(&self) -> Vec<Quad> {
        self.quads.read().await.iter().cloned().collect()
    }
}

fn subject_uri(q: &Quad) -> Option<&str> {
    match &q.subject {
        Subject::NamedNode(n) => Some(n.as_str()),
        _ => None,
    }
}

fn subjects_with_type(quads: &HashSet<Quad>, ty: &NamedNode) -> Vec<String> {
    let type_pred = rdf_type();
    let mut subjects: Vec<String> = quads
        .iter()
        .filter(|q| {
            q.predicate == type_pred
                && matches!(&q.object, Term::NamedNode(n) if n == ty)
        })
        .filter_map(subject_uri)
        .map(str::to_string)
        .collect();
    subjects.sort();
    subjects.dedup();
    subjects
}

fn literal_values<'a>(quads: &'a HashSet<Quad>, subject: &str, predicate: &NamedNode) -> Vec<&'a str> {
    quads
        .iter()
        .filter(|q| subject_uri(q) == Some(subject) && &q.predicate == predicate)
        .filter_map(|q| match &q.object {
            Term::Literal(l) => Some(l.value()),
            _ => None,
        })
        .collect()
}

fn first_literal(quads: &HashSet<Quad>, subject: &str, predicate: &NamedNode) -> Option<String> {
    literal_values(quads, subject, predicate)
        .first()
        .map(|s| s.to_string())
}

fn named_values(quads: &HashSet<Quad>, subject: &str, predicate: &NamedNode) -> Vec<String> {
    quads
        .iter()
        .filter(|q| subject_uri(q) == Some(subject) && &q.predicate == predicate)
        .filter_map(|q| match &q.object {
            Term::NamedNode(n) => Some(n.as_str().to_string()),
            Term::Literal(l) => Some(l.value().to_string()),
            _ => None,
        })
        .collect()
}

fn has_maybe(quads: &HashSet<Quad>, subject: &str) -> bool {
    first_literal(quads, subject, &ragno("maybe"))
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn keyword_match(pan: &PanFilters, haystacks: &[&str]) -> bool {
    if pan.keywords.is_empty() {
        return true;
    }
    pan.keywords.iter().any(|kw| {
        let kw = kw.to_lowercase();
        haystacks.iter().any(|h| h.to_lowercase().contains(&kw))
    })
}

fn corpuscle_match(pan: &PanFilters, uri: &str) -> bool {
    pan.corpuscle.is_empty() || pan.corpuscle.iter().any(|c| c == uri)
}

fn build_entity(quads: &HashSet<Quad>, uri: &str) -> GraphEntity {
    GraphEntity {
        uri: uri.to_string(),
        pref_label: first_literal(quads, uri, &skos("prefLabel")).unwrap_or_default(),
        sub_type: first_literal(quads, uri, &ragno("subType")),
        is_entry_point: first_literal(quads, uri, &ragno("isEntryPoint"))
            .map(|v| v == "true")
            .unwrap_or(false),
        frequency: first_literal(quads, uri, &ragno("frequency"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        maybe: has_maybe(quads, uri),
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn insert_quads(&self, quads: Vec<Quad>) -> Result<()> {
        let mut set = self.quads.write().await;
        // retract stale values of single-valued predicates first, so a
        // re-emitted entity replaces its frequency/labels instead of
        // accumulating a second, conflicting literal
        for q in &quads {
            if is_functional(&q.predicate) {
                set.retain(|existing| {
                    existing.subject != q.subject
                        || existing.predicate != q.predicate
                        || existing.graph_name != q.graph_name
                });
            }
        }
        for q in quads {
            set.insert(q);
        }
        Ok(())
    }

    async fn quad_count(&self) -> Result<usize> {
        Ok(self.quads.read().await.len())
    }

    async fn entities(&self, pan: &PanFilters, limit: usize) -> Result<Vec<GraphEntity>> {
        let quads = self.quads.read().await;
        let mut entities: Vec<GraphEntity> = subjects_with_type(&quads, &ragno("Entity"))
            .into_iter()
            .filter(|uri| corpuscle_match(pan, uri))
            .filter(|uri| pan.entities.is_empty() || pan.entities.iter().any(|e| e == uri))
            .map(|uri| build_entity(&quads, &uri))
            .filter(|e| keyword_match(pan, &[&e.pref_label]))
            .collect();
        entities.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.uri.cmp(&b.uri)));
        entities.truncate(limit);
        Ok(entities)
    }

    async fn entity_by_label(&self, normalized: &str) -> Result<Option<GraphEntity>> {
        let quads = self.quads.read().await;
        let pred = ragno("normalizedLabel");
        let found = quads
            .iter()
            .find(|q| {
                q.predicate == pred
                    && matches!(&q.object, Term::Literal(l) if l.value() == normalized)
            })
            .and_then(subject_uri)
            .map(str::to_string);
        Ok(found.map(|uri| build_entity(&quads, &uri)))
    }

    async fn units(&self, pan: &PanFilters, limit: usize) -> Result<Vec<SemanticUnit>> {
        let quads = self.quads.read().await;
        let mut units: Vec<SemanticUnit> = subjects_with_type(&quads, &ragno("SemanticUnit"))
            .into_iter()
            .filter(|uri| corpuscle_match(pan, uri))
            .map(|uri| {
                let text = first_literal(&quads, &uri, &ragno("content")).unwrap_or_default();
                let summary = first_literal(&quads, &uri, &ragno("summary"));
                let source_document =
                    named_values(&quads, &uri, &ragno("hasSourceDocument")).into_iter().next();
                let embedding = first_literal(&quads, &uri, &ragno("hasEmbedding"))
                    .and_then(|v| serde_json::from_str(&v).ok());
                SemanticUnit {
                    maybe: has_maybe(&quads, &uri),
                    uri,
                    text,
                    summary,
                    source_document,
                    embedding,
                }
            })
            .filter(|u| {
                keyword_match(
                    pan,
                    &[u.text.as_str(), u.summary.as_deref().unwrap_or("")],
                )
            })
            .collect();
        units.truncate(limit);
        Ok(units)
    }

    async fn communities(&self, pan: &PanFilters, limit: usize) -> Result<Vec<Community>> {
        let quads = self.quads.read().await;
        let mut communities: Vec<Community> = subjects_with_type(&quads, &ragno("Community"))
            .into_iter()
            .filter(|uri| corpuscle_match(pan, uri))
            .map(|uri| Community {
                members: named_values(&quads, &uri, &ragno("hasMember")),
                summary: first_literal(&quads, &uri, &ragno("summary")).unwrap_or_default(),
                confidence: first_literal(&quads, &uri, &ragno("confidence"))
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.0),
                uri,
            })
            .filter(|c| keyword_match(pan, &[c.summary.as_str()]))
            .collect();
        communities.truncate(limit);
        Ok(communities)
    }

    async fn relationships_of(&self, entity_uri: &str) -> Result<Vec<Relationship>> {
        let quads = self.quads.read().await;
        let relationships = subjects_with_type(&quads, &ragno("Relationship"))
            .into_iter()
            .map(|uri| Relationship {
                source: named_values(&quads, &uri, &ragno("hasSourceEntity"))
                    .into_iter()
                    .next()
                    .unwrap_or_default(),
                target: named_values(&quads, &uri, &ragno("hasTargetEntity"))
                    .into_iter()
                    .next()
                    .unwrap_or_default(),
                rel_type: first_literal(&quads, &uri, &ragno("relationshipType"))
                    .unwrap_or_default(),
                content: first_literal(&quads, &uri, &ragno("content")),
                weight: first_literal(&quads, &uri, &ragno("weight"))
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.0),
                maybe: has_maybe(&quads, &uri),
                uri,
            })
            .filter(|r| r.source == entity_uri || r.target == entity_uri)
            .collect();
        Ok(relationships)
    }

    async fn corpus_overview(&self) -> Result<CorpusOverview> {
        let quads = self.quads.read().await;
        let mut concept_counts: HashMap<String, usize> = HashMap::new();
        let concept_pred = ragno("hasConcept");
        for q in quads.iter() {
            if q.predicate == concept_pred {
                if let Term::Literal(l) = &q.object {
                    *concept_counts.entry(l.value().to_string()).or_default() += 1;
                }
            }
        }
        let mut top_concepts: Vec<(String, usize)> = concept_counts.into_iter().collect();
        top_concepts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top_concepts.truncate(20);

        Ok(CorpusOverview {
            interaction_count: subjects_with_type(&quads, &ragno("Corpuscle")).len(),
            entity_count: subjects_with_type(&quads, &ragno("Entity")).len(),
            unit_count: subjects_with_type(&quads, &ragno("SemanticUnit")).len(),
            community_count: subjects_with_type(&quads, &ragno("Community")).len(),
            top_concepts,
        })
    }

    async fn remove_subject(&self, uri: &str) -> Result<()> {
        let mut quads = self.quads.write().await;
        quads.retain(|q| subject_uri(q) != Some(uri));
        Ok(())
    }

    async fn clear_maybe(&self, uri: &str) -> Result<bool> {
        let mut quads = self.quads.write().await;
        let maybe_pred = ragno("maybe");
        let before = quads.len();
        quads.retain(|q| !(subject_uri(q) == Some(uri) && q.predicate == maybe_pred));
        Ok(quads.len() < before)
    }
}
