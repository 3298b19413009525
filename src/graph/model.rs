// src/graph/model.rs
// Typed projections of ragno graph content, and their quad emission

use crate::rdf::{lit, lit_bool, lit_f32, lit_u32, quad, ragno, rdf_type, skos};
use oxrdf::{NamedNode, Quad};
use serde::Serialize;

/// A summarised, URI-addressable passage extracted from a source text
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticUnit {
    pub uri: String,
    pub text: String,
    pub summary: Option<String>,
    pub source_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// True for synthesised (hypothetical) units
    pub maybe: bool,
}

impl SemanticUnit {
    pub fn to_quads(&self, graph: &NamedNode) -> Vec<Quad> {
        let subject = NamedNode::new_unchecked(self.uri.clone());
        let mut quads = vec![
            quad(&subject, rdf_type(), ragno("SemanticUnit"), graph),
            quad(&subject, ragno("content"), lit(&self.text), graph),
        ];
        if let Some(summary) = &self.summary {
            quads.push(quad(&subject, ragno("summary"), lit(summary), graph));
        }
        if let Some(source) = &self.source_document {
            if let Ok(node) = NamedNode::new(source.clone()) {
                quads.push(quad(&subject, ragno("hasSourceDocument"), node, graph));
            } else {
                quads.push(quad(&subject, ragno("hasSourceDocument"), lit(source), graph));
            }
        }
        if let Some(embedding) = &self.embedding {
            let encoded = serde_json::to_string(embedding).unwrap_or_default();
            quads.push(quad(&subject, ragno("hasEmbedding"), lit(&encoded), graph));
        }
        if self.maybe {
            quads.push(quad(&subject, ragno("maybe"), lit_bool(true), graph));
        }
        quads
    }
}

/// A named entity in the knowledge graph
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEntity {
    pub uri: String,
    pub pref_label: String,
    pub sub_type: Option<String>,
    pub is_entry_point: bool,
    pub frequency: u32,
    /// True for hypothetical entities
    pub maybe: bool,
}

impl GraphEntity {
    pub fn to_quads(&self, graph: &NamedNode) -> Vec<Quad> {
        let subject = NamedNode::new_unchecked(self.uri.clone());
        let mut quads = vec![
            quad(&subject, rdf_type(), ragno("Entity"), graph),
            quad(&subject, skos("prefLabel"), lit(&self.pref_label), graph),
            quad(
                &subject,
                ragno("normalizedLabel"),
                lit(&normalize_label(&self.pref_label)),
                graph,
            ),
            quad(&subject, ragno("frequency"), lit_u32(self.frequency), graph),
            quad(
                &subject,
                ragno("isEntryPoint"),
                lit_bool(self.is_entry_point),
                graph,
            ),
        ];
        if let Some(sub_type) = &self.sub_type {
            quads.push(quad(&subject, ragno("subType"), lit(sub_type), graph));
        }
        if self.maybe {
            quads.push(quad(&subject, ragno("maybe"), lit_bool(true), graph));
        }
        quads
    }
}

/// A directed, typed edge between two entities
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub uri: String,
    pub source: String,
    pub target: String,
    pub rel_type: String,
    pub content: Option<String>,
    pub weight: f32,
    pub maybe: bool,
}

impl Relationship {
    pub fn to_quads(&self, graph: &NamedNode) -> Vec<Quad> {
        let subject = NamedNode::new_unchecked(self.uri.clone());
        let mut quads = vec![
            quad(&subject, rdf_type(), ragno("Relationship"), graph),
            quad(
                &subject,
                ragno("hasSourceEntity"),
                NamedNode::new_unchecked(self.source.clone()),
                graph,
            ),
            quad(
                &subject,
                ragno("hasTargetEntity"),
                NamedNode::new_unchecked(self.target.clone()),
                graph,
            ),
            quad(&subject, ragno("relationshipType"), lit(&self.rel_type), graph),
            quad(&subject, ragno("weight"), lit_f32(self.weight), graph),
        ];
        if let Some(content) = &self.content {
            quads.push(quad(&subject, ragno("content"), lit(content), graph));
        }
        if self.maybe {
            quads.push(quad(&subject, ragno("maybe"), lit_bool(true), graph));
        }
        quads
    }
}

/// A set of related entities with a summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub uri: String,
    pub members: Vec<String>,
    pub summary: String,
    pub confidence: f32,
}

impl Community {
    pub fn to_quads(&self, graph: &NamedNode) -> Vec<Quad> {
        let subject = NamedNode::new_unchecked(self.uri.clone());
        let mut quads = vec![
            quad(&subject, rdf_type(), ragno("Community"), graph),
            quad(&subject, ragno("summary"), lit(&self.summary), graph),
            quad(&subject, ragno("confidence"), lit_f32(self.confidence), graph),
        ];
        for member in &self.members {
            quads.push(quad(
                &subject,
                ragno("hasMember"),
                NamedNode::new_unchecked(member.clone()),
                graph,
            ));
        }
        quads
    }
}

/// Corpus-level summary used as context at corpus zoom
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusOverview {
    pub interaction_count: usize,
    pub entity_count: usize,
    pub unit_count: usize,
    pub community_count: usize,
    /// (concept, occurrences), most frequent first
    pub top_concepts: Vec<(String, usize)>,
}

impl CorpusOverview {
    /// One-paragraph rendering for use as retrieval context
    pub fn describe(&self) -> String {
        let concepts = self
            .top_concepts
            .iter()
            .take(10)
            .map(|(c, n)| format!("{c} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Corpus: {} interactions, {} entities, {} semantic units, {} communities. Top concepts: {}",
            self.interaction_count,
            self.entity_count,
            self.unit_count,
            self.community_count,
            if concepts.is_empty() { "none".to_string() } else { concepts }
        )
    }
}

/// Case-fold and strip punctuation so label matching survives formatting
/// differences ("The  Eiffel-Tower!" == "the eiffel tower")
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_space = true;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> NamedNode {
        NamedNode::new_unchecked("http://example.org/ragno")
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("The  Eiffel-Tower!"), "the eiffel tower");
        assert_eq!(normalize_label("  Paris "), "paris");
        assert_eq!(normalize_label("CO₂ levels"), "co₂ levels");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn test_entity_quads_include_normalized_label() {
        let entity = GraphEntity {
            uri: "http://example.org/entity/e1".to_string(),
            pref_label: "Eiffel Tower".to_string(),
            sub_type: Some("place".to_string()),
            is_entry_point: true,
            frequency: 2,
            maybe: false,
        };
        let quads = entity.to_quads(&graph());
        let norm = quads
            .iter()
            .find(|q| q.predicate.as_str().ends_with("normalizedLabel"))
            .unwrap();
        assert!(norm.object.to_string().contains("eiffel tower"));
        assert!(!quads.iter().any(|q| q.predicate.as_str().ends_with("maybe")));
    }

    #[test]
    fn test_maybe_marker_emitted_when_set() {
        let unit = SemanticUnit {
            uri: "http://example.org/unit/u1".to_string(),
            text: "Atlantis may exist".to_string(),
            summary: None,
            source_document: None,
            embedding: None,
            maybe: true,
        };
        let quads = unit.to_quads(&graph());
        assert!(quads.iter().any(|q| q.predicate.as_str().ends_with("maybe")));
    }

    #[test]
    fn test_relationship_quads_direction() {
        let rel = Relationship {
            uri: "http://example.org/relationship/r1".to_string(),
            source: "http://example.org/entity/a".to_string(),
            target: "http://example.org/entity/b".to_string(),
            rel_type: "locatedIn".to_string(),
            content: None,
            weight: 0.8,
            maybe: false,
        };
        let quads = rel.to_quads(&graph());
        let source = quads
            .iter()
            .find(|q| q.predicate.as_str().ends_with("hasSourceEntity"))
            .unwrap();
        assert!(source.object.to_string().contains("/entity/a"));
    }

    #[test]
    fn test_corpus_overview_describe() {
        let overview = CorpusOverview {
            interaction_count: 3,
            entity_count: 2,
            unit_count: 1,
            community_count: 0,
            top_concepts: vec![("paris".to_string(), 2)],
        };
        let text = overview.describe();
        assert!(text.contains("3 interactions"));
        assert!(text.contains("paris (2)"));
    }
}
