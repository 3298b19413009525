// src/retrieval/candidates.rs
// Candidate model: a tagged union over the corpuscle kinds, projected to a
// common ranked view only at the end

use crate::graph::{Community, CorpusOverview, GraphEntity, SemanticUnit};
use crate::memory::Interaction;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Where a candidate came from. Normalisation partitions by this tag,
/// never by score magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    ShortTerm,
    LongTerm,
    Graph,
    Hypothesis,
}

impl CandidateSource {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short-term",
            Self::LongTerm => "long-term",
            Self::Graph => "graph",
            Self::Hypothesis => "hypothesis",
        }
    }
}

/// Any RDF-backed content item eligible for selection
#[derive(Debug, Clone)]
pub enum Corpuscle {
    Interaction(Interaction),
    Unit(SemanticUnit),
    Entity {
        entity: GraphEntity,
        /// Synthesised description standing in for a response
        description: String,
    },
    Community(Community),
    Corpus(CorpusOverview),
}

impl Corpuscle {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Interaction(_) => "interaction",
            Self::Unit(_) => "unit",
            Self::Entity { .. } => "entity",
            Self::Community(_) => "community",
            Self::Corpus(_) => "corpus",
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Interaction(i) if !i.embedding.is_empty() => Some(&i.embedding),
            Self::Unit(u) => u.embedding.as_deref(),
            _ => None,
        }
    }

    /// Concept terms for overlap scoring
    pub fn concepts(&self) -> Vec<String> {
        match self {
            Self::Interaction(i) => i.concepts.clone(),
            Self::Unit(u) => u
                .summary
                .as_deref()
                .unwrap_or(&u.text)
                .split_whitespace()
                .take(16)
                .map(str::to_string)
                .collect(),
            Self::Entity { entity, .. } => vec![entity.pref_label.clone()],
            Self::Community(c) => c.summary.split_whitespace().take(16).map(str::to_string).collect(),
            Self::Corpus(o) => o.top_concepts.iter().map(|(c, _)| c.clone()).collect(),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Interaction(i) => Some(i.timestamp),
            _ => None,
        }
    }

    pub fn access_count(&self) -> u32 {
        match self {
            Self::Interaction(i) => i.access_count,
            Self::Entity { entity, .. } => entity.frequency,
            _ => 0,
        }
    }

    /// Prompt-like field of the ranked projection
    pub fn display_prompt(&self) -> String {
        match self {
            Self::Interaction(i) => i.prompt.clone(),
            Self::Unit(u) => u
                .summary
                .clone()
                .unwrap_or_else(|| truncate(&u.text, 120)),
            Self::Entity { entity, .. } => entity.pref_label.clone(),
            Self::Community(c) => truncate(&c.summary, 120),
            Self::Corpus(_) => "Corpus overview".to_string(),
        }
    }

    /// Response-like field of the ranked projection
    pub fn display_response(&self) -> String {
        match self {
            Self::Interaction(i) => i.response.clone(),
            Self::Unit(u) => u.text.clone(),
            Self::Entity { description, .. } => description.clone(),
            Self::Community(c) => c.summary.clone(),
            Self::Corpus(o) => o.describe(),
        }
    }

    pub fn uri(&self) -> Option<String> {
        match self {
            Self::Interaction(_) | Self::Corpus(_) => None,
            Self::Unit(u) => Some(u.uri.clone()),
            Self::Entity { entity, .. } => Some(entity.uri.clone()),
            Self::Community(c) => Some(c.uri.clone()),
        }
    }

    pub fn interaction_id(&self) -> Option<Uuid> {
        match self {
            Self::Interaction(i) => Some(i.id),
            _ => None,
        }
    }

    pub fn maybe(&self) -> bool {
        match self {
            Self::Interaction(i) => i.metadata.hypothetical,
            Self::Unit(u) => u.maybe,
            Self::Entity { entity, .. } => entity.maybe,
            _ => false,
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

/// A corpuscle with its scores through the ranking pipeline
#[derive(Debug, Clone)]
pub struct Candidate {
    pub corpuscle: Corpuscle,
    pub source: CandidateSource,
    /// Raw composite score (source-scale dependent)
    pub raw_score: f32,
    /// Score after per-source max-normalisation, in [0,1]
    pub norm_score: f32,
}

impl Candidate {
    pub fn new(corpuscle: Corpuscle, source: CandidateSource) -> Self {
        Self {
            corpuscle,
            source,
            raw_score: 0.0,
            norm_score: 0.0,
        }
    }
}

/// Final projection handed to verbs and the composer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub kind: String,
    pub source: String,
    pub prompt: String,
    pub response: String,
    pub similarity: f32,
    pub concepts: Vec<String>,
    pub maybe: bool,
}

impl RankedResult {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            id: candidate.corpuscle.interaction_id(),
            uri: candidate.corpuscle.uri(),
            kind: candidate.corpuscle.kind().to_string(),
            source: candidate.source.tag().to_string(),
            prompt: candidate.corpuscle.display_prompt(),
            response: candidate.corpuscle.display_response(),
            similarity: candidate.norm_score,
            concepts: candidate.corpuscle.concepts(),
            maybe: candidate.corpuscle.maybe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_candidate_projection() {
        let entity = GraphEntity {
            uri: "http://example.org/entity/e1".to_string(),
            pref_label: "Eiffel Tower".to_string(),
            sub_type: Some("place".to_string()),
            is_entry_point: false,
            frequency: 3,
            maybe: false,
        };
        let corpuscle = Corpuscle::Entity {
            entity,
            description: "place mentioned 3 times".to_string(),
        };
        assert_eq!(corpuscle.kind(), "entity");
        assert_eq!(corpuscle.display_prompt(), "Eiffel Tower");
        assert_eq!(corpuscle.access_count(), 3);
        assert_eq!(corpuscle.concepts(), vec!["Eiffel Tower"]);
    }

    #[test]
    fn test_interaction_candidate_projection() {
        let mut interaction = Interaction::new("q".to_string(), "a".to_string());
        interaction.concepts = vec!["x".to_string()];
        let corpuscle = Corpuscle::Interaction(interaction.clone());
        assert_eq!(corpuscle.kind(), "interaction");
        assert_eq!(corpuscle.interaction_id(), Some(interaction.id));
        assert!(corpuscle.uri().is_none());
        assert!(corpuscle.timestamp().is_some());
    }

    #[test]
    fn test_truncate_char_boundary() {
        let truncated = truncate("ééééé", 3);
        assert!(truncated.ends_with('…'));
        assert_eq!(truncate("ok", 10), "ok");
    }

    #[test]
    fn test_ranked_result_carries_norm_score() {
        let mut candidate = Candidate::new(
            Corpuscle::Interaction(Interaction::new("p".to_string(), "r".to_string())),
            CandidateSource::ShortTerm,
        );
        candidate.norm_score = 0.75;
        let ranked = RankedResult::from_candidate(&candidate);
        assert_eq!(ranked.similarity, 0.75);
        assert_eq!(ranked.source, "short-term");
        assert_eq!(ranked.kind, "interaction");
    }
}
