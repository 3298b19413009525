// src/retrieval/scoring.rs
// Composite scoring and cross-source normalisation

use super::candidates::{Candidate, CandidateSource, Corpuscle};
use crate::config::TiltWeights;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Cosine similarity between two vectors; 0 on length mismatch or zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Case-insensitive Jaccard overlap of two concept sets
pub fn jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: std::collections::HashSet<String> =
        a.iter().map(|s| s.to_lowercase()).collect();
    let set_b: std::collections::HashSet<String> =
        b.iter().map(|s| s.to_lowercase()).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Exponential recency decay over days; items with no timestamp score 0
pub fn recency_decay(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    match timestamp {
        Some(ts) => {
            let age_hours = ((now - ts).num_seconds() as f32 / 3600.0).max(0.0);
            (-age_hours / 24.0).exp()
        }
        None => 0.0,
    }
}

/// Composite score:
/// `w_e·cos + w_c·jaccard + w_r·recency + w_a·log(1+access)`.
/// A graph-proximity value, when supplied (graph tilt), substitutes the
/// embedding term.
pub fn score_candidate(
    corpuscle: &Corpuscle,
    query_embedding: Option<&[f32]>,
    query_concepts: &[String],
    weights: &TiltWeights,
    now: DateTime<Utc>,
    graph_proximity: Option<f32>,
) -> f32 {
    let embedding_term = match (graph_proximity, query_embedding, corpuscle.embedding()) {
        (Some(proximity), _, _) => proximity,
        (None, Some(q), Some(c)) => cosine_similarity(q, c).max(0.0),
        _ => 0.0,
    };
    let concept_term = jaccard(query_concepts, &corpuscle.concepts());
    let recency_term = recency_decay(corpuscle.timestamp(), now);
    let access_term = (1.0 + corpuscle.access_count() as f32).ln();

    weights.embedding * embedding_term
        + weights.concepts * concept_term
        + weights.recency * recency_term
        + weights.access * access_term
}

/// Per-source max-normalisation.
///
/// Raw scores from heterogeneous sources have incompatible scales; each
/// partition (by source tag) is divided by its own maximum, mapping into
/// [0,1] with the per-source maximum at exactly 1. A partition whose
/// scores are all zero carries no ranking signal, so its members tie at 1.
pub fn normalize_by_source(candidates: &mut [Candidate]) {
    let mut maxima: HashMap<CandidateSource, f32> = HashMap::new();
    for c in candidates.iter() {
        let max = maxima.entry(c.source).or_insert(0.0);
        if c.raw_score > *max {
            *max = c.raw_score;
        }
    }
    for c in candidates.iter_mut() {
        let max = maxima.get(&c.source).copied().unwrap_or(0.0);
        c.norm_score = if max > 0.0 { c.raw_score / max } else { 1.0 };
    }
}

/// Compiled system-prefix patterns. Infrastructure prompts (state-change
/// markers, system notes) are never user content.
///
/// Each configured entry is a regex matched at the start of the prompt;
/// entries that fail to compile are demoted to literal prefixes.
pub struct SystemPrefixes {
    set: regex::RegexSet,
}

impl SystemPrefixes {
    pub fn compile(patterns: &[String]) -> Self {
        let anchored: Vec<String> = patterns.iter().map(|p| format!("^(?:{p})")).collect();
        let set = regex::RegexSet::new(&anchored).unwrap_or_else(|_| {
            let literal: Vec<String> = patterns
                .iter()
                .map(|p| format!("^{}", regex::escape(p)))
                .collect();
            regex::RegexSet::new(&literal).unwrap_or_else(|_| regex::RegexSet::empty())
        });
        Self { set }
    }

    pub fn matches(&self, prompt: &str) -> bool {
        self.set.is_match(prompt)
    }
}

/// Dedup key: whitespace-collapsed, case-folded (prompt, response)
pub fn dedup_key(prompt: &str, response: &str) -> (String, String) {
    (collapse(prompt), collapse(response))
}

fn collapse(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Interaction;

    fn interaction_candidate(score_seed: f32, source: CandidateSource) -> Candidate {
        let mut c = Candidate::new(
            Corpuscle::Interaction(Interaction::new("p".to_string(), "r".to_string())),
            source,
        );
        c.raw_score = score_seed;
        c
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_jaccard_case_insensitive() {
        let a = vec!["Paris".to_string(), "Tower".to_string()];
        let b = vec!["paris".to_string(), "river".to_string()];
        // intersection {paris}, union {paris, tower, river}
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&[], &b), 0.0);
    }

    #[test]
    fn test_recency_decay() {
        let now = Utc::now();
        let fresh = recency_decay(Some(now), now);
        assert!((fresh - 1.0).abs() < 0.01);
        let old = recency_decay(Some(now - chrono::Duration::days(7)), now);
        assert!(old < 0.01);
        assert_eq!(recency_decay(None, now), 0.0);
    }

    #[test]
    fn test_normalize_per_source_max_is_one() {
        let mut candidates = vec![
            interaction_candidate(0.2, CandidateSource::ShortTerm),
            interaction_candidate(0.8, CandidateSource::ShortTerm),
            interaction_candidate(40.0, CandidateSource::Graph),
            interaction_candidate(10.0, CandidateSource::Graph),
        ];
        normalize_by_source(&mut candidates);
        let max_short = candidates
            .iter()
            .filter(|c| c.source == CandidateSource::ShortTerm)
            .map(|c| c.norm_score)
            .fold(0.0f32, f32::max);
        let max_graph = candidates
            .iter()
            .filter(|c| c.source == CandidateSource::Graph)
            .map(|c| c.norm_score)
            .fold(0.0f32, f32::max);
        assert!((max_short - 1.0).abs() < 1e-6);
        assert!((max_graph - 1.0).abs() < 1e-6);
        // the large graph scale no longer dominates
        assert!((candidates[1].norm_score - 1.0).abs() < 1e-6);
        for c in &candidates {
            assert!((0.0..=1.0).contains(&c.norm_score));
        }
    }

    #[test]
    fn test_normalize_all_zero_partition_ties_at_one() {
        let mut candidates = vec![
            interaction_candidate(0.0, CandidateSource::LongTerm),
            interaction_candidate(0.0, CandidateSource::LongTerm),
        ];
        normalize_by_source(&mut candidates);
        assert!(candidates.iter().all(|c| c.norm_score == 1.0));
    }

    #[test]
    fn test_system_prefixes_match_at_start_only() {
        let prefixes = SystemPrefixes::compile(&[
            "ZPT State Change:".to_string(),
            "System:".to_string(),
        ]);
        assert!(prefixes.matches("ZPT State Change: zoom=entity"));
        assert!(prefixes.matches("System: boot"));
        assert!(!prefixes.matches("Where is Paris?"));
        assert!(!prefixes.matches("mentions System: inline"));
    }

    #[test]
    fn test_system_prefixes_invalid_pattern_degrades_to_literal() {
        let prefixes = SystemPrefixes::compile(&["[unclosed".to_string()]);
        assert!(prefixes.matches("[unclosed bracket prompt"));
        assert!(!prefixes.matches("other"));
    }

    #[test]
    fn test_dedup_key_collapses_whitespace_and_case() {
        assert_eq!(
            dedup_key("Where  is\nParis?", "In France"),
            dedup_key("where is paris?", "in   france")
        );
    }

    #[test]
    fn test_graph_proximity_substitutes_embedding_term() {
        let corpuscle = Corpuscle::Interaction(Interaction::new("p".to_string(), "r".to_string()));
        let weights = TiltWeights {
            embedding: 1.0,
            concepts: 0.0,
            recency: 0.0,
            access: 0.0,
        };
        let now = Utc::now();
        let with_proximity =
            score_candidate(&corpuscle, None, &[], &weights, now, Some(0.6));
        assert!((with_proximity - 0.6).abs() < 1e-6);
        let without = score_candidate(&corpuscle, None, &[], &weights, now, None);
        assert_eq!(without, 0.0);
    }
}
