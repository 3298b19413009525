// src/memory/types.rs
// Interaction records and scan filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What produced the interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    #[default]
    Interaction,
    Document,
    Concept,
}

/// Caller-supplied metadata on an interaction
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionMetadata {
    /// Domain scoping for remember/recall
    pub domains: Vec<String>,
    pub domain_id: Option<String>,
    pub importance: Option<f32>,
    /// Items flagged as system instructions survive fade/forget sweeps
    pub system_instruction: bool,
    pub kind: InteractionKind,
    /// True for retrieval-only speculation (HyDE)
    pub hypothetical: bool,
}

/// One prompt/response pair with its semantic annotations.
///
/// `access_count` and `decay_factor` are the only mutable fields after
/// append, and only the retriever (via touch) and the decay pass change
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub prompt: String,
    pub response: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub concepts: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub access_count: u32,
    pub decay_factor: f32,
    #[serde(default)]
    pub metadata: InteractionMetadata,
}

impl Interaction {
    pub fn new(prompt: String, response: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt,
            response,
            embedding: Vec::new(),
            concepts: Vec::new(),
            timestamp: Utc::now(),
            access_count: 0,
            decay_factor: 1.0,
            metadata: InteractionMetadata::default(),
        }
    }

    /// Drop empty concept strings (invariant: concepts contain no empties)
    pub fn sanitize_concepts(&mut self) {
        self.concepts.retain(|c| !c.trim().is_empty());
        for c in &mut self.concepts {
            *c = c.trim().to_string();
        }
    }

    /// Whether this interaction belongs to any of the given domains.
    /// An empty filter matches everything.
    pub fn in_domains(&self, domains: &[String]) -> bool {
        if domains.is_empty() {
            return true;
        }
        domains.iter().any(|d| self.metadata.domains.contains(d))
    }
}

/// Filter for scanning the long-term tier
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub domains: Vec<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    /// Substring match on prompt or response
    pub text: Option<String>,
    pub limit: Option<usize>,
}

impl ScanFilter {
    pub fn matches(&self, interaction: &Interaction) -> bool {
        if !interaction.in_domains(&self.domains) {
            return false;
        }
        if let Some(after) = self.after {
            if interaction.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if interaction.timestamp > before {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !interaction.prompt.to_lowercase().contains(&needle)
                && !interaction.response.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_interaction_defaults() {
        let i = Interaction::new("p".to_string(), "r".to_string());
        assert_eq!(i.access_count, 0);
        assert_eq!(i.decay_factor, 1.0);
        assert!(i.concepts.is_empty());
    }

    #[test]
    fn test_sanitize_concepts() {
        let mut i = Interaction::new("p".to_string(), "r".to_string());
        i.concepts = vec!["  a ".to_string(), "".to_string(), " ".to_string(), "b".to_string()];
        i.sanitize_concepts();
        assert_eq!(i.concepts, vec!["a", "b"]);
    }

    #[test]
    fn test_domain_matching() {
        let mut i = Interaction::new("p".to_string(), "r".to_string());
        i.metadata.domains = vec!["a".to_string(), "b".to_string()];
        assert!(i.in_domains(&[]));
        assert!(i.in_domains(&["a".to_string()]));
        assert!(i.in_domains(&["b".to_string(), "c".to_string()]));
        assert!(!i.in_domains(&["c".to_string()]));
    }

    #[test]
    fn test_scan_filter_text_and_time() {
        let mut i = Interaction::new("Where is Paris".to_string(), "In France".to_string());
        i.timestamp = Utc::now();
        let filter = ScanFilter {
            text: Some("paris".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&i));

        let future_only = ScanFilter {
            after: Some(Utc::now() + chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(!future_only.matches(&i));
    }
}
