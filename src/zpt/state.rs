// src/zpt/state.rs
// Per-session navigation state

use crate::error::{MnemoError, Result};
use crate::ontology::{Tilt, Zoom};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temporal pan window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemporalRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TemporalRange {
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(MnemoError::InvalidParameter(
                    "temporal range start is after end".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// Pan filters scope the candidate pool along several dimensions.
/// Empty vectors mean "unfiltered".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanFilters {
    pub domains: Vec<String>,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub temporal: Option<TemporalRange>,
    pub corpuscle: Vec<String>,
}

impl PanFilters {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
            && self.keywords.is_empty()
            && self.entities.is_empty()
            && self.temporal.is_none()
            && self.corpuscle.is_empty()
    }
}

/// Partial pan update. `None` leaves a dimension untouched; `Some(empty)`
/// explicitly resets it. Non-empty values accumulate (pan is monotone
/// within a view).
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PanUpdate {
    pub domains: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub entities: Option<Vec<String>>,
    pub temporal: Option<TemporalRange>,
    pub corpuscle: Option<Vec<String>>,
}

/// In-memory per-session ZPT state.
///
/// Every transition is total: unknown tokens are rejected with
/// `InvalidParameter` and the state is left unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZptState {
    pub zoom: Zoom,
    pub pan: PanFilters,
    pub tilt: Tilt,
    pub threshold: f32,
    pub last_query: Option<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ZptState {
    /// Default lens: `(zoom=entity, tilt=keywords, pan=∅, threshold=0.7)`
    pub fn new(session_id: &str) -> Self {
        Self {
            zoom: Zoom::Entity,
            pan: PanFilters::default(),
            tilt: Tilt::Keywords,
            threshold: 0.7,
            last_query: None,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn set_zoom(&mut self, token: &str) -> Result<()> {
        let zoom = Zoom::from_token(token)
            .ok_or_else(|| MnemoError::InvalidParameter(format!("unknown zoom level '{token}'")))?;
        self.zoom = zoom;
        self.touch();
        Ok(())
    }

    pub fn set_tilt(&mut self, token: &str) -> Result<()> {
        let tilt = Tilt::from_token(token).ok_or_else(|| {
            MnemoError::InvalidParameter(format!("unknown tilt projection '{token}'"))
        })?;
        self.tilt = tilt;
        self.touch();
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MnemoError::InvalidParameter(format!(
                "threshold {threshold} outside [0,1]"
            )));
        }
        self.threshold = threshold;
        self.touch();
        Ok(())
    }

    /// Apply a partial pan update. Successive updates accumulate unless a
    /// dimension is explicitly reset with an empty value.
    pub fn set_pan(&mut self, update: PanUpdate) -> Result<()> {
        if let Some(temporal) = &update.temporal {
            temporal.validate()?;
        }
        if let Some(domains) = update.domains {
            merge_dimension(&mut self.pan.domains, domains);
        }
        if let Some(keywords) = update.keywords {
            merge_dimension(&mut self.pan.keywords, keywords);
        }
        if let Some(entities) = update.entities {
            merge_dimension(&mut self.pan.entities, entities);
        }
        if let Some(temporal) = update.temporal {
            self.pan.temporal = Some(temporal);
        }
        if let Some(corpuscle) = update.corpuscle {
            merge_dimension(&mut self.pan.corpuscle, corpuscle);
        }
        self.touch();
        Ok(())
    }

    /// Cheap immutable copy for retrieval
    pub fn snapshot(&self) -> ZptState {
        self.clone()
    }

    pub fn record_query(&mut self, query: &str) {
        self.last_query = Some(query.to_string());
        self.touch();
    }

    fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

/// Empty incoming vector resets the dimension; values otherwise accumulate
fn merge_dimension(current: &mut Vec<String>, incoming: Vec<String>) {
    if incoming.is_empty() {
        current.clear();
        return;
    }
    for value in incoming {
        if !current.contains(&value) {
            current.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = ZptState::new("s1");
        assert_eq!(state.zoom, Zoom::Entity);
        assert_eq!(state.tilt, Tilt::Keywords);
        assert!(state.pan.is_empty());
        assert_eq!(state.threshold, 0.7);
    }

    #[test]
    fn test_unknown_token_leaves_state_unchanged() {
        let mut state = ZptState::new("s1");
        let before = state.clone();
        assert!(state.set_zoom("galaxy").is_err());
        assert!(state.set_tilt("sideways").is_err());
        assert!(state.set_threshold(2.0).is_err());
        assert_eq!(state.zoom, before.zoom);
        assert_eq!(state.tilt, before.tilt);
        assert_eq!(state.threshold, before.threshold);
    }

    #[test]
    fn test_pan_accumulates() {
        let mut state = ZptState::new("s1");
        state
            .set_pan(PanUpdate {
                domains: Some(vec!["science".to_string()]),
                ..Default::default()
            })
            .unwrap();
        state
            .set_pan(PanUpdate {
                domains: Some(vec!["history".to_string(), "science".to_string()]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(state.pan.domains, vec!["science", "history"]);
    }

    #[test]
    fn test_pan_explicit_reset() {
        let mut state = ZptState::new("s1");
        state
            .set_pan(PanUpdate {
                keywords: Some(vec!["tower".to_string()]),
                ..Default::default()
            })
            .unwrap();
        state
            .set_pan(PanUpdate {
                keywords: Some(vec![]),
                ..Default::default()
            })
            .unwrap();
        assert!(state.pan.keywords.is_empty());
    }

    #[test]
    fn test_invalid_temporal_range_rejected() {
        let mut state = ZptState::new("s1");
        let bad = PanUpdate {
            temporal: Some(TemporalRange {
                start: Some(Utc::now()),
                end: Some(Utc::now() - chrono::Duration::hours(1)),
            }),
            ..Default::default()
        };
        assert!(state.set_pan(bad).is_err());
        assert!(state.pan.temporal.is_none());
    }

    #[test]
    fn test_temporal_contains() {
        let now = Utc::now();
        let range = TemporalRange {
            start: Some(now - chrono::Duration::hours(1)),
            end: Some(now + chrono::Duration::hours(1)),
        };
        assert!(range.contains(now));
        assert!(!range.contains(now - chrono::Duration::hours(2)));
        let open = TemporalRange {
            start: None,
            end: None,
        };
        assert!(open.contains(now));
    }
}
