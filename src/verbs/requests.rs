// src/verbs/requests.rs
// Verb input schemas. Strict mode: unknown fields are rejected.

use crate::zpt::{PanUpdate, TemporalRange};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum TellType {
    #[default]
    Interaction,
    Document,
    Concept,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TellRequest {
    pub content: String,
    #[serde(rename = "type", default)]
    pub tell_type: TellType,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default = "default_true")]
    pub use_context: bool,
    #[serde(default, rename = "useHyDE")]
    pub use_hyde: bool,
    #[serde(default)]
    pub use_wikipedia: bool,
    #[serde(default)]
    pub use_wikidata: bool,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AugmentOperation {
    Auto,
    EnhanceConcepts,
    FullProcessing,
    BatchExtractConcepts,
    AnalyzeRelationships,
    PromoteHypothesis,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AugmentRequest {
    pub target: String,
    #[serde(default = "default_augment_op")]
    pub operation: AugmentOperation,
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_augment_op() -> AugmentOperation {
    AugmentOperation::Auto
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RememberRequest {
    pub content: String,
    pub domain: String,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_importance() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecallRequest {
    pub query: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub time_range: Option<TemporalRange>,
    #[serde(default)]
    pub relevance_threshold: Option<f32>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForgetRequest {
    /// An interaction id (full removal) or a text pattern (fade)
    pub target: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_fade")]
    pub fade_factor: f32,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_fade() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoomRequest {
    pub level: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PanRequest {
    #[serde(default)]
    pub domains: Option<Vec<String>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub entities: Option<Vec<String>>,
    #[serde(default)]
    pub temporal: Option<TemporalRange>,
    #[serde(default)]
    pub corpuscle: Option<Vec<String>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl PanRequest {
    pub fn to_update(&self) -> PanUpdate {
        PanUpdate {
            domains: self.domains.clone(),
            keywords: self.keywords.clone(),
            entities: self.entities.clone(),
            temporal: self.temporal,
            corpuscle: self.corpuscle.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TiltRequest {
    pub style: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InspectRequest {
    /// One of: session, state, memory
    pub what: String,
    #[serde(default)]
    pub details: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComposeRequest {
    pub query: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_true")]
    pub include_session: bool,
    #[serde(default = "default_true")]
    pub include_memory: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecomposeRequest {
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    /// Pre-chunked content; when present, `content` is ignored for
    /// chunking and each entry becomes one chunk
    #[serde(default)]
    pub chunks: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub store: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Combined navigation update (POST /zpt/navigate)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NavigateRequest {
    #[serde(default)]
    pub zoom: Option<String>,
    #[serde(default)]
    pub pan: Option<PanUpdate>,
    #[serde(default)]
    pub tilt: Option<String>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A validated verb invocation
#[derive(Debug, Clone)]
pub enum VerbCall {
    Tell(TellRequest),
    Ask(AskRequest),
    Augment(AugmentRequest),
    Remember(RememberRequest),
    Recall(RecallRequest),
    Forget(ForgetRequest),
    Zoom(ZoomRequest),
    Pan(PanRequest),
    Tilt(TiltRequest),
    Inspect(InspectRequest),
    Compose(ComposeRequest),
    Decompose(DecomposeRequest),
    Navigate(NavigateRequest),
}

impl VerbCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tell(_) => "tell",
            Self::Ask(_) => "ask",
            Self::Augment(_) => "augment",
            Self::Remember(_) => "remember",
            Self::Recall(_) => "recall",
            Self::Forget(_) => "forget",
            Self::Zoom(_) => "zoom",
            Self::Pan(_) => "pan",
            Self::Tilt(_) => "tilt",
            Self::Inspect(_) => "inspect",
            Self::Compose(_) => "compose",
            Self::Decompose(_) => "decompose",
            Self::Navigate(_) => "navigate",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        let id = match self {
            Self::Tell(r) => &r.session_id,
            Self::Ask(r) => &r.session_id,
            Self::Augment(r) => &r.session_id,
            Self::Remember(r) => &r.session_id,
            Self::Recall(r) => &r.session_id,
            Self::Forget(r) => &r.session_id,
            Self::Zoom(r) => &r.session_id,
            Self::Pan(r) => &r.session_id,
            Self::Tilt(r) => &r.session_id,
            Self::Inspect(r) => &r.session_id,
            Self::Compose(r) => &r.session_id,
            Self::Decompose(r) => &r.session_id,
            Self::Navigate(r) => &r.session_id,
        };
        id.as_deref()
    }

    /// Inputs serialised for PROV hashing
    pub fn inputs_json(&self) -> serde_json::Value {
        match self {
            Self::Tell(r) => serde_json::to_value(r),
            Self::Ask(r) => serde_json::to_value(r),
            Self::Augment(r) => serde_json::to_value(r),
            Self::Remember(r) => serde_json::to_value(r),
            Self::Recall(r) => serde_json::to_value(r),
            Self::Forget(r) => serde_json::to_value(r),
            Self::Zoom(r) => serde_json::to_value(r),
            Self::Pan(r) => serde_json::to_value(r),
            Self::Tilt(r) => serde_json::to_value(r),
            Self::Inspect(r) => serde_json::to_value(r),
            Self::Compose(r) => serde_json::to_value(r),
            Self::Decompose(r) => serde_json::to_value(r),
            Self::Navigate(r) => serde_json::to_value(r),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_rejected() {
        let raw = r#"{"content": "x", "bogus": true}"#;
        assert!(serde_json::from_str::<TellRequest>(raw).is_err());
    }

    #[test]
    fn test_tell_defaults() {
        let req: TellRequest = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(req.tell_type, TellType::Interaction);
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_ask_hyde_field_name() {
        let req: AskRequest =
            serde_json::from_str(r#"{"question": "q", "useHyDE": true}"#).unwrap();
        assert!(req.use_hyde);
        assert!(req.use_context);
    }

    #[test]
    fn test_augment_operation_tokens() {
        let req: AugmentRequest =
            serde_json::from_str(r#"{"target": "x", "operation": "enhance_concepts"}"#).unwrap();
        assert_eq!(req.operation, AugmentOperation::EnhanceConcepts);
        assert!(serde_json::from_str::<AugmentRequest>(
            r#"{"target": "x", "operation": "transmogrify"}"#
        )
        .is_err());
    }

    #[test]
    fn test_pan_request_builds_update() {
        let req: PanRequest =
            serde_json::from_str(r#"{"domains": ["a"], "sessionId": "s"}"#).unwrap();
        assert_eq!(
            req.to_update().domains.as_deref(),
            Some(&["a".to_string()][..])
        );
        assert_eq!(req.session_id.as_deref(), Some("s"));
    }

    #[test]
    fn test_verb_call_names() {
        let call = VerbCall::Zoom(ZoomRequest {
            level: "entity".to_string(),
            session_id: None,
        });
        assert_eq!(call.name(), "zoom");
        assert!(call.inputs_json().get("level").is_some());
    }
}
