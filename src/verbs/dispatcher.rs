// src/verbs/dispatcher.rs
// Verb execution: validation, session serialisation, routing, provenance

use super::provenance::record_activity;
use super::requests::*;
use super::responses::VerbResponse;
use crate::error::{MnemoError, Result};
use crate::graph::normalize_label;
use crate::llm::{GenerateMode, GenerateOptions};
use crate::memory::{Interaction, InteractionKind, InteractionMetadata};
use crate::ontology::{UriKind, Zoom};
use crate::retrieval::RankedResult;
use crate::session::SessionHandle;
use crate::state::AppState;
use crate::zpt::{view_quads, PanUpdate};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Routes validated verb calls through the owning session's queue.
/// Parallel across sessions, strictly sequential within one.
pub struct Dispatcher {
    state: Arc<AppState>,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Execute one verb. Never panics through to the caller; every failure
    /// becomes a structured error envelope.
    pub async fn dispatch(&self, call: VerbCall, cancel: CancellationToken) -> VerbResponse {
        let verb = call.name();
        let session_id = call.session_id().unwrap_or("default").to_string();
        let inputs = call.inputs_json();
        let started = Utc::now();

        let handle = match self.state.sessions.get_or_create(&session_id).await {
            Ok(handle) => handle,
            Err(e) => return VerbResponse::err(verb, &e),
        };
        let timeout = Duration::from_secs(self.state.config.verbs.timeout_secs.max(1));

        let result = self
            .state
            .sessions
            .run_serialized(&handle, timeout, cancel, self.execute(&handle, call))
            .await;

        let (response, outputs) = match result {
            Ok((payload, outputs)) => (VerbResponse::ok(verb, payload), outputs),
            Err(e) => {
                debug!(verb, session = session_id, error = %e, "verb failed");
                (VerbResponse::err(verb, &e), Vec::new())
            }
        };
        if let Err(e) = record_activity(
            &self.state.graph,
            &self.state.ns,
            self.state.sessions.navigation_graph(),
            &handle.uri,
            verb,
            &inputs,
            &outputs,
            started,
        )
        .await
        {
            warn!(verb, error = %e, "failed to record provenance activity");
        }
        response
    }

    async fn execute(
        &self,
        handle: &Arc<SessionHandle>,
        call: VerbCall,
    ) -> Result<(Value, Vec<String>)> {
        match call {
            VerbCall::Tell(req) => self.exec_tell(handle, req).await,
            VerbCall::Ask(req) => self.exec_ask(handle, req).await,
            VerbCall::Augment(req) => self.exec_augment(req).await,
            VerbCall::Remember(req) => self.exec_remember(handle, req).await,
            VerbCall::Recall(req) => self.exec_recall(handle, req).await,
            VerbCall::Forget(req) => self.exec_forget(req).await,
            VerbCall::Zoom(req) => {
                self.exec_zpt(handle, Some(req.level), None, None, None).await
            }
            VerbCall::Pan(req) => {
                let update = req.to_update();
                self.exec_zpt(handle, None, Some(update), None, None).await
            }
            VerbCall::Tilt(req) => {
                self.exec_zpt(handle, None, None, Some(req.style), None).await
            }
            VerbCall::Navigate(req) => {
                self.exec_navigate(handle, req).await
            }
            VerbCall::Inspect(req) => self.exec_inspect(handle, req).await,
            VerbCall::Compose(req) => self.exec_compose(handle, req).await,
            VerbCall::Decompose(req) => self.exec_decompose(req).await,
        }
    }

    // === tell ===

    async fn exec_tell(
        &self,
        handle: &Arc<SessionHandle>,
        req: TellRequest,
    ) -> Result<(Value, Vec<String>)> {
        if req.content.trim().is_empty() {
            return Err(MnemoError::InvalidParameter(
                "tell content must be non-empty".to_string(),
            ));
        }

        let (concepts, concept_warning) =
            match self.state.chat.extract_concepts(&req.content).await {
                Ok(c) => (c, false),
                Err(e) if e.is_degradable() => {
                    warn!(error = %e, "concept extraction degraded during tell");
                    (Vec::new(), true)
                }
                Err(e) => return Err(e),
            };
        let embedding = match self.state.embeddings.embed(&req.content).await {
            Ok(v) => v,
            Err(e) if e.is_degradable() => {
                warn!(error = %e, "embedding degraded during tell");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let mut interaction = Interaction::new(req.content.clone(), String::new());
        interaction.concepts = concepts.clone();
        interaction.embedding = embedding;
        interaction.metadata = metadata_from_value(&req.metadata);
        interaction.metadata.kind = match req.tell_type {
            TellType::Interaction => InteractionKind::Interaction,
            TellType::Document => InteractionKind::Document,
            TellType::Concept => InteractionKind::Concept,
        };

        let stored = self.state.memory.append(&handle.id, interaction).await?;
        handle.push_recent(stored.clone()).await;
        let interaction_uri = self
            .state
            .ns
            .mint(UriKind::Interaction, Some(&stored.id.to_string()));

        let mut outputs = vec![interaction_uri.as_str().to_string()];
        let mut payload = json!({
            "stored": true,
            "id": stored.id,
            "concepts": concepts,
        });
        if concept_warning {
            payload["warnings"] = json!(["concept extraction unavailable"]);
        }

        // every tell feeds the graph; documents get full chunking, plain
        // interactions decompose as a single chunk
        let source = interaction_uri.as_str().to_string();
        let chunks = if req.tell_type == TellType::Document {
            self.state.decomposer.chunk_text(&req.content, &source)
        } else {
            vec![crate::decompose::TextChunk {
                content: req.content.clone(),
                source,
                index: 0,
            }]
        };
        let decomposition = self.state.decomposer.decompose(&chunks, false, true).await?;
        outputs.extend(decomposition.units.iter().map(|u| u.uri.clone()));
        outputs.extend(decomposition.entities.iter().map(|e| e.uri.clone()));
        payload["decomposition"] = json!({
            "units": decomposition.units.len(),
            "entities": decomposition.entities.len(),
            "relationships": decomposition.relationships.len(),
        });
        Ok((payload, outputs))
    }

    // === ask ===

    async fn exec_ask(
        &self,
        handle: &Arc<SessionHandle>,
        req: AskRequest,
    ) -> Result<(Value, Vec<String>)> {
        if req.question.trim().is_empty() {
            return Err(MnemoError::InvalidParameter(
                "ask question must be non-empty".to_string(),
            ));
        }
        let mode = match req.mode.as_deref() {
            None => GenerateMode::Standard,
            Some(token) => GenerateMode::from_token(token).ok_or_else(|| {
                MnemoError::InvalidParameter(format!("unknown mode '{token}'"))
            })?,
        };

        handle.state.write().await.record_query(&req.question);
        let zpt = handle.zpt_snapshot().await;

        let mut hyde_payload = None;
        let mut extra = Vec::new();
        if req.use_hyde {
            let outcome = self.state.hyde.generate(&req.question, 0, true).await?;
            extra = outcome.as_candidates();
            hyde_payload = Some(json!({
                "hypotheses": outcome.hypotheses.len(),
                "entities": outcome.entities.len(),
                "relationships": outcome.relationships.len(),
                "processingTimeMs": outcome.processing_time_ms,
            }));
        }

        let outcome = self
            .state
            .retriever
            .retrieve(&handle.id, &req.question, &zpt, None, req.threshold, extra)
            .await?;

        let mut context_items = outcome.results.clone();
        for (enabled, enricher) in [
            (req.use_wikipedia, &self.state.wikipedia),
            (req.use_wikidata, &self.state.wikidata),
        ] {
            if !enabled {
                continue;
            }
            match enricher.enrich(&req.question).await {
                Ok(result) => context_items.push(RankedResult {
                    id: None,
                    uri: None,
                    kind: "enrichment".to_string(),
                    source: enricher.name().to_string(),
                    prompt: format!("{} enrichment", enricher.name()),
                    response: result.content,
                    similarity: 0.0,
                    concepts: vec![],
                    maybe: false,
                }),
                Err(e) => warn!(provider = enricher.name(), error = %e, "enrichment failed"),
            }
        }

        let session_context = if req.use_context {
            handle.recent_snapshot().await
        } else {
            Vec::new()
        };

        let opts = GenerateOptions {
            mode,
            ..Default::default()
        };
        let composed = self.state.composer.compose(
            "compose-context",
            &req.question,
            &session_context,
            &context_items,
            &zpt,
            opts.effective_max_tokens(),
        )?;
        let answer = self
            .state
            .chat
            .generate(&composed.prompt, None, &opts)
            .await?;

        // persist the exchange
        let mut interaction = Interaction::new(req.question.clone(), answer.clone());
        interaction.concepts = outcome.query_concepts.clone();
        if let Ok(embedding) = self.state.embeddings.embed(&req.question).await {
            interaction.embedding = embedding;
        }
        let stored = self.state.memory.append(&handle.id, interaction).await?;
        handle.push_recent(stored.clone()).await;

        // materialise the navigation view
        let selected: Vec<String> = outcome
            .results
            .iter()
            .filter_map(|r| r.uri.clone())
            .collect();
        let zpt_after = handle.zpt_snapshot().await;
        let (view, quads) = view_quads(
            &zpt_after,
            &req.question,
            &selected,
            &handle.uri,
            &self.state.ns,
            self.state.sessions.navigation_graph(),
        );
        self.state.graph.insert_quads(quads).await?;

        let mut payload = json!({
            "answer": answer,
            "sources": composed.sources,
            "results": outcome.results,
            "retrievalCount": outcome.results.len(),
            "navigationView": view.uri.as_str(),
            "degraded": {
                "embedding": outcome.degraded_embedding,
                "concepts": outcome.degraded_concepts,
            },
        });
        if let Some(hyde) = hyde_payload {
            payload["hyde"] = hyde;
        }
        let outputs = vec![
            view.uri.as_str().to_string(),
            self.state
                .ns
                .mint(UriKind::Interaction, Some(&stored.id.to_string()))
                .as_str()
                .to_string(),
        ];
        Ok((payload, outputs))
    }

    // === augment ===

    async fn exec_augment(&self, req: AugmentRequest) -> Result<(Value, Vec<String>)> {
        let operation = match req.operation {
            AugmentOperation::Auto => {
                if req.target.starts_with("http://") || req.target.starts_with("https://") {
                    AugmentOperation::AnalyzeRelationships
                } else if req.target.len() > self.state.config.decompose.chunk_length {
                    AugmentOperation::FullProcessing
                } else {
                    AugmentOperation::EnhanceConcepts
                }
            }
            other => other,
        };

        match operation {
            AugmentOperation::EnhanceConcepts => {
                match self.state.chat.extract_concepts(&req.target).await {
                    Ok(concepts) => Ok((json!({"concepts": concepts}), vec![])),
                    Err(e) if e.is_degradable() => {
                        warn!(error = %e, "concept enhancement degraded");
                        Ok((
                            json!({"concepts": [], "warnings": [e.to_string()]}),
                            vec![],
                        ))
                    }
                    Err(e) => Err(e),
                }
            }
            AugmentOperation::BatchExtractConcepts => {
                let texts: Vec<String> = match req.options.get("texts") {
                    Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                        MnemoError::InvalidParameter(
                            "options.texts must be an array of strings".to_string(),
                        )
                    })?,
                    None => req.target.lines().map(str::to_string).collect(),
                };
                let mut batches = Vec::with_capacity(texts.len());
                for text in &texts {
                    let concepts = match self.state.chat.extract_concepts(text).await {
                        Ok(c) => c,
                        Err(e) if e.is_degradable() => Vec::new(),
                        Err(e) => return Err(e),
                    };
                    batches.push(json!({"text": text, "concepts": concepts}));
                }
                Ok((json!({"batches": batches}), vec![]))
            }
            AugmentOperation::FullProcessing => {
                let source = self
                    .state
                    .ns
                    .mint(UriKind::Unit, Some(&req.target))
                    .as_str()
                    .to_string();
                let chunks = self.state.decomposer.chunk_text(&req.target, &source);
                let result = self.state.decomposer.decompose(&chunks, false, true).await?;
                let outputs: Vec<String> =
                    result.units.iter().map(|u| u.uri.clone()).collect();
                Ok((
                    json!({
                        "units": result.units.len(),
                        "entities": result.entities.len(),
                        "relationships": result.relationships.len(),
                    }),
                    outputs,
                ))
            }
            AugmentOperation::AnalyzeRelationships => {
                let entity_uri = if req.target.starts_with("http") {
                    req.target.clone()
                } else {
                    self.state
                        .graph
                        .entity_by_label(&normalize_label(&req.target))
                        .await?
                        .map(|e| e.uri)
                        .ok_or_else(|| {
                            MnemoError::NotFound(format!("no entity labelled '{}'", req.target))
                        })?
                };
                let relationships = self.state.graph.relationships_of(&entity_uri).await?;
                Ok((
                    json!({"entity": entity_uri, "relationships": relationships}),
                    vec![],
                ))
            }
            AugmentOperation::PromoteHypothesis => {
                let promoted = self.state.graph.clear_maybe(&req.target).await?;
                if !promoted {
                    return Err(MnemoError::NotFound(format!(
                        "'{}' carries no hypothesis marker",
                        req.target
                    )));
                }
                Ok((json!({"promoted": true}), vec![req.target.clone()]))
            }
            AugmentOperation::Auto => unreachable!("auto resolved above"),
        }
    }

    // === remember / recall / forget ===

    async fn exec_remember(
        &self,
        handle: &Arc<SessionHandle>,
        req: RememberRequest,
    ) -> Result<(Value, Vec<String>)> {
        if !(0.0..=1.0).contains(&req.importance) {
            return Err(MnemoError::InvalidParameter(format!(
                "importance {} outside [0,1]",
                req.importance
            )));
        }
        if req.content.trim().is_empty() {
            return Err(MnemoError::InvalidParameter(
                "remember content must be non-empty".to_string(),
            ));
        }
        let mut metadata = metadata_from_value(&req.metadata);
        metadata.domains = vec![req.domain.clone()];
        metadata.domain_id = req.domain_id.clone();
        metadata.importance = Some(req.importance);

        let tell = TellRequest {
            content: req.content,
            tell_type: TellType::Interaction,
            metadata: serde_json::to_value(&metadata).unwrap_or_default(),
            session_id: Some(handle.id.clone()),
        };
        let (mut payload, outputs) = self.exec_tell(handle, tell).await?;
        payload["domain"] = json!(req.domain);
        payload["importance"] = json!(req.importance);
        Ok((payload, outputs))
    }

    async fn exec_recall(
        &self,
        handle: &Arc<SessionHandle>,
        req: RecallRequest,
    ) -> Result<(Value, Vec<String>)> {
        if let Some(range) = &req.time_range {
            range.validate()?;
        }
        // explicit filters override session state without mutating it
        let mut lens = handle.zpt_snapshot().await;
        lens.zoom = Zoom::Text;
        lens.pan.domains = req.domains.clone();
        lens.pan.temporal = req.time_range;
        if let Some(threshold) = req.relevance_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(MnemoError::InvalidParameter(format!(
                    "relevanceThreshold {threshold} outside [0,1]"
                )));
            }
            lens.threshold = threshold;
        }

        let outcome = self
            .state
            .retriever
            .retrieve(
                &handle.id,
                &req.query,
                &lens,
                req.max_results,
                req.relevance_threshold,
                vec![],
            )
            .await?;
        Ok((
            json!({
                "results": outcome.results,
                "count": outcome.results.len(),
            }),
            vec![],
        ))
    }

    async fn exec_forget(&self, req: ForgetRequest) -> Result<(Value, Vec<String>)> {
        if !(0.0..=1.0).contains(&req.fade_factor) {
            return Err(MnemoError::InvalidParameter(format!(
                "fadeFactor {} outside [0,1]",
                req.fade_factor
            )));
        }
        if let Ok(id) = Uuid::parse_str(&req.target) {
            // removes from both tiers; the long tier owns the RDF quads
            let removed = self.state.memory.forget(id).await?;
            return Ok((json!({"removed": removed, "id": id}), vec![]));
        }
        let affected = self
            .state
            .memory
            .fade(&req.target, req.domain.as_deref(), req.fade_factor)
            .await?;
        Ok((json!({"faded": affected}), vec![]))
    }

    // === zoom / pan / tilt / navigate ===

    async fn exec_zpt(
        &self,
        handle: &Arc<SessionHandle>,
        zoom: Option<String>,
        pan: Option<PanUpdate>,
        tilt: Option<String>,
        threshold: Option<f32>,
    ) -> Result<(Value, Vec<String>)> {
        let mut changes = Vec::new();
        {
            let mut state = handle.state.write().await;
            if let Some(level) = &zoom {
                state.set_zoom(level)?;
                changes.push(format!("zoom={level}"));
            }
            if let Some(update) = pan {
                state.set_pan(update)?;
                changes.push("pan".to_string());
            }
            if let Some(style) = &tilt {
                state.set_tilt(style)?;
                changes.push(format!("tilt={style}"));
            }
            if let Some(threshold) = threshold {
                state.set_threshold(threshold)?;
                changes.push(format!("threshold={threshold}"));
            }
        }

        // state-change marker: infrastructure, filtered out of retrieval
        let mut marker = Interaction::new(
            format!("ZPT State Change: {}", changes.join(" ")),
            String::new(),
        );
        marker.metadata.system_instruction = true;
        let _ = self.state.memory.append(&handle.id, marker).await;

        let state = handle.zpt_snapshot().await;
        let mut payload = json!({"state": state});

        // a lens change re-runs the last query so the caller sees its effect
        if let Some(query) = state.last_query.clone() {
            let outcome = self
                .state
                .retriever
                .retrieve(&handle.id, &query, &state, None, None, vec![])
                .await?;
            payload["results"] = json!(outcome.results);
            payload["reappliedQuery"] = json!(query);
        }
        Ok((payload, vec![]))
    }

    async fn exec_navigate(
        &self,
        handle: &Arc<SessionHandle>,
        req: NavigateRequest,
    ) -> Result<(Value, Vec<String>)> {
        let (payload, _) = self
            .exec_zpt(handle, req.zoom, req.pan, req.tilt, req.threshold)
            .await?;
        let mut payload = payload;

        if let Some(query) = req.query {
            handle.state.write().await.record_query(&query);
            let state = handle.zpt_snapshot().await;
            let outcome = self
                .state
                .retriever
                .retrieve(&handle.id, &query, &state, None, None, vec![])
                .await?;
            let selected: Vec<String> =
                outcome.results.iter().filter_map(|r| r.uri.clone()).collect();
            let (view, quads) = view_quads(
                &state,
                &query,
                &selected,
                &handle.uri,
                &self.state.ns,
                self.state.sessions.navigation_graph(),
            );
            self.state.graph.insert_quads(quads).await?;
            payload["results"] = json!(outcome.results);
            payload["navigationView"] = json!(view.uri.as_str());
            return Ok((payload, vec![view.uri.as_str().to_string()]));
        }
        Ok((payload, vec![]))
    }

    // === inspect / compose / decompose ===

    async fn exec_inspect(
        &self,
        handle: &Arc<SessionHandle>,
        req: InspectRequest,
    ) -> Result<(Value, Vec<String>)> {
        let payload = match req.what.as_str() {
            "session" => {
                let mut value = json!({
                    "sessionId": handle.id,
                    "uri": handle.uri.as_str(),
                    "createdAt": handle.created_at.to_rfc3339(),
                    "zpt": handle.zpt_snapshot().await,
                    "recentCount": handle.recent_snapshot().await.len(),
                });
                if req.details {
                    value["recent"] = json!(handle.recent_snapshot().await);
                }
                value
            }
            "state" => {
                let (short, long) = self.state.memory.counts().await?;
                json!({
                    "activeSessions": self.state.sessions.active_count().await,
                    "memory": {"shortTerm": short, "longTerm": long},
                    "embeddingCacheEntries": self.state.embeddings.cache_len(),
                    "lastLlmCall": self.state.chat.last_call(),
                    "uptimeSecs": (Utc::now() - self.state.started_at).num_seconds(),
                    "config": if req.details {
                        serde_json::to_value(self.state.config.redacted())?
                    } else {
                        Value::Null
                    },
                })
            }
            "memory" => {
                let (short, long) = self.state.memory.counts().await?;
                let overview = self.state.graph.corpus_overview().await?;
                json!({
                    "shortTerm": short,
                    "longTerm": long,
                    "corpus": overview,
                })
            }
            other => {
                return Err(MnemoError::InvalidParameter(format!(
                    "unknown inspect target '{other}'"
                )))
            }
        };
        Ok((payload, vec![]))
    }

    async fn exec_compose(
        &self,
        handle: &Arc<SessionHandle>,
        req: ComposeRequest,
    ) -> Result<(Value, Vec<String>)> {
        let zpt = handle.zpt_snapshot().await;
        let retrieved = if req.include_memory {
            self.state
                .retriever
                .retrieve(
                    &handle.id,
                    &req.query,
                    &zpt,
                    req.max_results,
                    req.threshold,
                    vec![],
                )
                .await?
                .results
        } else {
            Vec::new()
        };
        let session_context = if req.include_session {
            handle.recent_snapshot().await
        } else {
            Vec::new()
        };
        let composed = self.state.composer.compose(
            "compose-context",
            &req.query,
            &session_context,
            &retrieved,
            &zpt,
            req.max_tokens.unwrap_or(1024),
        )?;
        Ok((
            json!({
                "prompt": composed.prompt,
                "sources": composed.sources,
                "sessionItems": composed.session_items,
            }),
            vec![],
        ))
    }

    async fn exec_decompose(&self, req: DecomposeRequest) -> Result<(Value, Vec<String>)> {
        if req.content.trim().is_empty() && req.chunks.as_deref().is_none_or(|c| c.is_empty()) {
            return Err(MnemoError::InvalidParameter(
                "decompose content must be non-empty".to_string(),
            ));
        }
        let source = req
            .source
            .clone()
            .unwrap_or_else(|| {
                self.state
                    .ns
                    .mint(UriKind::Unit, Some(&req.content))
                    .as_str()
                    .to_string()
            });
        let chunks = match &req.chunks {
            Some(pre_chunked) => pre_chunked
                .iter()
                .enumerate()
                .map(|(index, content)| crate::decompose::TextChunk {
                    content: content.clone(),
                    source: source.clone(),
                    index,
                })
                .collect(),
            None => self.state.decomposer.chunk_text(&req.content, &source),
        };
        let result = self.state.decomposer.decompose(&chunks, false, req.store).await?;
        let outputs: Vec<String> = result
            .units
            .iter()
            .map(|u| u.uri.clone())
            .chain(result.entities.iter().map(|e| e.uri.clone()))
            .collect();
        Ok((
            json!({
                "units": result.units,
                "entities": result.entities,
                "relationships": result.relationships,
                "quadCount": result.quads.len(),
                "stored": req.store,
            }),
            outputs,
        ))
    }
}

/// Parse caller metadata leniently: recognised fields land in the typed
/// struct, everything else is ignored
fn metadata_from_value(value: &Value) -> InteractionMetadata {
    if value.is_null() {
        return InteractionMetadata::default();
    }
    serde_json::from_value(value.clone()).unwrap_or_default()
}
