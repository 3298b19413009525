// src/decompose/mod.rs
// Corpus decomposition: text chunks -> semantic units, entities,
// relationships, and ragno quads with deterministic URIs

use crate::config::DecomposeConfig;
use crate::error::{MnemoError, Result};
use crate::graph::{normalize_label, GraphEntity, GraphStore, Relationship, SemanticUnit};
use crate::llm::{first_balanced_object, ChatClient, GenerateOptions};
use crate::ontology::{Namespaces, UriKind};
use crate::rdf::{quad, ragno};
use oxrdf::{NamedNode, Quad};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

const EXTRACTION_SYSTEM_PROMPT: &str = "You decompose text into structured semantics. \
Respond with one JSON object only: {\"summary\": string, \
\"entities\": [{\"label\": string, \"type\": \"person\"|\"place\"|\"organisation\"|\"concept\"|\"other\", \
\"confidence\": number}], \
\"relations\": [{\"source\": string, \"type\": string, \"target\": string, \"weight\": number}]}. \
Relation source/target must be entity labels from the entities list.";

/// Closed sub-type set for extracted entities
const SUB_TYPES: &[&str] = &["person", "place", "organisation", "concept", "other"];

/// One input chunk with its provenance
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub content: String,
    pub source: String,
    pub index: usize,
}

/// Raw LLM extraction for one chunk
#[derive(Debug, Clone, Deserialize, Default)]
struct ChunkExtraction {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    entities: Vec<ExtractedEntity>,
    #[serde(default)]
    relations: Vec<ExtractedRelation>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExtractedEntity {
    label: String,
    #[serde(rename = "type", default)]
    sub_type: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ExtractedRelation {
    source: String,
    #[serde(rename = "type")]
    rel_type: String,
    target: String,
    #[serde(default = "default_weight")]
    weight: f32,
}

fn default_confidence() -> f32 {
    1.0
}

fn default_weight() -> f32 {
    0.5
}

/// Decomposition output: typed views plus the emitted quad set
#[derive(Debug, Clone, Default)]
pub struct DecompositionResult {
    pub units: Vec<SemanticUnit>,
    pub entities: Vec<GraphEntity>,
    pub relationships: Vec<Relationship>,
    pub quads: Vec<Quad>,
}

pub struct Decomposer {
    chat: Arc<ChatClient>,
    ns: Arc<Namespaces>,
    graph: Arc<dyn GraphStore>,
    graph_name: NamedNode,
    cfg: DecomposeConfig,
}

impl Decomposer {
    pub fn new(
        chat: Arc<ChatClient>,
        ns: Arc<Namespaces>,
        graph: Arc<dyn GraphStore>,
        graph_name: NamedNode,
        cfg: DecomposeConfig,
    ) -> Self {
        Self {
            chat,
            ns,
            graph,
            graph_name,
            cfg,
        }
    }

    /// Split free text into chunks at paragraph, then sentence boundaries
    pub fn chunk_text(&self, content: &str, source: &str) -> Vec<TextChunk> {
        let target = self.cfg.chunk_length.max(1);
        let mut chunks = Vec::new();
        let mut current = String::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if !current.is_empty() && current.len() + paragraph.len() > target {
                chunks.push(current.clone());
                current.clear();
            }
            if paragraph.len() > target {
                // oversized paragraph: break at sentence boundaries
                for sentence in paragraph.split_inclusive(['.', '!', '?']) {
                    if !current.is_empty() && current.len() + sentence.len() > target {
                        chunks.push(current.clone());
                        current.clear();
                    }
                    current.push_str(sentence);
                }
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(paragraph);
            }
        }
        if !current.trim().is_empty() {
            chunks.push(current);
        }
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, content)| TextChunk {
                content,
                source: source.to_string(),
                index,
            })
            .collect()
    }

    /// Decompose a chunk sequence.
    ///
    /// Unit URIs are seeded by `(source, chunk index)`, entity URIs by the
    /// normalised label (plus sub-type when an existing entity of a
    /// different sub-type holds the label), relationship URIs by
    /// `(source label, type, target label)`, so the same chunks with the
    /// same LLM outputs yield byte-identical URIs and quads.
    ///
    /// `mark_maybe` forces the hypothetical marker onto everything
    /// extracted (HyDE); low-confidence entities get it regardless.
    pub async fn decompose(
        &self,
        chunks: &[TextChunk],
        mark_maybe: bool,
        store: bool,
    ) -> Result<DecompositionResult> {
        let total_len: usize = chunks.iter().map(|c| c.content.len()).sum();
        if total_len > self.cfg.max_content_length {
            return Err(MnemoError::InvalidParameter(format!(
                "decompose content of {total_len} bytes exceeds bound {}",
                self.cfg.max_content_length
            )));
        }

        let mut result = DecompositionResult::default();
        // label -> (uri, sub_type); per-run frequency by uri
        let mut entity_index: HashMap<String, (String, Option<String>)> = HashMap::new();
        let mut frequencies: HashMap<String, u32> = HashMap::new();
        let mut entity_confidence: HashMap<String, f32> = HashMap::new();
        let mut relation_keys: HashSet<(String, String, String)> = HashSet::new();

        for chunk in chunks {
            let extraction = self.extract_chunk(chunk).await;
            let unit_uri = self
                .ns
                .mint(
                    UriKind::Unit,
                    Some(&format!("{}#{}", chunk.source, chunk.index)),
                )
                .as_str()
                .to_string();

            let unit = SemanticUnit {
                uri: unit_uri.clone(),
                text: chunk.content.clone(),
                summary: if extraction.summary.is_empty() {
                    None
                } else {
                    Some(extraction.summary.clone())
                },
                source_document: Some(chunk.source.clone()),
                embedding: None,
                maybe: mark_maybe,
            };
            result.quads.extend(unit.to_quads(&self.graph_name));

            for extracted in &extraction.entities {
                let label = extracted.label.trim();
                if label.is_empty() {
                    continue;
                }
                let normalized = normalize_label(label);
                if normalized.is_empty() {
                    continue;
                }
                let sub_type = canonical_sub_type(&extracted.sub_type);

                let uri = match entity_index.get(&normalized) {
                    Some((uri, _)) => uri.clone(),
                    None => {
                        let uri = self.resolve_entity_uri(&normalized, &sub_type).await?;
                        entity_index.insert(normalized.clone(), (uri.clone(), Some(sub_type.clone())));
                        uri
                    }
                };
                *frequencies.entry(uri.clone()).or_default() += 1;
                let slot = entity_confidence.entry(uri.clone()).or_insert(0.0);
                *slot = slot.max(extracted.confidence);

                let unit_node = NamedNode::new_unchecked(unit_uri.clone());
                result.quads.push(quad(
                    &unit_node,
                    ragno("mentions"),
                    NamedNode::new_unchecked(uri),
                    &self.graph_name,
                ));
            }

            for relation in &extraction.relations {
                let src_norm = normalize_label(&relation.source);
                let tgt_norm = normalize_label(&relation.target);
                let (Some((src_uri, _)), Some((tgt_uri, _))) =
                    (entity_index.get(&src_norm), entity_index.get(&tgt_norm))
                else {
                    continue; // relation names an entity the model didn't list
                };
                if src_uri == tgt_uri {
                    continue; // no self-loops
                }
                let key = (
                    src_norm.clone(),
                    relation.rel_type.clone(),
                    tgt_norm.clone(),
                );
                if !relation_keys.insert(key) {
                    continue; // duplicate triple + type
                }
                let rel_uri = self
                    .ns
                    .mint(
                        UriKind::Relationship,
                        Some(&format!("{src_norm}|{}|{tgt_norm}", relation.rel_type)),
                    )
                    .as_str()
                    .to_string();
                result.relationships.push(Relationship {
                    uri: rel_uri,
                    source: src_uri.clone(),
                    target: tgt_uri.clone(),
                    rel_type: relation.rel_type.clone(),
                    content: None,
                    weight: relation.weight.clamp(0.0, 1.0),
                    maybe: mark_maybe,
                });
            }

            result.units.push(unit);
        }

        for (normalized, (uri, sub_type)) in &entity_index {
            let confidence = entity_confidence.get(uri).copied().unwrap_or(1.0);
            let entity = GraphEntity {
                uri: uri.clone(),
                pref_label: first_label(chunks, normalized).unwrap_or_else(|| normalized.clone()),
                sub_type: sub_type.clone(),
                is_entry_point: false,
                frequency: frequencies.get(uri).copied().unwrap_or(0),
                maybe: mark_maybe || confidence < self.cfg.min_entity_confidence,
            };
            result.quads.extend(entity.to_quads(&self.graph_name));
            result.entities.push(entity);
        }
        for relationship in &result.relationships {
            result.quads.extend(relationship.to_quads(&self.graph_name));
        }

        // stable quad order regardless of map iteration
        result.entities.sort_by(|a, b| a.uri.cmp(&b.uri));
        result.relationships.sort_by(|a, b| a.uri.cmp(&b.uri));
        result.quads.sort_by_key(|q| q.to_string());

        if store {
            self.graph.insert_quads(result.quads.clone()).await?;
        }
        debug!(
            units = result.units.len(),
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            "decomposition complete"
        );
        Ok(result)
    }

    /// Reuse an existing entity when the normalised label is known and the
    /// sub-type agrees; otherwise mint deterministically from the label
    /// (disambiguated by sub-type on disagreement)
    async fn resolve_entity_uri(&self, normalized: &str, sub_type: &str) -> Result<String> {
        if let Some(existing) = self.graph.entity_by_label(normalized).await? {
            match existing.sub_type.as_deref() {
                Some(t) if t == sub_type => return Ok(existing.uri),
                None => return Ok(existing.uri),
                _ => {
                    return Ok(self
                        .ns
                        .mint(UriKind::Entity, Some(&format!("{normalized}|{sub_type}")))
                        .as_str()
                        .to_string())
                }
            }
        }
        Ok(self
            .ns
            .mint(UriKind::Entity, Some(normalized))
            .as_str()
            .to_string())
    }

    /// One structured extraction call. Parse failures degrade to a
    /// summary-less, entity-less unit rather than failing the pipeline.
    async fn extract_chunk(&self, chunk: &TextChunk) -> ChunkExtraction {
        let opts = GenerateOptions {
            max_tokens: Some(1024),
            temperature: Some(0.0),
            ..Default::default()
        };
        let response = match self
            .chat
            .generate_with_system(EXTRACTION_SYSTEM_PROMPT, &chunk.content, &opts)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, chunk = chunk.index, "extraction call failed, emitting bare unit");
                return ChunkExtraction::default();
            }
        };
        match first_balanced_object(&response)
            .ok_or_else(|| MnemoError::Parse("no JSON object in extraction response".to_string()))
            .and_then(|raw| {
                serde_json::from_str::<ChunkExtraction>(raw)
                    .map_err(|e| MnemoError::Parse(e.to_string()))
            }) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(error = %e, chunk = chunk.index, "extraction parse failed, emitting bare unit");
                ChunkExtraction::default()
            }
        }
    }
}

/// Original-cased label as it first appears in the chunk text, falling
/// back to the normalised form
fn first_label(chunks: &[TextChunk], normalized: &str) -> Option<String> {
    for chunk in chunks {
        let hay_norm = normalize_label(&chunk.content);
        if hay_norm.contains(normalized) {
            // recover casing by locating the normalized token sequence
            let words: Vec<&str> = chunk.content.split_whitespace().collect();
            let n_words = normalized.split(' ').count();
            for window in words.windows(n_words) {
                if normalize_label(&window.join(" ")) == normalized {
                    return Some(window.join(" ").trim_matches(|c: char| !c.is_alphanumeric()).to_string());
                }
            }
        }
    }
    None
}

fn canonical_sub_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mapped = match lower.as_str() {
        "organization" => "organisation",
        "location" => "place",
        other => other,
    };
    if SUB_TYPES.contains(&mapped) {
        mapped.to_string()
    } else {
        "other".to_string()
    }
}
