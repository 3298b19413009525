// src/graph/mod.rs
// RDF-backed knowledge graph view: typed model over ragno quads with
// pluggable storage (SPARQL endpoint or in-process quad set)

mod memory;
mod model;
mod sparql_store;

pub use memory::InMemoryGraphStore;
pub use model::{
    normalize_label, Community, CorpusOverview, GraphEntity, Relationship, SemanticUnit,
};
pub use sparql_store::SparqlGraphStore;

use crate::error::Result;
use crate::zpt::PanFilters;
use async_trait::async_trait;
use oxrdf::Quad;

/// Storage contract for the knowledge-graph view.
///
/// Writers emit quads (the decomposer, HyDE, navigation views); readers get
/// typed projections. Entities and relationships are kept in separate
/// URI-keyed collections; references are resolved on demand, never owned.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn insert_quads(&self, quads: Vec<Quad>) -> Result<()>;

    /// Total stored quads (idempotence checks, corpus overview)
    async fn quad_count(&self) -> Result<usize>;

    async fn entities(&self, pan: &PanFilters, limit: usize) -> Result<Vec<GraphEntity>>;

    /// Lookup by normalised label (case-folded, punctuation-stripped)
    async fn entity_by_label(&self, normalized: &str) -> Result<Option<GraphEntity>>;

    async fn units(&self, pan: &PanFilters, limit: usize) -> Result<Vec<SemanticUnit>>;

    async fn communities(&self, pan: &PanFilters, limit: usize) -> Result<Vec<Community>>;

    /// Relationships where the given entity is source or target
    async fn relationships_of(&self, entity_uri: &str) -> Result<Vec<Relationship>>;

    async fn corpus_overview(&self) -> Result<CorpusOverview>;

    /// Delete every triple with the given subject
    async fn remove_subject(&self, uri: &str) -> Result<()>;

    /// Remove the `ragno:maybe` marker (hypothesis promotion).
    /// Returns false when the subject carried no marker.
    async fn clear_maybe(&self, uri: &str) -> Result<bool>;
}
