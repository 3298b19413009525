// src/graph/sparql_store.rs
// SPARQL-endpoint-backed graph store. Reads are SELECT projections whose
// graph patterns encode the pan filters; writes are chunked INSERT DATA.

use super::model::{Community, CorpusOverview, GraphEntity, Relationship, SemanticUnit};
use super::GraphStore;
use crate::error::Result;
use crate::ontology::Namespaces;
use crate::sparql::{Binding, SparqlClient};
use crate::zpt::PanFilters;
use async_trait::async_trait;
use oxrdf::{NamedNode, Quad};
use std::sync::Arc;

pub struct SparqlGraphStore {
    client: Arc<SparqlClient>,
    ns: Arc<Namespaces>,
    graph: NamedNode,
}

impl SparqlGraphStore {
    pub fn new(client: Arc<SparqlClient>, ns: Arc<Namespaces>) -> Self {
        let graph = NamedNode::new_unchecked(client.config().graphs.ragno.clone());
        Self { client, ns, graph }
    }

    fn prefixes(&self) -> String {
        self.ns.sparql_prefixes()
    }

    /// FILTER clauses for keyword pan constraints over the given variables
    fn keyword_filter(pan: &PanFilters, vars: &[&str]) -> String {
        if pan.keywords.is_empty() {
            return String::new();
        }
        let clauses: Vec<String> = pan
            .keywords
            .iter()
            .flat_map(|kw| {
                let kw = escape_literal(kw);
                vars.iter()
                    .map(move |v| format!("CONTAINS(LCASE(STR(?{v})), LCASE(\"{kw}\"))"))
            })
            .collect();
        format!("FILTER ({}) ", clauses.join(" || "))
    }

    fn values_filter(var: &str, uris: &[String]) -> String {
        if uris.is_empty() {
            return String::new();
        }
        let list = uris
            .iter()
            .map(|u| format!("<{u}>"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("VALUES ?{var} {{ {list} }} ")
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn binding_entity(b: &Binding) -> Option<GraphEntity> {
    Some(GraphEntity {
        uri: b.get_uri("s")?.to_string(),
        pref_label: b.get_str("label").unwrap_or_default().to_string(),
        sub_type: b.get_str("subType").map(str::to_string),
        is_entry_point: b.get_bool("entry").unwrap_or(false),
        frequency: b.get_u32("frequency").unwrap_or(0),
        maybe: b.get_bool("maybe").unwrap_or(false),
    })
}

#[async_trait]
impl GraphStore for SparqlGraphStore {
    async fn insert_quads(&self, quads: Vec<Quad>) -> Result<()> {
        // writers to the ragno graph serialise through the adapter's
        // per-graph transaction lock; stale values of single-valued
        // predicates are retracted in the same transaction, ahead of the
        // inserts, so re-emitted entities replace their frequency/labels
        // instead of accumulating conflicting triples
        let mut tx = self.client.begin_tx(self.graph.as_str()).await?;
        for update in crate::sparql::build_retract_updates(&quads) {
            tx.queue_update(update);
        }
        tx.insert_quads(quads);
        tx.commit().await
    }

    async fn quad_count(&self) -> Result<usize> {
        let query = format!(
            "SELECT (COUNT(*) AS ?n) WHERE {{ GRAPH <{}> {{ ?s ?p ?o }} }}",
            self.graph.as_str()
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings.first().and_then(|b| b.get_u32("n")).unwrap_or(0) as usize)
    }

    async fn entities(&self, pan: &PanFilters, limit: usize) -> Result<Vec<GraphEntity>> {
        let query = format!(
            "{prefixes}\nSELECT ?s ?label ?subType ?entry ?frequency ?maybe \
             WHERE {{ GRAPH <{graph}> {{ \
               {entity_values}\
               ?s a ragno:Entity ; skos:prefLabel ?label . \
               OPTIONAL {{ ?s ragno:subType ?subType }} \
               OPTIONAL {{ ?s ragno:isEntryPoint ?entry }} \
               OPTIONAL {{ ?s ragno:frequency ?frequency }} \
               OPTIONAL {{ ?s ragno:maybe ?maybe }} \
               {keyword_filter}\
             }} }} ORDER BY DESC(?frequency) LIMIT {limit}",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
            entity_values = Self::values_filter("s", &pan.entities),
            keyword_filter = Self::keyword_filter(pan, &["label"]),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings.iter().filter_map(binding_entity).collect())
    }

    async fn entity_by_label(&self, normalized: &str) -> Result<Option<GraphEntity>> {
        let query = format!(
            "{prefixes}\nSELECT ?s ?label ?subType ?entry ?frequency ?maybe \
             WHERE {{ GRAPH <{graph}> {{ \
               ?s a ragno:Entity ; skos:prefLabel ?label ; \
                  ragno:normalizedLabel \"{normalized}\" . \
               OPTIONAL {{ ?s ragno:subType ?subType }} \
               OPTIONAL {{ ?s ragno:isEntryPoint ?entry }} \
               OPTIONAL {{ ?s ragno:frequency ?frequency }} \
               OPTIONAL {{ ?s ragno:maybe ?maybe }} \
             }} }} LIMIT 1",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
            normalized = escape_literal(normalized),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings.first().and_then(binding_entity))
    }

    async fn units(&self, pan: &PanFilters, limit: usize) -> Result<Vec<SemanticUnit>> {
        let query = format!(
            "{prefixes}\nSELECT ?s ?text ?summary ?source ?embedding ?maybe \
             WHERE {{ GRAPH <{graph}> {{ \
               {unit_values}\
               ?s a ragno:SemanticUnit ; ragno:content ?text . \
               OPTIONAL {{ ?s ragno:summary ?summary }} \
               OPTIONAL {{ ?s ragno:hasSourceDocument ?source }} \
               OPTIONAL {{ ?s ragno:hasEmbedding ?embedding }} \
               OPTIONAL {{ ?s ragno:maybe ?maybe }} \
               {keyword_filter}\
             }} }} LIMIT {limit}",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
            unit_values = Self::values_filter("s", &pan.corpuscle),
            keyword_filter = Self::keyword_filter(pan, &["text", "summary"]),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings
            .iter()
            .filter_map(|b| {
                Some(SemanticUnit {
                    uri: b.get_uri("s")?.to_string(),
                    text: b.get_str("text").unwrap_or_default().to_string(),
                    summary: b.get_str("summary").map(str::to_string),
                    source_document: b.get_str("source").map(str::to_string),
                    embedding: b
                        .get_str("embedding")
                        .and_then(|v| serde_json::from_str(v).ok()),
                    maybe: b.get_bool("maybe").unwrap_or(false),
                })
            })
            .collect())
    }

    async fn communities(&self, pan: &PanFilters, limit: usize) -> Result<Vec<Community>> {
        let query = format!(
            "{prefixes}\nSELECT ?s ?summary ?confidence \
             (GROUP_CONCAT(DISTINCT STR(?member); separator=\"\\u001F\") AS ?members) \
             WHERE {{ GRAPH <{graph}> {{ \
               ?s a ragno:Community ; ragno:summary ?summary ; ragno:confidence ?confidence . \
               OPTIONAL {{ ?s ragno:hasMember ?member }} \
               {keyword_filter}\
             }} }} GROUP BY ?s ?summary ?confidence LIMIT {limit}",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
            keyword_filter = Self::keyword_filter(pan, &["summary"]),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings
            .iter()
            .filter_map(|b| {
                Some(Community {
                    uri: b.get_uri("s")?.to_string(),
                    members: b
                        .get_str("members")
                        .unwrap_or("")
                        .split('\u{1f}')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                    summary: b.get_str("summary").unwrap_or_default().to_string(),
                    confidence: b.get_f32("confidence").unwrap_or(0.0),
                })
            })
            .collect())
    }

    async fn relationships_of(&self, entity_uri: &str) -> Result<Vec<Relationship>> {
        let query = format!(
            "{prefixes}\nSELECT ?s ?source ?target ?type ?content ?weight ?maybe \
             WHERE {{ GRAPH <{graph}> {{ \
               ?s a ragno:Relationship ; ragno:hasSourceEntity ?source ; \
                  ragno:hasTargetEntity ?target ; ragno:relationshipType ?type . \
               OPTIONAL {{ ?s ragno:content ?content }} \
               OPTIONAL {{ ?s ragno:weight ?weight }} \
               OPTIONAL {{ ?s ragno:maybe ?maybe }} \
               FILTER (?source = <{uri}> || ?target = <{uri}>) \
             }} }}",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
            uri = entity_uri,
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings
            .iter()
            .filter_map(|b| {
                Some(Relationship {
                    uri: b.get_uri("s")?.to_string(),
                    source: b.get_uri("source")?.to_string(),
                    target: b.get_uri("target")?.to_string(),
                    rel_type: b.get_str("type").unwrap_or_default().to_string(),
                    content: b.get_str("content").map(str::to_string),
                    weight: b.get_f32("weight").unwrap_or(0.0),
                    maybe: b.get_bool("maybe").unwrap_or(false),
                })
            })
            .collect())
    }

    async fn corpus_overview(&self) -> Result<CorpusOverview> {
        let content_graph = self.client.config().graphs.content.clone();
        let counts_query = format!(
            "{prefixes}\nSELECT ?type (COUNT(DISTINCT ?s) AS ?n) \
             WHERE {{ GRAPH <{graph}> {{ ?s a ?type }} }} GROUP BY ?type",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
        );
        let mut overview = CorpusOverview::default();
        for b in self.client.query(&counts_query).await? {
            let n = b.get_u32("n").unwrap_or(0) as usize;
            match b.get_uri("type").unwrap_or("") {
                t if t.ends_with("/Entity") => overview.entity_count = n,
                t if t.ends_with("/SemanticUnit") => overview.unit_count = n,
                t if t.ends_with("/Community") => overview.community_count = n,
                _ => {}
            }
        }

        let interaction_query = format!(
            "{prefixes}\nSELECT (COUNT(DISTINCT ?s) AS ?n) \
             WHERE {{ GRAPH <{graph}> {{ ?s a ragno:Corpuscle }} }}",
            prefixes = self.prefixes(),
            graph = content_graph,
        );
        overview.interaction_count = self
            .client
            .query(&interaction_query)
            .await?
            .first()
            .and_then(|b| b.get_u32("n"))
            .unwrap_or(0) as usize;

        let concepts_query = format!(
            "{prefixes}\nSELECT ?concept (COUNT(?s) AS ?n) \
             WHERE {{ GRAPH <{graph}> {{ ?s ragno:hasConcept ?concept }} }} \
             GROUP BY ?concept ORDER BY DESC(?n) LIMIT 20",
            prefixes = self.prefixes(),
            graph = content_graph,
        );
        overview.top_concepts = self
            .client
            .query(&concepts_query)
            .await?
            .iter()
            .filter_map(|b| {
                Some((
                    b.get_str("concept")?.to_string(),
                    b.get_u32("n").unwrap_or(0) as usize,
                ))
            })
            .collect();
        Ok(overview)
    }

    async fn remove_subject(&self, uri: &str) -> Result<()> {
        self.client.delete_subject(uri, self.graph.as_str()).await
    }

    async fn clear_maybe(&self, uri: &str) -> Result<bool> {
        let ask = format!(
            "{prefixes}\nSELECT (COUNT(*) AS ?n) WHERE {{ GRAPH <{graph}> {{ <{uri}> ragno:maybe ?v }} }}",
            prefixes = self.prefixes(),
            graph = self.graph.as_str(),
        );
        let had = self
            .client
            .query(&ask)
            .await?
            .first()
            .and_then(|b| b.get_u32("n"))
            .unwrap_or(0)
            > 0;
        if had {
            let update = format!(
                "{prefixes}\nDELETE WHERE {{ GRAPH <{graph}> {{ <{uri}> ragno:maybe ?v }} }}",
                prefixes = self.prefixes(),
                graph = self.graph.as_str(),
            );
            self.client.update(&update).await?;
        }
        Ok(had)
    }
}
