// src/sparql/client.rs
// SPARQL 1.1 protocol client over HTTP

use crate::config::SparqlEndpointConfig;
use crate::error::{MnemoError, Result};
use crate::rdf::{group_by_graph, is_functional, triple_line};
use crate::sparql::results::{parse_results, Binding};
use crate::sparql::tx::SparqlTx;
use oxrdf::{GraphName, Quad, Subject};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Retry schedule for 5xx responses: base 100 ms, factor 2, cap 5 s
const RETRY_BASE_MS: u64 = 100;
const RETRY_CAP_MS: u64 = 5_000;
const MAX_ATTEMPTS: u32 = 4;

/// SPARQL endpoint client.
///
/// Updates against a given named graph are serialised through a per-graph
/// async lock; the endpoint itself is assumed to be plain SPARQL 1.1
/// Protocol without transaction support.
pub struct SparqlClient {
    http: reqwest::Client,
    cfg: SparqlEndpointConfig,
    graph_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SparqlClient {
    pub fn new(http: reqwest::Client, cfg: SparqlEndpointConfig) -> Self {
        Self {
            http,
            cfg,
            graph_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SparqlEndpointConfig {
        &self.cfg
    }

    /// Run a SELECT/ASK query, returning solution bindings
    pub async fn query(&self, sparql: &str) -> Result<Vec<Binding>> {
        debug!(chars = sparql.len(), "SPARQL query");
        let body = self
            .send_with_retry(|| {
                let mut req = self
                    .http
                    .post(&self.cfg.query_url)
                    .header("Accept", "application/sparql-results+json")
                    .form(&[("query", sparql)]);
                if let Some(user) = &self.cfg.user {
                    req = req.basic_auth(user, self.cfg.password.as_deref());
                }
                req
            })
            .await?;
        let json: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| MnemoError::MalformedResponse(format!("SPARQL results: {e}")))?;
        parse_results(&json)
    }

    /// Run an update (INSERT/DELETE)
    pub async fn update(&self, sparql: &str) -> Result<()> {
        debug!(chars = sparql.len(), "SPARQL update");
        self.send_with_retry(|| {
            let mut req = self
                .http
                .post(&self.cfg.update_url)
                .form(&[("update", sparql)]);
            if let Some(user) = &self.cfg.user {
                req = req.basic_auth(user, self.cfg.password.as_deref());
            }
            req
        })
        .await?;
        Ok(())
    }

    /// Insert a set of quads, batched into `INSERT DATA` chunks per graph
    /// to bound request length
    pub async fn insert_quads(&self, quads: impl IntoIterator<Item = Quad>) -> Result<()> {
        let quads: Vec<Quad> = quads.into_iter().collect();
        for update in build_insert_updates(&quads, self.cfg.insert_batch_size) {
            self.update(&update).await?;
        }
        Ok(())
    }

    /// Delete every triple with the given subject in the given graph
    pub async fn delete_subject(&self, subject_uri: &str, graph_uri: &str) -> Result<()> {
        let update = format!(
            "DELETE WHERE {{ GRAPH <{graph_uri}> {{ <{subject_uri}> ?p ?o }} }}"
        );
        self.update(&update).await
    }

    /// Begin a buffered transaction holding the write lock for `graph_uri`.
    ///
    /// Updates queued on the transaction are flushed in order on commit and
    /// discarded on rollback (or drop).
    pub async fn begin_tx(self: &Arc<Self>, graph_uri: &str) -> Result<SparqlTx> {
        let lock = {
            let mut locks = self
                .graph_locks
                .lock()
                .map_err(|_| MnemoError::Internal("graph lock map poisoned".to_string()))?;
            locks
                .entry(graph_uri.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        Ok(SparqlTx::new(self.clone(), guard))
    }

    /// POST with exponential backoff: 5xx and transport errors retry up to
    /// MAX_ATTEMPTS, 4xx fails immediately
    async fn send_with_retry<F>(&self, build: F) -> Result<Vec<u8>>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = build().send().await;
            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.bytes().await.map(|b| b.to_vec()).map_err(|e| {
                            MnemoError::MalformedResponse(format!("reading body: {e}"))
                        });
                    }
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_client_error() {
                        return Err(MnemoError::ConstraintViolation(format!(
                            "endpoint rejected request ({status}): {text}"
                        )));
                    }
                    if attempt >= MAX_ATTEMPTS {
                        return Err(MnemoError::EndpointUnavailable(format!(
                            "{status} after {attempt} attempts: {text}"
                        )));
                    }
                    warn!(%status, attempt, "SPARQL endpoint error, retrying");
                }
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(MnemoError::EndpointUnavailable(e.to_string()));
                    }
                    warn!(error = %e, attempt, "SPARQL transport error, retrying");
                }
            }
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }
}

/// Exponential backoff with a little jitter
fn backoff_delay(attempt: u32) -> Duration {
    let base = RETRY_BASE_MS.saturating_mul(2u64.saturating_pow(attempt - 1));
    let capped = base.min(RETRY_CAP_MS);
    let jitter = rand::rng().random_range(0..=capped / 4);
    Duration::from_millis(capped + jitter)
}

/// Scoped `DELETE WHERE` statements retracting prior values of
/// single-valued predicates about to be re-inserted.
///
/// Without these, re-emitting an entity (same deterministic URI, fresh
/// `ragno:frequency` or labels) accumulates conflicting triples on the
/// subject. One statement per distinct (graph, subject, predicate).
pub fn build_retract_updates(quads: &[Quad]) -> Vec<String> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut updates = Vec::new();
    for q in quads {
        if !is_functional(&q.predicate) {
            continue;
        }
        let Subject::NamedNode(subject) = &q.subject else {
            continue;
        };
        let graph = match &q.graph_name {
            GraphName::NamedNode(n) => Some(n.as_str().to_string()),
            GraphName::DefaultGraph => None,
            GraphName::BlankNode(_) => continue,
        };
        let key = (
            graph.clone().unwrap_or_default(),
            subject.as_str().to_string(),
            q.predicate.as_str().to_string(),
        );
        if !seen.insert(key) {
            continue;
        }
        let update = match &graph {
            Some(g) => format!(
                "DELETE WHERE {{ GRAPH <{g}> {{ <{s}> <{p}> ?stale }} }}",
                s = subject.as_str(),
                p = q.predicate.as_str(),
            ),
            None => format!(
                "DELETE WHERE {{ <{s}> <{p}> ?stale }}",
                s = subject.as_str(),
                p = q.predicate.as_str(),
            ),
        };
        updates.push(update);
    }
    updates
}

/// Build `INSERT DATA` updates from quads, grouped by graph and chunked
pub fn build_insert_updates(quads: &[Quad], batch_size: usize) -> Vec<String> {
    let mut updates = Vec::new();
    for (graph, group) in group_by_graph(quads) {
        for chunk in group.chunks(batch_size.max(1)) {
            let lines: Vec<String> = chunk.iter().map(|q| triple_line(q)).collect();
            let update = if graph.is_empty() {
                format!("INSERT DATA {{\n{}\n}}", lines.join("\n"))
            } else {
                format!(
                    "INSERT DATA {{ GRAPH <{}> {{\n{}\n}} }}",
                    graph,
                    lines.join("\n")
                )
            };
            updates.push(update);
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{lit, quad, skos};
    use oxrdf::NamedNode;

    fn sample_quads(n: usize) -> Vec<Quad> {
        let g = NamedNode::new_unchecked("http://example.org/g");
        (0..n)
            .map(|i| {
                let s = NamedNode::new_unchecked(format!("http://example.org/e{i}"));
                quad(&s, skos("prefLabel"), lit(&format!("label {i}")), &g)
            })
            .collect()
    }

    #[test]
    fn test_build_insert_updates_chunks() {
        let quads = sample_quads(5);
        let updates = build_insert_updates(&quads, 2);
        assert_eq!(updates.len(), 3); // 2 + 2 + 1
        for update in &updates {
            assert!(update.starts_with("INSERT DATA { GRAPH <http://example.org/g>"));
        }
    }

    #[test]
    fn test_build_insert_updates_single_batch() {
        let quads = sample_quads(3);
        let updates = build_insert_updates(&quads, 500);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].matches(" .").count(), 3);
    }

    #[test]
    fn test_build_retract_updates_scopes_functional_predicates() {
        let g = NamedNode::new_unchecked("http://example.org/g");
        let s = NamedNode::new_unchecked("http://example.org/entity/e1");
        let quads = vec![
            quad(&s, crate::rdf::ragno("frequency"), crate::rdf::lit_u32(2), &g),
            quad(&s, crate::rdf::ragno("frequency"), crate::rdf::lit_u32(2), &g),
            quad(&s, skos("prefLabel"), lit("Eiffel Tower"), &g),
            // multi-valued: never retracted
            quad(&s, crate::rdf::ragno("hasConcept"), lit("tower"), &g),
        ];
        let updates = build_retract_updates(&quads);
        assert_eq!(updates.len(), 2); // frequency deduped, hasConcept skipped
        assert!(updates[0].contains("DELETE WHERE { GRAPH <http://example.org/g>"));
        assert!(updates[0].contains("<http://example.org/entity/e1>"));
        assert!(updates.iter().any(|u| u.contains("frequency")));
        assert!(updates.iter().any(|u| u.contains("prefLabel")));
        assert!(!updates.iter().any(|u| u.contains("hasConcept")));
    }

    #[test]
    fn test_backoff_delay_grows_and_caps() {
        let d1 = backoff_delay(1).as_millis() as u64;
        let d4 = backoff_delay(4).as_millis() as u64;
        assert!(d1 >= RETRY_BASE_MS);
        assert!(d1 <= RETRY_BASE_MS + RETRY_BASE_MS / 4);
        assert!(d4 >= 800);
        // attempt 8 would exceed the cap without clamping
        let d8 = backoff_delay(8).as_millis() as u64;
        assert!(d8 <= RETRY_CAP_MS + RETRY_CAP_MS / 4);
    }
}
