// src/sparql/tx.rs
// Buffered optimistic transaction over a plain SPARQL 1.1 endpoint

use crate::error::Result;
use crate::sparql::client::{build_insert_updates, SparqlClient};
use oxrdf::Quad;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Client-side transaction: updates are buffered until commit and flushed
/// in order while the per-graph write lock is held. Dropping the
/// transaction without committing discards the buffer (rollback).
pub struct SparqlTx {
    client: Arc<SparqlClient>,
    buffered: Vec<String>,
    _guard: OwnedMutexGuard<()>,
}

impl SparqlTx {
    pub(crate) fn new(client: Arc<SparqlClient>, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            client,
            buffered: Vec::new(),
            _guard: guard,
        }
    }

    /// Queue a raw update for commit
    pub fn queue_update(&mut self, sparql: String) {
        self.buffered.push(sparql);
    }

    /// Queue quad insertion for commit
    pub fn insert_quads(&mut self, quads: impl IntoIterator<Item = Quad>) {
        let quads: Vec<Quad> = quads.into_iter().collect();
        self.buffered.extend(build_insert_updates(
            &quads,
            self.client.config().insert_batch_size,
        ));
    }

    /// Number of buffered updates
    pub fn pending(&self) -> usize {
        self.buffered.len()
    }

    /// Flush all buffered updates in order, then release the lock
    pub async fn commit(self) -> Result<()> {
        debug!(updates = self.buffered.len(), "committing SPARQL transaction");
        for update in &self.buffered {
            self.client.update(update).await?;
        }
        Ok(())
    }

    /// Discard buffered updates and release the lock
    pub fn rollback(mut self) {
        debug!(updates = self.buffered.len(), "rolling back SPARQL transaction");
        self.buffered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SparqlEndpointConfig;
    use crate::rdf::{lit, quad, skos};
    use oxrdf::NamedNode;

    fn client() -> Arc<SparqlClient> {
        Arc::new(SparqlClient::new(
            reqwest::Client::new(),
            SparqlEndpointConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_tx_buffers_until_commit() {
        let client = client();
        let mut tx = client.begin_tx("http://example.org/g").await.unwrap();
        tx.queue_update("INSERT DATA { }".to_string());
        let g = NamedNode::new_unchecked("http://example.org/g");
        let s = NamedNode::new_unchecked("http://example.org/s");
        tx.insert_quads(vec![quad(&s, skos("prefLabel"), lit("x"), &g)]);
        assert_eq!(tx.pending(), 2);
        tx.rollback();
    }

    #[tokio::test]
    async fn test_rollback_releases_graph_lock() {
        let client = client();
        let tx = client.begin_tx("http://example.org/g").await.unwrap();
        tx.rollback();
        // a second transaction on the same graph can start immediately
        let tx2 = client.begin_tx("http://example.org/g").await.unwrap();
        assert_eq!(tx2.pending(), 0);
        tx2.rollback();
    }
}
