// src/state.rs
// Application state shared across verb handlers

use crate::compose::Composer;
use crate::config::{Config, GraphsConfig};
use crate::decompose::Decomposer;
use crate::embeddings::{EmbeddingClient, EmbeddingProvider};
use crate::enrich::{Enrichment, WikidataEnrichment, WikipediaEnrichment};
use crate::error::Result;
use crate::graph::{GraphStore, InMemoryGraphStore, SparqlGraphStore};
use crate::hyde::HypothesisEngine;
use crate::llm::{chat_provider_from_config, ChatClient, ChatProvider};
use crate::memory::{InMemoryLongTermStore, LongTermStore, MemoryStore, SparqlLongTermStore};
use crate::ontology::Namespaces;
use crate::retrieval::Retriever;
use crate::session::SessionRegistry;
use crate::sparql::SparqlClient;
use chrono::{DateTime, Utc};
use oxrdf::NamedNode;
use std::sync::Arc;
use tracing::info;

/// Shared services; cheap to clone behind Arc
pub struct AppState {
    pub config: Config,
    pub ns: Arc<Namespaces>,
    pub sparql: Option<Arc<SparqlClient>>,
    pub graph: Arc<dyn GraphStore>,
    pub memory: Arc<MemoryStore>,
    pub embeddings: Arc<EmbeddingClient>,
    pub chat: Arc<ChatClient>,
    pub retriever: Arc<Retriever>,
    pub decomposer: Arc<Decomposer>,
    pub hyde: Arc<HypothesisEngine>,
    pub composer: Arc<Composer>,
    pub sessions: Arc<SessionRegistry>,
    pub wikipedia: Arc<dyn Enrichment>,
    pub wikidata: Arc<dyn Enrichment>,
    pub ragno_graph: NamedNode,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire everything from configuration: real providers, SPARQL-backed
    /// stores when an endpoint is configured, in-memory stores otherwise.
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        config.validate()?;
        let http = crate::http::create_shared_client();

        let sparql = config
            .sparql_endpoints
            .first()
            .map(|ep| Arc::new(SparqlClient::new(http.clone(), ep.clone())));

        let embeddings = Arc::new(EmbeddingClient::from_config(&config, http.clone())?);
        let chat = Arc::new(ChatClient::new(chat_provider_from_config(&config, http)?));

        Self::assemble(config, sparql, embeddings, chat)
    }

    /// Wire with injected providers and in-memory stores (tests, offline)
    pub fn with_providers(
        config: Config,
        chat_provider: Arc<dyn ChatProvider>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<Self>> {
        let embeddings = Arc::new(EmbeddingClient::with_provider(
            embedding_provider,
            config.embedding_dimension_or_default(),
            &config.cache,
        ));
        let chat = Arc::new(ChatClient::new(chat_provider));
        Self::assemble(config, None, embeddings, chat)
    }

    fn assemble(
        config: Config,
        sparql: Option<Arc<SparqlClient>>,
        embeddings: Arc<EmbeddingClient>,
        chat: Arc<ChatClient>,
    ) -> Result<Arc<Self>> {
        let ns = Arc::new(Namespaces::default());
        let graphs = sparql
            .as_ref()
            .map(|c| c.config().graphs.clone())
            .unwrap_or_else(GraphsConfig::default);
        let ragno_graph = NamedNode::new_unchecked(graphs.ragno.clone());
        let nav_graph = NamedNode::new_unchecked(graphs.navigation.clone());

        let graph: Arc<dyn GraphStore> = match &sparql {
            Some(client) => {
                info!(query_url = %client.config().query_url, "using SPARQL-backed graph store");
                Arc::new(SparqlGraphStore::new(client.clone(), ns.clone()))
            }
            None => {
                info!("no SPARQL endpoint configured, using in-process graph store");
                Arc::new(InMemoryGraphStore::new())
            }
        };
        let long_term: Arc<dyn LongTermStore> = match &sparql {
            Some(client) => Arc::new(SparqlLongTermStore::new(client.clone(), ns.clone())),
            None => Arc::new(InMemoryLongTermStore::default()),
        };
        let memory = Arc::new(MemoryStore::new(long_term, config.memory.clone()));

        let retriever = Arc::new(Retriever::new(
            embeddings.clone(),
            chat.clone(),
            memory.clone(),
            graph.clone(),
            config.retrieval.clone(),
        ));
        let decomposer = Arc::new(Decomposer::new(
            chat.clone(),
            ns.clone(),
            graph.clone(),
            ragno_graph.clone(),
            config.decompose.clone(),
        ));
        let hyde = Arc::new(HypothesisEngine::new(
            chat.clone(),
            decomposer.clone(),
            ns.clone(),
            graph.clone(),
            ragno_graph.clone(),
            config.decompose.clone(),
        ));
        let composer = Arc::new(Composer::new(config.compose.clone()));
        let sessions = Arc::new(SessionRegistry::new(
            config.session.clone(),
            ns.clone(),
            graph.clone(),
            nav_graph,
        ));

        Ok(Arc::new(Self {
            config,
            ns,
            sparql,
            graph,
            memory,
            embeddings,
            chat,
            retriever,
            decomposer,
            hyde,
            composer,
            sessions,
            wikipedia: Arc::new(WikipediaEnrichment),
            wikidata: Arc::new(WikidataEnrichment),
            ragno_graph,
            started_at: Utc::now(),
        }))
    }
}
