// src/memory/store.rs
// Two-tier interaction store. Short-term lives in per-session deques;
// long-term is pluggable, with the SPARQL-backed implementation as the
// authoritative RDF view.

use super::decay::{access_boost, age_decay};
use super::types::{Interaction, ScanFilter};
use crate::config::MemoryConfig;
use crate::error::{MnemoError, Result};
use crate::ontology::{Namespaces, UriKind};
use crate::rdf::{lit, lit_dt, lit_f32, lit_u32, quad, ragno, rdf_type};
use crate::sparql::SparqlClient;
use async_trait::async_trait;
use chrono::Utc;
use oxrdf::NamedNode;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Long-term tier contract
#[async_trait]
pub trait LongTermStore: Send + Sync {
    async fn append(&self, interaction: &Interaction) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Interaction>>;
    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Interaction>>;
    async fn update_access(&self, id: Uuid, access_count: u32, decay_factor: f32) -> Result<bool>;
    async fn remove(&self, id: Uuid) -> Result<bool>;
    async fn count(&self) -> Result<usize>;
}

/// In-memory long-term tier (tests, endpoint-less deployments)
#[derive(Default)]
pub struct InMemoryLongTermStore {
    items: RwLock<HashMap<Uuid, Interaction>>,
}

#[async_trait]
impl LongTermStore for InMemoryLongTermStore {
    async fn append(&self, interaction: &Interaction) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&interaction.id) {
            return Err(MnemoError::ConstraintViolation(format!(
                "interaction {} already exists",
                interaction.id
            )));
        }
        items.insert(interaction.id, interaction.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Interaction>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Interaction>> {
        let items = self.items.read().await;
        let mut matched: Vec<Interaction> = items
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn update_access(&self, id: Uuid, access_count: u32, decay_factor: f32) -> Result<bool> {
        let mut items = self.items.write().await;
        match items.get_mut(&id) {
            Some(item) => {
                item.access_count = access_count;
                item.decay_factor = decay_factor;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        Ok(self.items.write().await.remove(&id).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.items.read().await.len())
    }
}

/// SPARQL-backed long-term tier; interactions live in the content graph
pub struct SparqlLongTermStore {
    client: Arc<SparqlClient>,
    ns: Arc<Namespaces>,
    graph: NamedNode,
}

impl SparqlLongTermStore {
    pub fn new(client: Arc<SparqlClient>, ns: Arc<Namespaces>) -> Self {
        let graph = NamedNode::new_unchecked(client.config().graphs.content.clone());
        Self { client, ns, graph }
    }

    fn interaction_uri(&self, id: Uuid) -> NamedNode {
        self.ns.mint(UriKind::Interaction, Some(&id.to_string()))
    }

    /// Quads equivalent to one interaction record
    pub fn quads_for(&self, interaction: &Interaction) -> Vec<oxrdf::Quad> {
        let subject = self.interaction_uri(interaction.id);
        let g = &self.graph;
        let mut quads = vec![
            quad(&subject, rdf_type(), ragno("Corpuscle"), g),
            quad(&subject, ragno("id"), lit(&interaction.id.to_string()), g),
            quad(&subject, ragno("prompt"), lit(&interaction.prompt), g),
            quad(&subject, ragno("content"), lit(&interaction.response), g),
            quad(&subject, ragno("timestamp"), lit_dt(interaction.timestamp), g),
            quad(&subject, ragno("accessCount"), lit_u32(interaction.access_count), g),
            quad(&subject, ragno("decayFactor"), lit_f32(interaction.decay_factor), g),
        ];
        if !interaction.embedding.is_empty() {
            // vectors travel as a JSON array literal under ragno:hasEmbedding
            let encoded = serde_json::to_string(&interaction.embedding).unwrap_or_default();
            quads.push(quad(&subject, ragno("hasEmbedding"), lit(&encoded), g));
        }
        for concept in &interaction.concepts {
            quads.push(quad(&subject, ragno("hasConcept"), lit(concept), g));
        }
        for domain in &interaction.metadata.domains {
            quads.push(quad(&subject, ragno("inDomain"), lit(domain), g));
        }
        if interaction.metadata.hypothetical {
            quads.push(quad(&subject, ragno("maybe"), crate::rdf::lit_bool(true), g));
        }
        quads
    }
}

#[async_trait]
impl LongTermStore for SparqlLongTermStore {
    async fn append(&self, interaction: &Interaction) -> Result<()> {
        let mut tx = self.client.begin_tx(self.graph.as_str()).await?;
        tx.insert_quads(self.quads_for(interaction));
        tx.commit().await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Interaction>> {
        let query = format!(
            "{prefixes}\nSELECT ?s ?prompt ?content ?timestamp ?access ?decay ?embedding \
             (GROUP_CONCAT(DISTINCT ?concept; separator=\"\\u001F\") AS ?concepts) \
             (GROUP_CONCAT(DISTINCT ?domain; separator=\"\\u001F\") AS ?domains) \
             WHERE {{ GRAPH <{graph}> {{ \
               ?s ragno:id \"{id}\" ; ragno:prompt ?prompt ; ragno:content ?content ; \
                  ragno:timestamp ?timestamp ; ragno:accessCount ?access ; ragno:decayFactor ?decay . \
               OPTIONAL {{ ?s ragno:hasEmbedding ?embedding }} \
               OPTIONAL {{ ?s ragno:hasConcept ?concept }} \
               OPTIONAL {{ ?s ragno:inDomain ?domain }} \
             }} }} GROUP BY ?s ?prompt ?content ?timestamp ?access ?decay ?embedding",
            prefixes = self.ns.sparql_prefixes(),
            graph = self.graph.as_str(),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings.first().and_then(|b| binding_to_interaction(b, id)))
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Interaction>> {
        let mut constraints = String::new();
        if let Some(after) = filter.after {
            constraints.push_str(&format!(
                "FILTER (?timestamp >= \"{}\"^^xsd:dateTime) ",
                after.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            ));
        }
        if let Some(before) = filter.before {
            constraints.push_str(&format!(
                "FILTER (?timestamp <= \"{}\"^^xsd:dateTime) ",
                before.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            ));
        }
        if !filter.domains.is_empty() {
            let list = filter
                .domains
                .iter()
                .map(|d| format!("\"{}\"", escape_literal(d)))
                .collect::<Vec<_>>()
                .join(", ");
            constraints.push_str(&format!(
                "?s ragno:inDomain ?filterDomain . FILTER (?filterDomain IN ({list})) "
            ));
        }
        if let Some(text) = &filter.text {
            constraints.push_str(&format!(
                "FILTER (CONTAINS(LCASE(?prompt), LCASE(\"{t}\")) || CONTAINS(LCASE(?content), LCASE(\"{t}\"))) ",
                t = escape_literal(text)
            ));
        }
        let limit = filter.limit.unwrap_or(1000);
        let query = format!(
            "{prefixes}\nSELECT ?s ?id ?prompt ?content ?timestamp ?access ?decay ?embedding \
             (GROUP_CONCAT(DISTINCT ?concept; separator=\"\\u001F\") AS ?concepts) \
             (GROUP_CONCAT(DISTINCT ?domain; separator=\"\\u001F\") AS ?domains) \
             WHERE {{ GRAPH <{graph}> {{ \
               ?s a ragno:Corpuscle ; ragno:id ?id ; ragno:prompt ?prompt ; ragno:content ?content ; \
                  ragno:timestamp ?timestamp ; ragno:accessCount ?access ; ragno:decayFactor ?decay . \
               OPTIONAL {{ ?s ragno:hasEmbedding ?embedding }} \
               OPTIONAL {{ ?s ragno:hasConcept ?concept }} \
               OPTIONAL {{ ?s ragno:inDomain ?domain }} \
               {constraints} \
             }} }} GROUP BY ?s ?id ?prompt ?content ?timestamp ?access ?decay ?embedding \
             ORDER BY DESC(?timestamp) LIMIT {limit}",
            prefixes = self.ns.sparql_prefixes(),
            graph = self.graph.as_str(),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings
            .iter()
            .filter_map(|b| {
                let id = Uuid::parse_str(b.get_str("id")?).ok()?;
                binding_to_interaction(b, id)
            })
            .collect())
    }

    async fn update_access(&self, id: Uuid, access_count: u32, decay_factor: f32) -> Result<bool> {
        let uri = self.interaction_uri(id);
        let update = format!(
            "{prefixes}\nDELETE {{ GRAPH <{graph}> {{ <{uri}> ragno:accessCount ?a ; ragno:decayFactor ?d }} }} \
             INSERT {{ GRAPH <{graph}> {{ <{uri}> ragno:accessCount {access} ; ragno:decayFactor {decay} }} }} \
             WHERE {{ GRAPH <{graph}> {{ <{uri}> ragno:accessCount ?a ; ragno:decayFactor ?d }} }}",
            prefixes = self.ns.sparql_prefixes(),
            graph = self.graph.as_str(),
            uri = uri.as_str(),
            access = access_count,
            decay = decay_factor,
        );
        self.client.update(&update).await?;
        Ok(true)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let uri = self.interaction_uri(id);
        self.client
            .delete_subject(uri.as_str(), self.graph.as_str())
            .await?;
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        let query = format!(
            "{prefixes}\nSELECT (COUNT(?s) AS ?n) WHERE {{ GRAPH <{graph}> {{ ?s a ragno:Corpuscle }} }}",
            prefixes = self.ns.sparql_prefixes(),
            graph = self.graph.as_str(),
        );
        let bindings = self.client.query(&query).await?;
        Ok(bindings
            .first()
            .and_then(|b| b.get_u32("n"))
            .unwrap_or(0) as usize)
    }
}

fn binding_to_interaction(b: &crate::sparql::Binding, id: Uuid) -> Option<Interaction> {
    let mut interaction = Interaction::new(
        b.get_str("prompt")?.to_string(),
        b.get_str("content")?.to_string(),
    );
    interaction.id = id;
    interaction.timestamp = b.get_datetime("timestamp")?;
    interaction.access_count = b.get_u32("access").unwrap_or(0);
    interaction.decay_factor = b.get_f32("decay").unwrap_or(1.0);
    if let Some(encoded) = b.get_str("embedding") {
        interaction.embedding = serde_json::from_str(encoded).unwrap_or_default();
    }
    interaction.concepts = split_concat(b.get_str("concepts"));
    interaction.metadata.domains = split_concat(b.get_str("domains"));
    Some(interaction)
}

fn split_concat(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split('\u{1f}')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Two-tier store facade.
///
/// Short-term deques are per session (no cross-session locking); the
/// long-term tier is process-wide.
pub struct MemoryStore {
    short: RwLock<HashMap<String, Arc<RwLock<VecDeque<Interaction>>>>>,
    long: Arc<dyn LongTermStore>,
    cfg: MemoryConfig,
}

impl MemoryStore {
    pub fn new(long: Arc<dyn LongTermStore>, cfg: MemoryConfig) -> Self {
        Self {
            short: RwLock::new(HashMap::new()),
            long,
            cfg,
        }
    }

    pub fn long_term(&self) -> &Arc<dyn LongTermStore> {
        &self.long
    }

    async fn session_deque(&self, session_id: &str) -> Arc<RwLock<VecDeque<Interaction>>> {
        if let Some(deque) = self.short.read().await.get(session_id) {
            return deque.clone();
        }
        let mut map = self.short.write().await;
        map.entry(session_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(VecDeque::new())))
            .clone()
    }

    /// Append an interaction: stamps defaults, sanitizes concepts, writes
    /// both tiers (the long tier is the authoritative RDF projection).
    pub async fn append(&self, session_id: &str, mut interaction: Interaction) -> Result<Interaction> {
        interaction.sanitize_concepts();
        if interaction.timestamp.timestamp() == 0 {
            interaction.timestamp = Utc::now();
        }
        interaction.access_count = 0;
        interaction.decay_factor = 1.0;

        self.long.append(&interaction).await?;

        let deque = self.session_deque(session_id).await;
        let mut deque = deque.write().await;
        deque.push_back(interaction.clone());
        while deque.len() > self.cfg.short_term_capacity {
            // FIFO overflow: oldest item falls back to the long tier only
            deque.pop_front();
        }
        debug!(session = session_id, id = %interaction.id, "interaction appended");
        Ok(interaction)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Interaction>> {
        let map = self.short.read().await;
        for deque in map.values() {
            if let Some(found) = deque.read().await.iter().find(|i| i.id == id) {
                return Ok(Some(found.clone()));
            }
        }
        drop(map);
        self.long.get(id).await
    }

    /// Snapshot of a session's short-term tier, newest last
    pub async fn short_term_snapshot(&self, session_id: &str) -> Vec<Interaction> {
        match self.short.read().await.get(session_id) {
            Some(deque) => deque.read().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn scan_long(&self, filter: &ScanFilter) -> Result<Vec<Interaction>> {
        self.long.scan(filter).await
    }

    /// Record an access: bump `access_count`, boost `decay_factor`.
    /// Both tiers observe the same numbers.
    pub async fn touch(&self, id: Uuid) -> Result<()> {
        let mut updated: Option<(u32, f32)> = None;
        let map = self.short.read().await;
        for deque in map.values() {
            let mut deque = deque.write().await;
            if let Some(item) = deque.iter_mut().find(|i| i.id == id) {
                item.access_count += 1;
                item.decay_factor = access_boost(item.decay_factor, self.cfg.access_boost_alpha);
                updated = Some((item.access_count, item.decay_factor));
                break;
            }
        }
        drop(map);

        match updated {
            Some((access, decay)) => {
                self.long.update_access(id, access, decay).await?;
            }
            None => {
                if let Some(mut item) = self.long.get(id).await? {
                    item.access_count += 1;
                    item.decay_factor =
                        access_boost(item.decay_factor, self.cfg.access_boost_alpha);
                    self.long
                        .update_access(id, item.access_count, item.decay_factor)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Remove an interaction from both tiers
    pub async fn forget(&self, id: Uuid) -> Result<bool> {
        let mut found_short = false;
        let map = self.short.read().await;
        for deque in map.values() {
            let mut deque = deque.write().await;
            let before = deque.len();
            deque.retain(|i| i.id != id);
            if deque.len() < before {
                found_short = true;
            }
        }
        drop(map);
        let found_long = self.long.remove(id).await?;
        Ok(found_short || found_long)
    }

    /// Multiply decay factors of matched interactions by `(1 - fade)`.
    /// System-instruction items are preserved. Returns affected count.
    pub async fn fade(&self, target: &str, domain: Option<&str>, fade: f32) -> Result<usize> {
        let fade = fade.clamp(0.0, 1.0);
        let mut affected = 0usize;
        let mut long_updates: Vec<(Uuid, u32, f32)> = Vec::new();

        let map = self.short.read().await;
        for deque in map.values() {
            let mut deque = deque.write().await;
            for item in deque.iter_mut() {
                if item.metadata.system_instruction {
                    continue;
                }
                if !matches_fade_target(item, target, domain) {
                    continue;
                }
                item.decay_factor *= 1.0 - fade;
                long_updates.push((item.id, item.access_count, item.decay_factor));
                affected += 1;
            }
        }
        drop(map);

        // long-tier items not resident in any short tier
        let filter = ScanFilter {
            text: if target.is_empty() {
                None
            } else {
                Some(target.to_string())
            },
            domains: domain.map(|d| vec![d.to_string()]).unwrap_or_default(),
            ..Default::default()
        };
        let seen: std::collections::HashSet<Uuid> =
            long_updates.iter().map(|(id, _, _)| *id).collect();
        for item in self.long.scan(&filter).await? {
            if item.metadata.system_instruction || seen.contains(&item.id) {
                continue;
            }
            long_updates.push((item.id, item.access_count, item.decay_factor * (1.0 - fade)));
            affected += 1;
        }

        for (id, access, decay) in long_updates {
            self.long.update_access(id, access, decay).await?;
        }
        Ok(affected)
    }

    /// One decay cycle over every session's short-term tier.
    /// Returns (aged, demoted) counts.
    pub async fn decay_pass(&self) -> Result<(usize, usize)> {
        let mut aged = 0usize;
        let mut demoted = 0usize;
        let sessions: Vec<Arc<RwLock<VecDeque<Interaction>>>> =
            self.short.read().await.values().cloned().collect();

        for deque in sessions {
            let mut deque = deque.write().await;
            let mut keep = VecDeque::with_capacity(deque.len());
            for mut item in deque.drain(..) {
                item.decay_factor = age_decay(item.decay_factor, self.cfg.aging_factor);
                aged += 1;
                if item.decay_factor < self.cfg.promotion_threshold {
                    // below threshold: long-term only from here on
                    self.long
                        .update_access(item.id, item.access_count, item.decay_factor)
                        .await?;
                    demoted += 1;
                } else {
                    keep.push_back(item);
                }
            }
            *deque = keep;
        }
        Ok((aged, demoted))
    }

    /// (short-term items across sessions, long-term items)
    pub async fn counts(&self) -> Result<(usize, usize)> {
        let mut short_total = 0usize;
        for deque in self.short.read().await.values() {
            short_total += deque.read().await.len();
        }
        let long_total = self.long.count().await?;
        Ok((short_total, long_total))
    }

    /// Drop a session's short-term tier (eviction); items remain long-term
    pub async fn drop_session(&self, session_id: &str) {
        self.short.write().await.remove(session_id);
    }
}

fn matches_fade_target(item: &Interaction, target: &str, domain: Option<&str>) -> bool {
    if let Some(domain) = domain {
        if !item.metadata.domains.iter().any(|d| d == domain) {
            return false;
        }
    }
    if target.is_empty() {
        return true;
    }
    let needle = target.to_lowercase();
    item.prompt.to_lowercase().contains(&needle)
        || item.response.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::InteractionMetadata;

    fn store() -> MemoryStore {
        MemoryStore::new(
            Arc::new(InMemoryLongTermStore::default()),
            MemoryConfig::default(),
        )
    }

    fn interaction(prompt: &str, response: &str) -> Interaction {
        Interaction::new(prompt.to_string(), response.to_string())
    }

    #[tokio::test]
    async fn test_append_writes_both_tiers() {
        let store = store();
        let stored = store
            .append("s1", interaction("hello", "world"))
            .await
            .unwrap();
        assert_eq!(store.short_term_snapshot("s1").await.len(), 1);
        assert!(store.long_term().get(stored.id).await.unwrap().is_some());
        let (short, long) = store.counts().await.unwrap();
        assert_eq!((short, long), (1, 1));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = store();
        let first = store.append("s1", interaction("a", "b")).await.unwrap();
        let mut dupe = interaction("c", "d");
        dupe.id = first.id;
        let err = store.append("s1", dupe).await.unwrap_err();
        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    }

    #[tokio::test]
    async fn test_touch_boosts_decay_and_access() {
        let store = store();
        let stored = store.append("s1", interaction("a", "b")).await.unwrap();
        store.touch(stored.id).await.unwrap();
        let after = store.get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(after.access_count, 1);
        assert_eq!(after.decay_factor, 1.0); // already at ceiling
    }

    #[tokio::test]
    async fn test_forget_removes_both_tiers() {
        let store = store();
        let stored = store.append("s1", interaction("a", "b")).await.unwrap();
        assert!(store.forget(stored.id).await.unwrap());
        assert!(store.get_by_id(stored.id).await.unwrap().is_none());
        let (short, long) = store.counts().await.unwrap();
        assert_eq!((short, long), (0, 0));
    }

    #[tokio::test]
    async fn test_decay_pass_demotes_below_threshold() {
        let mut cfg = MemoryConfig::default();
        cfg.aging_factor = 0.1; // aggressive aging so one pass demotes
        cfg.promotion_threshold = 0.4;
        let store = MemoryStore::new(Arc::new(InMemoryLongTermStore::default()), cfg);
        let stored = store.append("s1", interaction("a", "b")).await.unwrap();

        let (aged, demoted) = store.decay_pass().await.unwrap();
        assert_eq!((aged, demoted), (1, 1));
        assert!(store.short_term_snapshot("s1").await.is_empty());
        // still reachable through the long tier
        let long_copy = store.get_by_id(stored.id).await.unwrap().unwrap();
        assert!(long_copy.decay_factor < 0.4);
    }

    #[tokio::test]
    async fn test_fade_preserves_system_instructions() {
        let store = store();
        let mut sys = interaction("System rule", "always on");
        sys.metadata = InteractionMetadata {
            system_instruction: true,
            ..Default::default()
        };
        store.append("s1", sys).await.unwrap();
        let plain = store.append("s1", interaction("plain fact", "x")).await.unwrap();

        let affected = store.fade("", None, 0.5).await.unwrap();
        assert_eq!(affected, 1);
        let faded = store.get_by_id(plain.id).await.unwrap().unwrap();
        assert!((faded.decay_factor - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_short_term_capacity_fifo() {
        let mut cfg = MemoryConfig::default();
        cfg.short_term_capacity = 2;
        let store = MemoryStore::new(Arc::new(InMemoryLongTermStore::default()), cfg);
        for i in 0..3 {
            store
                .append("s1", interaction(&format!("p{i}"), "r"))
                .await
                .unwrap();
        }
        let snapshot = store.short_term_snapshot("s1").await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].prompt, "p1");
        // overflowed item still lives in the long tier
        let (_, long) = store.counts().await.unwrap();
        assert_eq!(long, 3);
    }
}
