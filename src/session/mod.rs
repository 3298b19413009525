// src/session/mod.rs
// Session registry: per-session ZPT state, recent-interaction cache, and
// the per-session verb queue that serialises execution

use crate::config::SessionConfig;
use crate::error::{MnemoError, Result};
use crate::graph::GraphStore;
use crate::memory::{Interaction, MemoryStore};
use crate::ontology::{Namespaces, UriKind};
use crate::zpt::{session_close_quad, session_quads, ZptState};
use chrono::{DateTime, Utc};
use oxrdf::NamedNode;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One live session. The semaphore bounds the verb queue (overflow is
/// `Busy`); the gate serialises execution in submission order.
pub struct SessionHandle {
    pub id: String,
    pub uri: NamedNode,
    pub state: RwLock<ZptState>,
    pub recent: RwLock<VecDeque<Interaction>>,
    pub created_at: DateTime<Utc>,
    pub last_activity: RwLock<DateTime<Utc>>,
    queue: Semaphore,
    gate: Mutex<()>,
    recent_capacity: usize,
}

impl SessionHandle {
    /// Immutable copy of the ZPT state
    pub async fn zpt_snapshot(&self) -> ZptState {
        self.state.read().await.snapshot()
    }

    /// Record an interaction in the recent cache (bounded deque)
    pub async fn push_recent(&self, interaction: Interaction) {
        let mut recent = self.recent.write().await;
        recent.push_back(interaction);
        while recent.len() > self.recent_capacity {
            recent.pop_front();
        }
    }

    pub async fn recent_snapshot(&self) -> Vec<Interaction> {
        self.recent.read().await.iter().cloned().collect()
    }

    async fn touch_activity(&self) {
        *self.last_activity.write().await = Utc::now();
    }
}

/// Concurrent session map with per-key serialisation.
///
/// Sessions are created lazily on first verb, evicted after the configured
/// idle timeout (emitting the closing `prov:endedAtTime` quad), and expose
/// only snapshot reads to other components.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    cfg: SessionConfig,
    ns: Arc<Namespaces>,
    graph: Arc<dyn GraphStore>,
    nav_graph: NamedNode,
}

impl SessionRegistry {
    pub fn new(
        cfg: SessionConfig,
        ns: Arc<Namespaces>,
        graph: Arc<dyn GraphStore>,
        nav_graph: NamedNode,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cfg,
            ns,
            graph,
            nav_graph,
        }
    }

    pub fn navigation_graph(&self) -> &NamedNode {
        &self.nav_graph
    }

    /// Fetch or lazily create a session; creation emits the
    /// NavigationSession opening quads
    pub async fn get_or_create(&self, session_id: &str) -> Result<Arc<SessionHandle>> {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            handle.touch_activity().await;
            return Ok(handle.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(session_id) {
            return Ok(handle.clone());
        }

        let uri = self.ns.mint(UriKind::Session, None);
        let handle = Arc::new(SessionHandle {
            id: session_id.to_string(),
            uri: uri.clone(),
            state: RwLock::new(ZptState::new(session_id)),
            recent: RwLock::new(VecDeque::new()),
            created_at: Utc::now(),
            last_activity: RwLock::new(Utc::now()),
            queue: Semaphore::new(self.cfg.queue_depth),
            gate: Mutex::new(()),
            recent_capacity: self.cfg.recent_capacity,
        });
        sessions.insert(session_id.to_string(), handle.clone());
        drop(sessions);

        let quads = session_quads(&uri, session_id, "semantic memory", &self.nav_graph);
        if let Err(e) = self.graph.insert_quads(quads).await {
            warn!(session = session_id, error = %e, "failed to record session start");
        }
        info!(session = session_id, uri = uri.as_str(), "session created");
        Ok(handle)
    }

    /// Run a verb under the session's serialisation discipline.
    ///
    /// Queue overflow returns `Busy` without waiting; otherwise the verb
    /// runs in submission order, bounded by `timeout` and aborted at the
    /// next suspension point on cancellation.
    pub async fn run_serialized<T, F>(
        &self,
        handle: &Arc<SessionHandle>,
        timeout: Duration,
        cancel: CancellationToken,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = handle.queue.try_acquire().map_err(|_| {
            MnemoError::Busy(format!("session {} queue is full", handle.id))
        })?;
        let _gate = handle.gate.lock().await;
        handle.touch_activity().await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MnemoError::Cancelled),
            result = tokio::time::timeout(timeout, fut) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(MnemoError::Timeout(format!(
                        "verb exceeded {}s", timeout.as_secs()
                    ))),
                }
            }
        }
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn snapshot(&self, session_id: &str) -> Option<ZptState> {
        let handle = self.sessions.read().await.get(session_id).cloned()?;
        Some(handle.zpt_snapshot().await)
    }

    /// Evict sessions idle past the configured timeout; emits closing
    /// quads and drops their short-term memory tier. Returns evicted ids.
    pub async fn evict_idle(&self, memory: &MemoryStore) -> Vec<String> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.cfg.idle_timeout_secs as i64);
        let mut expired = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, handle) in sessions.iter() {
                if *handle.last_activity.read().await < cutoff {
                    expired.push((id.clone(), handle.clone()));
                }
            }
        }
        let mut evicted = Vec::new();
        for (id, handle) in expired {
            self.close_session(&id, &handle, memory).await;
            evicted.push(id);
        }
        evicted
    }

    /// Evict everything (shutdown path)
    pub async fn evict_all(&self, memory: &MemoryStore) -> usize {
        let all: Vec<(String, Arc<SessionHandle>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, h)| (id.clone(), h.clone()))
            .collect();
        let count = all.len();
        for (id, handle) in all {
            self.close_session(&id, &handle, memory).await;
        }
        count
    }

    async fn close_session(&self, id: &str, handle: &Arc<SessionHandle>, memory: &MemoryStore) {
        // serialize against in-flight verbs before tearing down
        let _gate = handle.gate.lock().await;
        self.sessions.write().await.remove(id);
        memory.drop_session(id).await;
        let close = session_close_quad(&handle.uri, &self.nav_graph);
        if let Err(e) = self.graph.insert_quads(vec![close]).await {
            warn!(session = id, error = %e, "failed to record session end");
        }
        debug!(session = id, "session evicted");
    }
}

/// Background eviction sweep
pub fn spawn_eviction_worker(
    registry: Arc<SessionRegistry>,
    memory: Arc<MemoryStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let evicted = registry.evict_idle(&memory).await;
            if !evicted.is_empty() {
                info!(count = evicted.len(), "evicted idle sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::graph::InMemoryGraphStore;
    use crate::memory::InMemoryLongTermStore;

    fn registry_with(cfg: SessionConfig) -> (Arc<SessionRegistry>, Arc<MemoryStore>) {
        let ns = Arc::new(Namespaces::default());
        let graph = Arc::new(InMemoryGraphStore::new());
        let registry = Arc::new(SessionRegistry::new(
            cfg,
            ns,
            graph,
            NamedNode::new_unchecked("http://example.org/navigation"),
        ));
        let memory = Arc::new(MemoryStore::new(
            Arc::new(InMemoryLongTermStore::default()),
            MemoryConfig::default(),
        ));
        (registry, memory)
    }

    #[tokio::test]
    async fn test_lazy_creation_and_reuse() {
        let (registry, _) = registry_with(SessionConfig::default());
        let a = registry.get_or_create("s1").await.unwrap();
        let b = registry.get_or_create("s1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_run_serialized_executes_in_order() {
        let (registry, _) = registry_with(SessionConfig::default());
        let handle = registry.get_or_create("s1").await.unwrap();
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for i in 0..4 {
            let registry = registry.clone();
            let handle = handle.clone();
            let order = order.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .run_serialized(
                        &handle,
                        Duration::from_secs(5),
                        CancellationToken::new(),
                        async move {
                            order.lock().await.push(i);
                            Ok::<_, MnemoError>(())
                        },
                    )
                    .await
            }));
        }
        for task in tasks {
            let _ = task.await.unwrap();
        }
        // all four ran exactly once (order across spawns is scheduler-
        // dependent, mutual exclusion is what we require)
        assert_eq!(order.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_queue_overflow_returns_busy() {
        let cfg = SessionConfig {
            queue_depth: 1,
            ..Default::default()
        };
        let (registry, _) = registry_with(cfg);
        let handle = registry.get_or_create("s1").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let registry_bg = registry.clone();
        let handle_bg = handle.clone();
        let blocker = tokio::spawn(async move {
            registry_bg
                .run_serialized(
                    &handle_bg,
                    Duration::from_secs(5),
                    CancellationToken::new(),
                    async move {
                        let _ = rx.await;
                        Ok::<_, MnemoError>(())
                    },
                )
                .await
        });
        // let the blocker take the only permit
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = registry
            .run_serialized(
                &handle,
                Duration::from_secs(5),
                CancellationToken::new(),
                async { Ok::<_, MnemoError>(()) },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BUSY");

        let _ = tx.send(());
        let _ = blocker.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_raises_timeout_kind() {
        let (registry, _) = registry_with(SessionConfig::default());
        let handle = registry.get_or_create("s1").await.unwrap();
        let err = registry
            .run_serialized(
                &handle,
                Duration::from_millis(20),
                CancellationToken::new(),
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, MnemoError>(())
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[tokio::test]
    async fn test_cancellation_aborts() {
        let (registry, _) = registry_with(SessionConfig::default());
        let handle = registry.get_or_create("s1").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = registry
            .run_serialized(&handle, Duration::from_secs(5), cancel, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, MnemoError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
    }

    #[tokio::test]
    async fn test_eviction_emits_closing_quad_and_drops_tier() {
        let cfg = SessionConfig {
            idle_timeout_secs: 0,
            ..Default::default()
        };
        let (registry, memory) = registry_with(cfg);
        registry.get_or_create("s1").await.unwrap();
        memory
            .append("s1", Interaction::new("p".to_string(), "r".to_string()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let evicted = registry.evict_idle(&memory).await;
        assert_eq!(evicted, vec!["s1".to_string()]);
        assert_eq!(registry.active_count().await, 0);
        assert!(memory.short_term_snapshot("s1").await.is_empty());
        // interaction survives in the long tier
        let (_, long) = memory.counts().await.unwrap();
        assert_eq!(long, 1);
    }

    #[tokio::test]
    async fn test_recent_cache_is_bounded() {
        let cfg = SessionConfig {
            recent_capacity: 2,
            ..Default::default()
        };
        let (registry, _) = registry_with(cfg);
        let handle = registry.get_or_create("s1").await.unwrap();
        for i in 0..3 {
            handle
                .push_recent(Interaction::new(format!("p{i}"), "r".to_string()))
                .await;
        }
        let recent = handle.recent_snapshot().await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].prompt, "p1");
    }
}
