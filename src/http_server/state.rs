use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth::{AgentValidator, HsAgentValidator};
use crate::cache::{CacheOp, ClusterCache};
use crate::invalidation::InvalidationEngine;
use crate::store::DocumentStore;
use crate::versioning::VersioningWriter;

use super::config::HttpConfig;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ClusterCache>,
    pub store: Arc<dyn DocumentStore>,
    pub writer: Arc<VersioningWriter>,
    pub invalidation: InvalidationEngine,
    pub jwt: Arc<dyn AgentValidator>,
    pub agent_claim: String,
    pub barrier_budget: Duration,
    pub id_prefix: String,
    pub caching_enabled: bool,
    /// Shared by every worker in the process group so each joins the
    /// same replication cluster rather than its own isolated cache.
    cluster_tx: broadcast::Sender<CacheOp>,
}

impl AppState {
    pub fn new(config: &HttpConfig, store: Arc<dyn DocumentStore>) -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self::new_with_cluster(config, store, tx)
    }

    fn new_with_cluster(
        config: &HttpConfig,
        store: Arc<dyn DocumentStore>,
        tx: broadcast::Sender<CacheOp>,
    ) -> Self {
        let cache = Arc::new(ClusterCache::join(&config.cache, tx.clone()));
        let writer = Arc::new(VersioningWriter::new(store.clone(), config.id_prefix.clone()));
        Self {
            cache,
            store,
            writer,
            invalidation: InvalidationEngine::new(),
            jwt: Arc::new(HsAgentValidator::new(
                &config.jwt_secret,
                config.audience.as_deref(),
                config.issuer.as_deref(),
            )),
            agent_claim: config.agent_claim.clone(),
            barrier_budget: config.invalidation_timeout,
            id_prefix: config.id_prefix.clone(),
            caching_enabled: config.caching_enabled,
            cluster_tx: tx,
        }
    }

    /// Build an additional worker sharing the same document store and
    /// broadcast cluster as `self`, but its own local cache map — this
    /// is what lets a multi-worker process group converge through the
    /// channel instead of a shared lock.
    pub fn join_worker(&self, config: &HttpConfig) -> Self {
        Self::new_with_cluster(config, self.store.clone(), self.cluster_tx.clone())
    }
}
