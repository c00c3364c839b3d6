use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use kukuruku_k8s_backend::{ClusterBackend, PodRef};
use kukuruku_session::{ContextRef, StateStore};

use crate::error::KukurukuError;

/// Cache-aware reads from the cluster.
///
/// The context list is served from the session record while its TTL holds and refetched
/// lazily afterwards. Namespaces and pods always come from the cluster.
pub struct ClusterQuery<'a> {
    backend: &'a dyn ClusterBackend,
    store: &'a dyn StateStore,
    ttl: Duration,
}

impl<'a> ClusterQuery<'a> {
    pub fn new(backend: &'a dyn ClusterBackend, store: &'a dyn StateStore, ttl: Duration) -> Self {
        Self {
            backend,
            store,
            ttl,
        }
    }

    pub fn backend(&self) -> &'a dyn ClusterBackend {
        self.backend
    }

    pub async fn list_contexts(&self) -> Result<Vec<ContextRef>, KukurukuError> {
        let state = self.store.get();
        if state.cache_is_fresh(Utc::now()) {
            tracing::debug!("context list served from cache");
            return Ok(state.cached_contexts);
        }
        self.refresh_contexts().await
    }

    /// Refetch the context list and store it with a fresh TTL.
    pub async fn refresh_contexts(&self) -> Result<Vec<ContextRef>, KukurukuError> {
        let entries = self.backend.list_contexts().await?;
        let contexts: Vec<ContextRef> = entries
            .into_iter()
            .map(|entry| ContextRef::new(entry.name, entry.cluster, entry.namespace))
            .collect();

        // a failed cache write only costs a refetch next time
        match self.store.update_cache(contexts.clone(), self.ttl) {
            Ok(state) => Ok(state.cached_contexts),
            Err(e) => {
                tracing::warn!("failed to cache context list: {}", e);
                let mut state = self.store.get();
                state.replace_cache(contexts, self.ttl, Utc::now());
                Ok(state.cached_contexts)
            }
        }
    }

    pub async fn list_namespaces(&self, context: &str) -> Result<BTreeSet<String>, KukurukuError> {
        let names = self.backend.list_namespaces(context).await?;
        Ok(names.into_iter().collect())
    }

    pub async fn list_pods(&self, context: &str, namespace: &str) -> Result<Vec<PodRef>, KukurukuError> {
        let mut pods = self.backend.list_pods(context, namespace).await?;
        pods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pods)
    }
}
