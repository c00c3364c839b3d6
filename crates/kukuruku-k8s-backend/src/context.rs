use std::collections::HashMap;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::sync::RwLock;

use crate::error::BackendError;

/// A context as declared in kubeconfig.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextEntry {
    pub name: String,
    pub cluster: String,
    pub namespace: Option<String>,
}

/// Read-only view over the user's kubeconfig.
///
/// Reading kubeconfig is local file I/O only; no cluster is contacted.
#[derive(Clone, Debug, Default)]
pub struct KubeconfigContexts {
    pub current: Option<String>,
    pub entries: Vec<ContextEntry>,
}

impl KubeconfigContexts {
    /// Load and merge kubeconfig from `$KUBECONFIG` or `~/.kube/config`.
    pub fn read() -> Result<Self, BackendError> {
        let config = Kubeconfig::read()?;
        Ok(Self::from_kubeconfig(config))
    }

    pub fn from_kubeconfig(config: Kubeconfig) -> Self {
        let entries = config
            .contexts
            .into_iter()
            .map(|named| {
                let (cluster, namespace) = named
                    .context
                    .map(|ctx| (ctx.cluster, ctx.namespace))
                    .unwrap_or_default();
                ContextEntry {
                    name: named.name,
                    cluster,
                    namespace,
                }
            })
            .collect();

        Self {
            current: config.current_context,
            entries,
        }
    }

    /// The entry named by `current-context`. A name with no matching entry is still
    /// returned, with no cluster or namespace.
    pub fn current_entry(&self) -> Option<ContextEntry> {
        let current = self.current.as_deref()?;
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == current)
            .cloned()
            .unwrap_or_else(|| ContextEntry {
                name: current.to_string(),
                cluster: String::new(),
                namespace: None,
            });
        Some(entry)
    }
}

/// Per-context client cache.
///
/// Building a client parses kubeconfig and sets up TLS, so clients are kept for the life of
/// the process. The lock is only held while touching the map, never while talking to the
/// cluster.
#[derive(Default)]
pub struct KubeContext {
    clients: RwLock<HashMap<String, Client>>,
}

impl KubeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn client_for(&self, context: &str) -> Result<Client, BackendError> {
        if let Some(client) = self.clients.read().await.get(context) {
            tracing::debug!("kube client cache hit for {}", context);
            return Ok(client.clone());
        }

        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options).await?;
        let client = Client::try_from(config).map_err(BackendError::from_kube)?;
        tracing::info!("created kube client for context {}", context);

        self.clients
            .write()
            .await
            .insert(context.to_string(), client.clone());

        Ok(client)
    }
}
