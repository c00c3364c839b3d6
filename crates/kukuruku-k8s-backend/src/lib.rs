pub mod context;
pub mod error;
pub mod exec;
pub mod namespaces;
pub mod pods;

pub use context::{ContextEntry, KubeContext, KubeconfigContexts};
pub use error::BackendError;
pub use exec::{ExecRequest, ExecSession, RemoteExit, TerminalSize};
pub use namespaces::NamespaceData;
pub use pods::{PodData, PodPhase, PodRef};

/// What kukuruku needs from a cluster.
///
/// Every call may block on the network and fails with `ClusterUnreachable` or `AuthError`
/// from the underlying client. Nothing here retries.
#[async_trait::async_trait]
pub trait ClusterBackend: Send + Sync {
    /// `current-context` from kubeconfig, with the namespace it declares. Local read only.
    fn current_context(&self) -> Option<ContextEntry>;

    async fn list_contexts(&self) -> Result<Vec<ContextEntry>, BackendError>;

    async fn list_namespaces(&self, context: &str) -> Result<Vec<String>, BackendError>;

    async fn list_pods(&self, context: &str, namespace: &str) -> Result<Vec<PodRef>, BackendError>;

    async fn exec(&self, request: &ExecRequest) -> Result<ExecSession, BackendError>;
}

/// [`ClusterBackend`] over kubeconfig and the kube client.
#[derive(Default)]
pub struct KubeBackend {
    context: KubeContext,
}

impl KubeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ClusterBackend for KubeBackend {
    fn current_context(&self) -> Option<ContextEntry> {
        match KubeconfigContexts::read() {
            Ok(contexts) => contexts.current_entry(),
            Err(e) => {
                tracing::debug!("no kubeconfig current-context: {}", e);
                None
            }
        }
    }

    async fn list_contexts(&self) -> Result<Vec<ContextEntry>, BackendError> {
        Ok(KubeconfigContexts::read()?.entries)
    }

    async fn list_namespaces(&self, context: &str) -> Result<Vec<String>, BackendError> {
        let client = self.context.client_for(context).await?;
        let mut data = NamespaceData::new();
        data.update(client).await?;
        tracing::debug!("listed {} namespaces in {}", data.names.len(), context);
        Ok(data.names)
    }

    async fn list_pods(&self, context: &str, namespace: &str) -> Result<Vec<PodRef>, BackendError> {
        let client = self.context.client_for(context).await?;
        let mut data = PodData::default();
        data.update_all(client, namespace).await?;
        tracing::debug!(
            "listed {} pods in {}/{}",
            data.list.len(),
            context,
            namespace
        );
        Ok(data.list)
    }

    async fn exec(&self, request: &ExecRequest) -> Result<ExecSession, BackendError> {
        let client = self.context.client_for(&request.context).await?;
        exec::start_exec(client, request).await
    }
}
