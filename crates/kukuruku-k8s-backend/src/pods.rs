use std::fmt;

use k8s_openapi::api::core::v1::Pod;

use kube::ResourceExt;
use kube::{
    Client,
    api::{Api, ListParams},
};

use crate::error::BackendError;

/// Lifecycle phase reported in `status.phase`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(phase)
    }
}

/// Snapshot of a pod, fetched per request and never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<String>,
    pub phase: PodPhase,
}

impl PodRef {
    pub fn from_pod(pod: &Pod) -> Self {
        let containers: Vec<String> = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(); // If spec is None, there is nothing to exec into

        PodRef {
            name: pod.name_any(),
            namespace: pod.namespace().unwrap_or_default(),
            containers,
            phase: PodPhase::parse(pod.status.as_ref().and_then(|s| s.phase.as_deref())),
        }
    }

    /// Line shown in the selector: name, phase and containers.
    pub fn label(&self) -> String {
        format!(
            "{}  [{}]  {}",
            self.name,
            self.phase,
            self.containers.join(",")
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct PodData {
    pub list: Vec<PodRef>,
}

impl PodData {
    /// Fetch every pod in `namespace`, ordered by name.
    pub async fn update_all(&mut self, client: Client, namespace: &str) -> Result<(), BackendError> {
        let pods: Api<Pod> = Api::namespaced(client, namespace);

        let pod_list = pods
            .list(&ListParams::default())
            .await
            .map_err(BackendError::from_kube)?;

        let mut list: Vec<PodRef> = pod_list.items.iter().map(PodRef::from_pod).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));

        self.list = list;

        Ok(())
    }
}
