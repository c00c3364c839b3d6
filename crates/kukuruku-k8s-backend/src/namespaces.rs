use k8s_openapi::api::core::v1::Namespace;

use kube::ResourceExt;
use kube::{
    Client,
    api::{Api, ListParams},
};

use crate::error::BackendError;

#[derive(Clone, Debug, Default)]
pub struct NamespaceData {
    pub names: Vec<String>,
}

impl NamespaceData {
    pub fn new() -> Self {
        NamespaceData { names: Vec::new() }
    }

    /// Replace the known names with the namespaces currently in the cluster.
    pub async fn update(&mut self, client: Client) -> Result<(), BackendError> {
        let ns_api: Api<Namespace> = Api::all(client);

        let ns_list = ns_api
            .list(&ListParams::default())
            .await
            .map_err(BackendError::from_kube)?
            .items;

        self.names = ns_list.iter().map(|ns| ns.name_any()).collect();
        self.names.sort();
        self.names.dedup();

        Ok(())
    }
}
