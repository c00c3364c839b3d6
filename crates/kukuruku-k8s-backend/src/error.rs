use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("unable to reach the cluster: {0}")]
    ClusterUnreachable(String),
    #[error("authentication failed: {0}")]
    AuthError(String),
    #[error("exec stream rejected: {0}")]
    AttachError(String),
}

impl BackendError {
    /// Classify an error returned by the kube client.
    ///
    /// 401/403 responses and client-side auth failures are `AuthError`; everything else
    /// (transport, TLS, other API responses) is reported as `ClusterUnreachable`.
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 401 || resp.code == 403 => {
                BackendError::AuthError(format!("{} ({})", resp.message, resp.code))
            }
            kube::Error::Auth(e) => BackendError::AuthError(e.to_string()),
            kube::Error::Api(resp) => BackendError::ClusterUnreachable(format!(
                "api server returned {}: {}",
                resp.code, resp.message
            )),
            other => BackendError::ClusterUnreachable(other.to_string()),
        }
    }

    /// Same as [`BackendError::from_kube`], except that a refused exec upgrade or an API
    /// rejection of the exec request is an `AttachError`.
    pub fn from_attach(err: kube::Error) -> Self {
        match err {
            kube::Error::UpgradeConnection(e) => BackendError::AttachError(e.to_string()),
            kube::Error::Api(ref resp) if resp.code != 401 && resp.code != 403 => {
                BackendError::AttachError(format!("{} ({})", resp.message, resp.code))
            }
            other => BackendError::from_kube(other),
        }
    }
}

impl From<kube::config::KubeconfigError> for BackendError {
    fn from(err: kube::config::KubeconfigError) -> Self {
        BackendError::AuthError(format!("kubeconfig: {err}"))
    }
}
