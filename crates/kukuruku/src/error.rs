use kukuruku_k8s_backend::{BackendError, PodPhase};
use kukuruku_session::StoreError;
use thiserror::Error;

/// Every failure a command can report. Cancellation is not in here: a cancelled
/// selection is a normal outcome, not an error.
#[derive(Error, Debug)]
pub enum KukurukuError {
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),
    #[error("authentication failed: {0}")]
    AuthError(String),
    #[error("no pods found in {context}/{namespace}")]
    NoPodsFound { context: String, namespace: String },
    #[error("pod {pod} is not running (phase: {phase})")]
    PodNotReady { pod: String, phase: PodPhase },
    #[error("unable to attach: {0}")]
    AttachError(String),
    #[error("unable to save session: {0}")]
    WriteError(#[from] StoreError),
    #[error("selector failed: {0}")]
    Selector(String),
    #[error("nothing matches '{0}'")]
    NoMatch(String),
    #[error("no context selected - run `ku cctx` first")]
    NoContext,
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

impl KukurukuError {
    pub fn exit_code(&self) -> i32 {
        match self {
            KukurukuError::ClusterUnreachable(_) => 2,
            KukurukuError::AuthError(_) => 3,
            KukurukuError::NoPodsFound { .. } => 4,
            KukurukuError::PodNotReady { .. } => 5,
            KukurukuError::AttachError(_) => 6,
            KukurukuError::WriteError(_) => 7,
            KukurukuError::Selector(_)
            | KukurukuError::NoMatch(_)
            | KukurukuError::NoContext
            | KukurukuError::Terminal(_) => 1,
        }
    }
}

impl From<BackendError> for KukurukuError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ClusterUnreachable(msg) => KukurukuError::ClusterUnreachable(msg),
            BackendError::AuthError(msg) => KukurukuError::AuthError(msg),
            BackendError::AttachError(msg) => KukurukuError::AttachError(msg),
        }
    }
}
