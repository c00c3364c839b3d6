//! Pod exec over the kube websocket transport.
//!
//! [`ExecSession`] erases the concrete attach types so callers can pump any pair of
//! byte streams; fakes in tests build one from in-memory pipes.

use futures::SinkExt;
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::{
    Client,
    api::{Api, AttachParams, AttachedProcess},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::error::BackendError;

/// Used when no command is given: prefer bash, fall back to sh.
pub const DEFAULT_SHELL_COMMAND: [&str; 3] = [
    "/bin/sh",
    "-c",
    "command -v bash >/dev/null && exec bash || exec sh",
];

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl From<TerminalSize> for kube::api::TerminalSize {
    fn from(size: TerminalSize) -> Self {
        kube::api::TerminalSize {
            width: size.cols,
            height: size.rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub context: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub command: Vec<String>,
    pub tty: bool,
}

impl ExecRequest {
    pub fn command_or_default(&self) -> Vec<String> {
        if self.command.is_empty() {
            DEFAULT_SHELL_COMMAND.iter().map(|s| s.to_string()).collect()
        } else {
            self.command.clone()
        }
    }

    fn attach_params(&self) -> AttachParams {
        let params = if self.tty {
            AttachParams::interactive_tty()
        } else {
            // kube refuses tty together with a separate stderr channel
            AttachParams::default().stdin(true).stdout(true).stderr(true)
        };
        params.container(self.container.clone())
    }
}

/// How the remote side of a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteExit {
    /// The remote command finished; `code` is set when the API server reported it.
    Completed { code: Option<i32> },
    /// The local side detached before the remote command finished.
    Detached,
    /// The connection was torn down locally after an interrupt.
    Aborted,
    /// The stream failed after it was established.
    Failed(String),
}

impl RemoteExit {
    pub fn from_status(status: Option<Status>) -> Self {
        let Some(status) = status else {
            return RemoteExit::Completed { code: None };
        };

        if status.status.as_deref() == Some("Success") {
            return RemoteExit::Completed { code: Some(0) };
        }

        let code = status
            .details
            .as_ref()
            .and_then(|d| d.causes.as_ref())
            .and_then(|causes| {
                causes
                    .iter()
                    .find(|c| c.reason.as_deref() == Some("ExitCode"))
                    .and_then(|c| c.message.as_deref())
                    .and_then(|m| m.trim().parse::<i32>().ok())
            });

        match code {
            Some(code) => RemoteExit::Completed { code: Some(code) },
            None => RemoteExit::Failed(
                status
                    .message
                    .unwrap_or_else(|| "remote command failed".to_string()),
            ),
        }
    }
}

/// An established exec stream.
///
/// `done` resolves once the remote side is finished; sending on `abort` asks it to tear the
/// connection down. Every field is owned, so dropping the session releases all handles.
pub struct ExecSession {
    pub pod: String,
    pub container: String,
    pub tty: bool,
    pub stdin: Option<BoxedWriter>,
    pub stdout: Option<BoxedReader>,
    pub stderr: Option<BoxedReader>,
    pub resize: Option<mpsc::Sender<TerminalSize>>,
    pub abort: Option<oneshot::Sender<()>>,
    pub done: BoxFuture<'static, RemoteExit>,
}

impl ExecSession {
    /// Abort the remote side (if still running) and wait for it to wind down.
    pub async fn shutdown(mut self) -> RemoteExit {
        if let Some(abort) = self.abort.take() {
            let _ = abort.send(());
        }
        self.stdin.take();
        self.done.await
    }
}

impl std::fmt::Debug for ExecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecSession")
            .field("pod", &self.pod)
            .field("container", &self.container)
            .field("tty", &self.tty)
            .finish_non_exhaustive()
    }
}

/// Open an exec stream into `request.pod`.
pub async fn start_exec(client: Client, request: &ExecRequest) -> Result<ExecSession, BackendError> {
    let pods: Api<Pod> = Api::namespaced(client, &request.namespace);

    let mut attached = pods
        .exec(&request.pod, request.command_or_default(), &request.attach_params())
        .await
        .map_err(BackendError::from_attach)?;

    tracing::info!(
        "attached to {}/{} container {}",
        request.namespace,
        request.pod,
        request.container
    );

    let stdin = attached.stdin().map(|w| Box::new(w) as BoxedWriter);
    let stdout = attached.stdout().map(|r| Box::new(r) as BoxedReader);
    let stderr = attached.stderr().map(|r| Box::new(r) as BoxedReader);

    let resize = attached.terminal_size().map(|mut sink| {
        let (tx, mut rx) = mpsc::channel::<TerminalSize>(16);
        tokio::spawn(async move {
            while let Some(size) = rx.recv().await {
                if sink.send(size.into()).await.is_err() {
                    break;
                }
            }
        });
        tx
    });

    let (abort_tx, abort_rx) = oneshot::channel();
    let done = wait_for_exit(attached, abort_rx).boxed();

    Ok(ExecSession {
        pod: request.pod.clone(),
        container: request.container.clone(),
        tty: request.tty,
        stdin,
        stdout,
        stderr,
        resize,
        abort: Some(abort_tx),
        done,
    })
}

async fn wait_for_exit(mut attached: AttachedProcess, abort: oneshot::Receiver<()>) -> RemoteExit {
    let status = attached.take_status();
    let status = async move {
        match status {
            Some(status) => status.await,
            None => None,
        }
    };

    tokio::select! {
        Ok(()) = abort => {
            tracing::debug!("aborting exec stream");
            attached.abort();
            RemoteExit::Aborted
        }
        status = status => {
            if let Err(e) = attached.join().await {
                tracing::warn!("exec stream closed with error: {}", e);
            }
            RemoteExit::from_status(status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};

    fn failure(reason: &str, exit_code: Option<&str>) -> Status {
        Status {
            status: Some("Failure".to_string()),
            message: Some("command terminated with non-zero exit code".to_string()),
            reason: Some(reason.to_string()),
            details: exit_code.map(|code| StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".to_string()),
                    message: Some(code.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn success_status_is_exit_zero() {
        let status = Status {
            status: Some("Success".to_string()),
            ..Default::default()
        };
        assert_eq!(
            RemoteExit::from_status(Some(status)),
            RemoteExit::Completed { code: Some(0) }
        );
    }

    #[test]
    fn non_zero_exit_code_is_propagated() {
        assert_eq!(
            RemoteExit::from_status(Some(failure("NonZeroExitCode", Some("42")))),
            RemoteExit::Completed { code: Some(42) }
        );
    }

    #[test]
    fn failure_without_exit_code_is_failed() {
        assert!(matches!(
            RemoteExit::from_status(Some(failure("InternalError", None))),
            RemoteExit::Failed(_)
        ));
        assert_eq!(
            RemoteExit::from_status(None),
            RemoteExit::Completed { code: None }
        );
    }

    #[test]
    fn empty_command_falls_back_to_shell() {
        let request = ExecRequest {
            context: "kind".to_string(),
            namespace: "default".to_string(),
            pod: "web-0".to_string(),
            container: "web".to_string(),
            command: vec![],
            tty: true,
        };
        assert_eq!(request.command_or_default()[0], "/bin/sh");

        let request = ExecRequest {
            command: vec!["env".to_string()],
            ..request
        };
        assert_eq!(request.command_or_default(), vec!["env".to_string()]);
    }
}
