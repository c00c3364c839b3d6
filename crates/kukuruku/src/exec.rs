//! Interactive exec: pick a pod and container, attach, stream until closed.
//!
//! The command walks `Idle -> ResolvingTarget -> Selecting -> Attaching -> Streaming ->
//! Closed`, skipping `Selecting` when the target is unambiguous. Every path, including
//! errors and cancellation, ends in `Closed`.

use std::fmt;

use kukuruku_k8s_backend::{ExecRequest, PodPhase, PodRef, RemoteExit};
use kukuruku_session::SessionState;

use crate::error::KukurukuError;
use crate::query::ClusterQuery;
use crate::select::{Selector, narrow, select_index};
use crate::stream;
use crate::terminal::LocalTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecPhase {
    Idle,
    ResolvingTarget,
    Selecting,
    Attaching,
    Streaming,
    Closed,
}

impl fmt::Display for ExecPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Pod name or fuzzy query narrowing the candidates.
    pub pod_query: Option<String>,
    pub container: Option<String>,
    /// Empty runs the default shell.
    pub command: Vec<String>,
    pub tty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub context: String,
    pub namespace: String,
    pub pod: PodRef,
    pub container: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Finished(RemoteExit),
    Cancelled,
}

pub struct ExecOrchestrator<'a> {
    query: &'a ClusterQuery<'a>,
    selector: &'a dyn Selector,
    phases: Vec<ExecPhase>,
}

impl<'a> ExecOrchestrator<'a> {
    pub fn new(query: &'a ClusterQuery<'a>, selector: &'a dyn Selector) -> Self {
        Self {
            query,
            selector,
            phases: vec![ExecPhase::Idle],
        }
    }

    /// Every phase entered so far, in order.
    pub fn phases(&self) -> &[ExecPhase] {
        &self.phases
    }

    pub fn phase(&self) -> ExecPhase {
        self.phases.last().copied().unwrap_or(ExecPhase::Idle)
    }

    fn enter(&mut self, phase: ExecPhase) {
        tracing::debug!("exec: {} -> {}", self.phase(), phase);
        self.phases.push(phase);
    }

    /// Run the whole command against `session`'s context and namespace.
    pub async fn run(
        &mut self,
        session: &SessionState,
        options: &ExecOptions,
        terminal: &mut dyn LocalTerminal,
    ) -> Result<ExecOutcome, KukurukuError> {
        let result = self.drive(session, options, terminal).await;
        terminal.close();
        self.enter(ExecPhase::Closed);
        result
    }

    async fn drive(
        &mut self,
        session: &SessionState,
        options: &ExecOptions,
        terminal: &mut dyn LocalTerminal,
    ) -> Result<ExecOutcome, KukurukuError> {
        let Some(target) = self.resolve(session, options).await? else {
            tracing::info!("exec cancelled during selection");
            return Ok(ExecOutcome::Cancelled);
        };

        self.enter(ExecPhase::Attaching);
        let request = ExecRequest {
            context: target.context.clone(),
            namespace: target.namespace.clone(),
            pod: target.pod.name.clone(),
            container: target.container.clone(),
            command: options.command.clone(),
            tty: options.tty,
        };
        let exec = self.query.backend().exec(&request).await?;

        self.enter(ExecPhase::Streaming);
        let local = match terminal.open(options.tty) {
            Ok(local) => local,
            Err(e) => {
                exec.shutdown().await;
                return Err(e);
            }
        };
        let exit = stream::pump(exec, local).await;
        tracing::info!("exec session on {} ended: {:?}", target.pod.name, exit);

        Ok(ExecOutcome::Finished(exit))
    }

    /// Find the pod and container to attach to. `None` means the user cancelled.
    pub async fn resolve(
        &mut self,
        session: &SessionState,
        options: &ExecOptions,
    ) -> Result<Option<ExecTarget>, KukurukuError> {
        self.enter(ExecPhase::ResolvingTarget);

        if session.is_empty() {
            return Err(KukurukuError::NoContext);
        }
        let context = session.current_context.clone();
        let namespace = session.namespace_or_default().to_string();

        let pods = self.query.list_pods(&context, &namespace).await?;
        if pods.is_empty() {
            return Err(KukurukuError::NoPodsFound { context, namespace });
        }

        let names: Vec<String> = pods.iter().map(|p| p.name.clone()).collect();
        let candidates = narrow(&names, options.pod_query.as_deref())?;

        let index = match candidates.as_slice() {
            [only] => *only,
            _ => {
                self.enter(ExecPhase::Selecting);
                let labels: Vec<String> = pods.iter().map(PodRef::label).collect();
                match select_index(self.selector, "pod> ", &labels, &candidates)? {
                    Some(index) => index,
                    None => return Ok(None),
                }
            }
        };
        let pod = pods[index].clone();

        if pod.phase != PodPhase::Running {
            return Err(KukurukuError::PodNotReady {
                pod: pod.name,
                phase: pod.phase,
            });
        }

        let Some(container) = self.resolve_container(&pod, options.container.as_deref())? else {
            return Ok(None);
        };

        Ok(Some(ExecTarget {
            context,
            namespace,
            pod,
            container,
        }))
    }

    fn resolve_container(
        &mut self,
        pod: &PodRef,
        requested: Option<&str>,
    ) -> Result<Option<String>, KukurukuError> {
        if let Some(requested) = requested {
            return if pod.containers.iter().any(|c| c == requested) {
                Ok(Some(requested.to_string()))
            } else {
                Err(KukurukuError::AttachError(format!(
                    "container {} not found in pod {} (has: {})",
                    requested,
                    pod.name,
                    pod.containers.join(", ")
                )))
            };
        }

        match pod.containers.as_slice() {
            [] => Err(KukurukuError::AttachError(format!(
                "pod {} has no containers",
                pod.name
            ))),
            [only] => Ok(Some(only.clone())),
            containers => {
                if self.phase() != ExecPhase::Selecting {
                    self.enter(ExecPhase::Selecting);
                }
                let all: Vec<usize> = (0..containers.len()).collect();
                Ok(select_index(self.selector, "container> ", containers, &all)?
                    .map(|i| containers[i].clone()))
            }
        }
    }
}
