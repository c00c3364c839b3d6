#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use kukuruku::error::KukurukuError;
use kukuruku::select::{Selection, SelectionRequest, Selector};
use kukuruku::stream::LocalIo;
use kukuruku::terminal::LocalTerminal;
use kukuruku_k8s_backend::{
    BackendError, ClusterBackend, ContextEntry, ExecRequest, ExecSession, PodPhase, PodRef,
    RemoteExit,
};
use kukuruku_session::{SessionState, StateStore, StoreError};
use tokio::sync::mpsc;

pub fn running_pod(name: &str, containers: &[&str]) -> PodRef {
    pod(name, containers, PodPhase::Running)
}

pub fn pod(name: &str, containers: &[&str], phase: PodPhase) -> PodRef {
    PodRef {
        name: name.to_string(),
        namespace: "default".to_string(),
        containers: containers.iter().map(|c| c.to_string()).collect(),
        phase,
    }
}

pub fn session(context: &str, namespace: &str) -> SessionState {
    SessionState {
        current_context: context.to_string(),
        current_namespace: namespace.to_string(),
        ..SessionState::default()
    }
}

/// In-memory cluster that counts calls.
#[derive(Default)]
pub struct FakeBackend {
    pub current: Option<String>,
    pub contexts: Vec<ContextEntry>,
    pub namespaces: Vec<String>,
    pub pods: Vec<PodRef>,
    pub exec_error: Option<BackendError>,
    pub exit: Option<RemoteExit>,
    pub context_calls: AtomicUsize,
    pub exec_calls: AtomicUsize,
    pub exec_requests: Mutex<Vec<ExecRequest>>,
}

impl FakeBackend {
    pub fn with_contexts(names: &[(&str, Option<&str>)]) -> Self {
        Self {
            contexts: names
                .iter()
                .map(|(name, ns)| ContextEntry {
                    name: name.to_string(),
                    cluster: format!("{name}-cluster"),
                    namespace: ns.map(String::from),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_pods(pods: Vec<PodRef>) -> Self {
        Self {
            pods,
            ..Self::default()
        }
    }

    pub fn context_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst)
    }

    pub fn exec_calls(&self) -> usize {
        self.exec_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ClusterBackend for FakeBackend {
    fn current_context(&self) -> Option<ContextEntry> {
        let current = self.current.as_deref()?;
        let entry = self.contexts.iter().find(|c| c.name == current).cloned();
        Some(entry.unwrap_or_else(|| ContextEntry {
            name: current.to_string(),
            cluster: String::new(),
            namespace: None,
        }))
    }

    async fn list_contexts(&self) -> Result<Vec<ContextEntry>, BackendError> {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contexts.clone())
    }

    async fn list_namespaces(&self, _context: &str) -> Result<Vec<String>, BackendError> {
        Ok(self.namespaces.clone())
    }

    async fn list_pods(&self, _context: &str, _namespace: &str) -> Result<Vec<PodRef>, BackendError> {
        Ok(self.pods.clone())
    }

    async fn exec(&self, request: &ExecRequest) -> Result<ExecSession, BackendError> {
        self.exec_calls.fetch_add(1, Ordering::SeqCst);
        self.exec_requests
            .lock()
            .unwrap()
            .push(request.clone());
        if let Some(err) = &self.exec_error {
            return Err(err.clone());
        }

        let exit = self
            .exit
            .clone()
            .unwrap_or(RemoteExit::Completed { code: Some(0) });
        Ok(ExecSession {
            pod: request.pod.clone(),
            container: request.container.clone(),
            tty: request.tty,
            stdin: Some(Box::new(tokio::io::sink())),
            stdout: Some(Box::new(std::io::Cursor::new(b"hello\n".to_vec()))),
            stderr: None,
            resize: None,
            abort: None,
            done: async move { exit }.boxed(),
        })
    }
}

/// Answers every selection with the same scripted result and records what it was asked.
pub struct ScriptedSelector {
    answer: Selection,
    pub requests: Mutex<Vec<SelectionRequest>>,
}

impl ScriptedSelector {
    pub fn new(answer: Selection) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Selector for ScriptedSelector {
    fn select(&self, request: &SelectionRequest) -> Result<Selection, KukurukuError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.answer)
    }
}

/// Terminal with no user input; output is discarded.
#[derive(Default)]
pub struct FakeTerminal {
    pub opened: usize,
    pub closed: usize,
}

impl LocalTerminal for FakeTerminal {
    fn open(&mut self, _tty: bool) -> Result<LocalIo, KukurukuError> {
        self.opened += 1;
        let (_, input) = mpsc::channel(1);
        let (_, resizes) = mpsc::channel(1);
        let (_, interrupts) = mpsc::channel(1);
        Ok(LocalIo {
            input,
            output: Box::new(tokio::io::sink()),
            errors: Box::new(tokio::io::sink()),
            resizes,
            interrupts,
        })
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}

/// A store whose disk has gone away: reads return the last good record, writes fail.
pub struct ReadOnlyStore {
    pub state: SessionState,
}

impl StateStore for ReadOnlyStore {
    fn get(&self) -> SessionState {
        self.state.clone()
    }

    fn update(&self, _apply: &mut dyn FnMut(&mut SessionState)) -> Result<SessionState, StoreError> {
        Err(StoreError::NoStateDir)
    }
}
