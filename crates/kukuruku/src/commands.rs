use kukuruku_k8s_backend::{ClusterBackend, RemoteExit};
use kukuruku_session::{SessionState, StateStore};

use crate::config::Settings;
use crate::error::KukurukuError;
use crate::exec::{ExecOptions, ExecOrchestrator, ExecOutcome};
use crate::query::ClusterQuery;
use crate::select::{Selector, pick};
use crate::status::{StatusFormat, render};
use crate::terminal::LocalTerminal;

/// What a command did, for printing and for the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Text for stdout.
    Report(String),
    /// The session moved to a new context/namespace.
    Switched(SessionState),
    /// The user backed out; nothing changed.
    Cancelled,
    /// An exec session ended.
    Exec(RemoteExit),
}

impl CommandOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandOutcome::Exec(RemoteExit::Completed { code: Some(code) }) => *code,
            CommandOutcome::Exec(RemoteExit::Aborted) => 130,
            CommandOutcome::Exec(RemoteExit::Failed(_)) => 1,
            _ => 0,
        }
    }
}

/// The kukuruku application: one session store, one cluster, one selector.
pub struct Kukuruku<'a> {
    settings: &'a Settings,
    store: &'a dyn StateStore,
    backend: &'a dyn ClusterBackend,
    selector: &'a dyn Selector,
}

impl<'a> Kukuruku<'a> {
    pub fn new(
        settings: &'a Settings,
        store: &'a dyn StateStore,
        backend: &'a dyn ClusterBackend,
        selector: &'a dyn Selector,
    ) -> Self {
        Self {
            settings,
            store,
            backend,
            selector,
        }
    }

    fn query(&self) -> ClusterQuery<'a> {
        ClusterQuery::new(self.backend, self.store, self.settings.cache_ttl)
    }

    /// Status line for the shell prompt. Store reads never fail, so neither does this.
    pub fn prompt(&self) -> String {
        StatusFormat::new(self.settings.prompt_format.clone()).render(&self.store.get())
    }

    /// Session state, falling back to kubeconfig's current-context (and the namespace it
    /// declares) when nothing has been selected yet. The fallback is not written back.
    pub fn session(&self) -> SessionState {
        let state = self.store.get();
        if !state.is_empty() {
            return state;
        }
        match self.backend.current_context() {
            Some(context) => SessionState {
                current_context: context.name,
                current_namespace: context.namespace.unwrap_or_default(),
                ..state
            },
            None => state,
        }
    }

    /// `ku ctx`
    pub fn show_context(&self) -> CommandOutcome {
        let stored = self.store.get();
        let state = self.session();

        if state.is_empty() {
            return CommandOutcome::Report(format!(
                "{}\nno context selected - run `ku cctx`",
                render(&state)
            ));
        }

        let mut report = format!(
            "context:   {}\nnamespace: {}",
            state.current_context,
            state.namespace_or_default()
        );
        if stored.is_empty() {
            report.push_str("\n(from kubeconfig current-context)");
        } else if let Some(context) = state.find_context(&state.current_context) {
            report.push_str(&format!("\ncluster:   {}", context.cluster));
        }
        if state.stale {
            report.push_str("\nwarning: context is missing from kubeconfig - run `ku refresh`");
        }
        CommandOutcome::Report(report)
    }

    /// `ku cctx [QUERY]`: switch context and move to its default namespace.
    pub async fn choose_context(&self, query: Option<&str>) -> Result<CommandOutcome, KukurukuError> {
        let contexts = self.query().list_contexts().await?;
        if contexts.is_empty() {
            return Err(KukurukuError::NoMatch(
                query.unwrap_or("any context in kubeconfig").to_string(),
            ));
        }

        let names: Vec<String> = contexts.iter().map(|c| c.name.clone()).collect();
        let labels: Vec<String> = contexts
            .iter()
            .map(|c| format!("{}  ({}, ns: {})", c.name, c.cluster, c.namespace))
            .collect();

        let Some(index) = pick(self.selector, "context> ", &names, &labels, query)? else {
            return Ok(CommandOutcome::Cancelled);
        };
        let chosen = &contexts[index];

        let state = self.store.set(&chosen.name, &chosen.namespace)?;
        tracing::info!("switched to context {}/{}", chosen.name, chosen.namespace);
        Ok(CommandOutcome::Switched(state))
    }

    /// `ku cns [QUERY]`: switch namespace within the current context.
    pub async fn choose_namespace(&self, query: Option<&str>) -> Result<CommandOutcome, KukurukuError> {
        let session = self.session();
        if session.is_empty() {
            return Err(KukurukuError::NoContext);
        }

        let namespaces: Vec<String> = self
            .query()
            .list_namespaces(&session.current_context)
            .await?
            .into_iter()
            .collect();
        if namespaces.is_empty() {
            return Err(KukurukuError::NoMatch(
                query.unwrap_or("any namespace").to_string(),
            ));
        }

        let Some(index) = pick(self.selector, "namespace> ", &namespaces, &namespaces, query)? else {
            return Ok(CommandOutcome::Cancelled);
        };

        let state = self
            .store
            .set(&session.current_context, &namespaces[index])?;
        tracing::info!(
            "switched to namespace {}/{}",
            state.current_context,
            state.current_namespace
        );
        Ok(CommandOutcome::Switched(state))
    }

    /// `ku exec`
    pub async fn exec(
        &self,
        options: &ExecOptions,
        terminal: &mut dyn LocalTerminal,
    ) -> Result<CommandOutcome, KukurukuError> {
        let session = self.session();
        let query = self.query();
        let mut orchestrator = ExecOrchestrator::new(&query, self.selector);

        match orchestrator.run(&session, options, terminal).await? {
            ExecOutcome::Cancelled => Ok(CommandOutcome::Cancelled),
            ExecOutcome::Finished(exit) => Ok(CommandOutcome::Exec(exit)),
        }
    }

    /// `ku refresh`: drop the cached context list and fetch it again.
    pub async fn refresh(&self) -> Result<CommandOutcome, KukurukuError> {
        if let Err(e) = self.store.invalidate_cache() {
            tracing::warn!("failed to invalidate context cache: {}", e);
        }
        let contexts = self.query().refresh_contexts().await?;
        let state = self.store.get();

        let mut report = format!("{} contexts cached", contexts.len());
        if state.stale {
            report.push_str(&format!(
                "\nwarning: current context {} is no longer in kubeconfig",
                state.current_context
            ));
        }
        Ok(CommandOutcome::Report(report))
    }
}
