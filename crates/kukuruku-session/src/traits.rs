use std::time::Duration;

use chrono::Utc;

use crate::error::StoreError;
use crate::state::{ContextRef, SessionState};

/// Owner of the session record.
///
/// `get` never fails: a missing or unreadable record is the default state. All mutation goes
/// through `update`, which replaces the whole record at once.
pub trait StateStore: Send + Sync {
    fn get(&self) -> SessionState;

    fn update(&self, apply: &mut dyn FnMut(&mut SessionState)) -> Result<SessionState, StoreError>;

    fn set(&self, context: &str, namespace: &str) -> Result<SessionState, StoreError> {
        let now = Utc::now();
        self.update(&mut |state| state.select(context, namespace, now))
    }

    fn set_namespace(&self, namespace: &str) -> Result<SessionState, StoreError> {
        let now = Utc::now();
        self.update(&mut |state| {
            let context = state.current_context.clone();
            state.select(&context, namespace, now)
        })
    }

    fn update_cache(&self, contexts: Vec<ContextRef>, ttl: Duration) -> Result<SessionState, StoreError> {
        let now = Utc::now();
        let mut contexts = Some(contexts);
        self.update(&mut |state| {
            if let Some(contexts) = contexts.take() {
                state.replace_cache(contexts, ttl, now);
            }
        })
    }

    fn invalidate_cache(&self) -> Result<SessionState, StoreError> {
        self.update(&mut |state| state.invalidate_cache())
    }
}
