use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;
use crate::state::{RECORD_VERSION, SessionState};
use crate::traits::StateStore;

/// A process-local store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<SessionState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SessionState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStore {
    fn get(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, apply: &mut dyn FnMut(&mut SessionState)) -> Result<SessionState, StoreError> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        apply(&mut next);
        next.version = RECORD_VERSION;
        *guard = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_namespace_keeps_context() {
        let store = MemoryStore::new();
        store.set("kind", "default").unwrap();
        let state = store.set_namespace("kube-system").unwrap();

        assert_eq!(state.current_context, "kind");
        assert_eq!(state.current_namespace, "kube-system");
        assert_eq!(store.get(), state);
    }
}
