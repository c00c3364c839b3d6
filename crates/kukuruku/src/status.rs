//! Status line for the shell prompt.
//!
//! Everything here is a pure function of a [`SessionState`]: no I/O, no clock, no
//! environment. The output is `<context>/<namespace>` so shell code can split on `/`.

use kukuruku_session::SessionState;

use crate::constants::{
    DEFAULT_PROMPT_FORMAT, STATUS_DELIMITER, STATUS_EMPTY_FIELD, STATUS_PLACEHOLDER,
    STATUS_STALE_MARKER,
};

/// Render the default status line: `ctx/ns`, `ctx?/ns` when stale, `-/-` when empty.
pub fn render(state: &SessionState) -> String {
    if state.current_context.is_empty() {
        return STATUS_PLACEHOLDER.to_string();
    }

    let mut line = String::with_capacity(
        state.current_context.len() + state.current_namespace.len() + 2,
    );
    line.push_str(&state.current_context);
    if state.stale {
        line.push(STATUS_STALE_MARKER);
    }
    line.push(STATUS_DELIMITER);
    line.push_str(field(&state.current_namespace));
    line
}

fn field(value: &str) -> &str {
    if value.is_empty() { STATUS_EMPTY_FIELD } else { value }
}

/// User-supplied prompt template with `{status}`, `{context}` and `{namespace}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFormat {
    template: String,
}

impl Default for StatusFormat {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_FORMAT)
    }
}

impl StatusFormat {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, state: &SessionState) -> String {
        let context = if state.is_empty() {
            STATUS_EMPTY_FIELD
        } else {
            &state.current_context
        };
        let namespace = if state.is_empty() {
            STATUS_EMPTY_FIELD
        } else {
            field(&state.current_namespace)
        };

        self.template
            .replace("{status}", &render(state))
            .replace("{context}", context)
            .replace("{namespace}", namespace)
    }
}
