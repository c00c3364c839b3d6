use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "default";

/// Format tag written with every record.
pub const RECORD_VERSION: u32 = 1;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// A kubeconfig context as last fetched.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ContextRef {
    pub name: String,
    pub cluster: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl ContextRef {
    pub fn new(name: impl Into<String>, cluster: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            namespace: namespace
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(default_namespace),
        }
    }
}

/// The single per-user session record.
///
/// `stale` is set whenever `current_context` is not part of the last fetched context list.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SessionState {
    pub version: u32,
    pub current_context: String,
    pub current_namespace: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub cached_contexts: Vec<ContextRef>,
    pub cache_expiry: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.current_context.is_empty()
    }

    pub fn cache_is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.cache_expiry.is_some_and(|expiry| now < expiry)
    }

    pub fn find_context(&self, name: &str) -> Option<&ContextRef> {
        self.cached_contexts.iter().find(|c| c.name == name)
    }

    /// Namespace to use for cluster calls; falls back to `default`.
    pub fn namespace_or_default(&self) -> &str {
        if self.current_namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.current_namespace
        }
    }

    pub fn select(&mut self, context: &str, namespace: &str, now: DateTime<Utc>) {
        self.current_context = context.to_string();
        self.current_namespace = namespace.to_string();
        self.last_updated = Some(now);
        self.revalidate();
    }

    /// Replace the cached list (deduplicated by name, first entry wins) and restart its TTL.
    pub fn replace_cache(&mut self, contexts: Vec<ContextRef>, ttl: Duration, now: DateTime<Utc>) {
        let mut seen = HashSet::new();
        self.cached_contexts = contexts
            .into_iter()
            .filter(|c| seen.insert(c.name.clone()))
            .collect();

        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self.cache_expiry = Some(now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC));
        self.last_updated = Some(now);
        self.revalidate();
    }

    pub fn invalidate_cache(&mut self) {
        self.cache_expiry = None;
    }

    fn revalidate(&mut self) {
        let fetched = self.cache_expiry.is_some() || !self.cached_contexts.is_empty();
        self.stale = fetched
            && !self.current_context.is_empty()
            && self.find_context(&self.current_context).is_none();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts(names: &[&str]) -> Vec<ContextRef> {
        names
            .iter()
            .map(|n| ContextRef::new(*n, format!("{n}-cluster"), None))
            .collect()
    }

    #[test]
    fn context_ref_defaults_namespace() {
        assert_eq!(ContextRef::new("kind", "kind", None).namespace, "default");
        assert_eq!(
            ContextRef::new("kind", "kind", Some(String::new())).namespace,
            "default"
        );
        assert_eq!(
            ContextRef::new("kind", "kind", Some("web".to_string())).namespace,
            "web"
        );
    }

    #[test]
    fn missing_current_context_is_stale() {
        let now = Utc::now();
        let mut state = SessionState::default();
        state.select("prod", "default", now);
        assert!(!state.stale, "nothing fetched yet, nothing to compare against");

        state.replace_cache(contexts(&["dev", "staging"]), Duration::from_secs(60), now);
        assert!(state.stale);

        state.replace_cache(contexts(&["dev", "prod"]), Duration::from_secs(60), now);
        assert!(!state.stale);

        state.select("gone", "default", now);
        assert!(state.stale);
    }

    #[test]
    fn cache_freshness_follows_ttl() {
        let now = Utc::now();
        let mut state = SessionState::default();
        assert!(!state.cache_is_fresh(now));

        state.replace_cache(contexts(&["dev"]), Duration::from_secs(30), now);
        assert!(state.cache_is_fresh(now + TimeDelta::seconds(29)));
        assert!(!state.cache_is_fresh(now + TimeDelta::seconds(30)));

        state.invalidate_cache();
        assert!(!state.cache_is_fresh(now));
        assert_eq!(state.cached_contexts.len(), 1);
    }

    #[test]
    fn cached_contexts_are_unique_by_name() {
        let mut state = SessionState::default();
        let mut list = contexts(&["dev", "prod"]);
        list.push(ContextRef::new("dev", "other", None));
        state.replace_cache(list, Duration::from_secs(30), Utc::now());

        let names: Vec<_> = state.cached_contexts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["dev", "prod"]);
        assert_eq!(state.cached_contexts[0].cluster, "dev-cluster");
    }

    #[test]
    fn record_with_unknown_and_missing_fields_still_loads() {
        let state: SessionState =
            serde_json::from_str(r#"{"current_context":"kind","extra":true}"#).unwrap();
        assert_eq!(state.current_context, "kind");
        assert_eq!(state.current_namespace, "");
        assert!(state.cached_contexts.is_empty());
    }
}
