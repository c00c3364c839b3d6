use std::path::PathBuf;
use std::time::Duration;

use kukuruku_session::FileStore;

use crate::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_PROMPT_FORMAT, DEFAULT_SELECTOR, ENV_CACHE_TTL, ENV_HOME,
    ENV_PROMPT_FORMAT, ENV_SELECTOR, LOG_DIR_NAME,
};

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub state_dir: PathBuf,
    /// Selector program followed by its arguments.
    pub selector: Vec<String>,
    pub cache_ttl: Duration,
    pub prompt_format: String,
    /// Problems found while reading the environment; logged once tracing is up.
    pub warnings: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut warnings = Vec::new();

        let state_dir = match lookup(ENV_HOME).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => FileStore::default_dir().unwrap_or_else(|e| {
                warnings.push(format!("{e}; using ./.kukuruku"));
                PathBuf::from(".kukuruku")
            }),
        };

        let selector: Vec<String> = lookup(ENV_SELECTOR)
            .map(|cmd| cmd.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        let selector = if selector.is_empty() {
            vec![DEFAULT_SELECTOR.to_string()]
        } else {
            selector
        };

        let cache_ttl = match lookup(ENV_CACHE_TTL) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warnings.push(format!(
                        "{ENV_CACHE_TTL}={raw} is not a number of seconds; using {DEFAULT_CACHE_TTL_SECS}"
                    ));
                    Duration::from_secs(DEFAULT_CACHE_TTL_SECS)
                }
            },
            None => Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        };

        let prompt_format = lookup(ENV_PROMPT_FORMAT)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT_FORMAT.to_string());

        Self {
            state_dir,
            selector,
            cache_ttl,
            prompt_format,
            warnings,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join(LOG_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let settings = settings(&[(ENV_HOME, "/tmp/ku")]);
        assert_eq!(settings.state_dir, PathBuf::from("/tmp/ku"));
        assert_eq!(settings.selector, vec!["fzf"]);
        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.prompt_format, "{status}");
        assert_eq!(settings.log_dir(), PathBuf::from("/tmp/ku/logs"));
        assert!(settings.warnings.is_empty());
    }

    #[test]
    fn selector_command_is_split_into_arguments() {
        let settings = settings(&[(ENV_HOME, "/tmp/ku"), (ENV_SELECTOR, "sk --ansi  --reverse")]);
        assert_eq!(settings.selector, vec!["sk", "--ansi", "--reverse"]);
    }

    #[test]
    fn invalid_ttl_falls_back_with_warning() {
        let settings = settings(&[(ENV_HOME, "/tmp/ku"), (ENV_CACHE_TTL, "five minutes")]);
        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.warnings.len(), 1);
    }
}
