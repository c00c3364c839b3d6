use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::state::{RECORD_VERSION, SessionState};
use crate::traits::StateStore;

pub const SESSION_FILE_NAME: &str = "session.json";

/// The session record as a JSON file, replaced atomically on every write.
///
/// A write serializes the full record into a temporary file next to the target, syncs it
/// and renames it over the old record, so a reader sees either the previous or the new
/// record and never a mix. Concurrent writers are last-writer-wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(SESSION_FILE_NAME),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform data directory for kukuruku (e.g. `~/.local/share/kukuruku`).
    pub fn default_dir() -> Result<PathBuf, StoreError> {
        ProjectDirs::from("", "", "kukuruku")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(StoreError::NoStateDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<SessionState> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("unable to read session record {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("ignoring corrupted session record {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn write(&self, state: &SessionState) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;

        let bytes = serde_json::to_vec_pretty(state)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::debug!("wrote session record {:?}", self.path);
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self) -> SessionState {
        self.read().unwrap_or_default()
    }

    fn update(&self, apply: &mut dyn FnMut(&mut SessionState)) -> Result<SessionState, StoreError> {
        let mut state = self.get();
        apply(&mut state);
        state.version = RECORD_VERSION;
        self.write(&state)?;
        Ok(state)
    }
}
