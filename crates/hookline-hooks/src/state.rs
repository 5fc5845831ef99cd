use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StateError;

const STATE_DIR_NAME: &str = ".hookline";
const STATE_FILE_NAME: &str = "state.json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What the session is currently doing, as last recorded by a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default)]
    pub active_agents: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Owns one state file. Writes go to a sibling temp file that is renamed
/// over the target, so concurrent writers never leave a torn file; the last
/// rename wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_workspace(cwd: &Path) -> Self {
        Self::new(cwd.join(STATE_DIR_NAME).join(STATE_FILE_NAME))
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SessionState, StateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(SessionState::default());
            }
            Err(source) => return Err(self.io_error(source)),
        };
        if raw.trim().is_empty() {
            return Ok(SessionState::default());
        }
        serde_json::from_str(&raw).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, state: &SessionState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })?;

        let temp_path = self.temp_path();
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()
        });
        if let Err(source) = written.and_then(|()| fs::rename(&temp_path, &self.path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.io_error(source));
        }
        Ok(())
    }

    /// Load, mutate, stamp and save. A file that no longer parses is
    /// replaced by a fresh state instead of blocking every later update.
    pub fn update<F>(&self, mutate: F) -> Result<SessionState, StateError>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = match self.load() {
            Ok(state) => state,
            Err(error @ StateError::Json { .. }) => {
                warn!(error = %error, "replacing unreadable session state");
                SessionState::default()
            }
            Err(error) => return Err(error),
        };
        mutate(&mut state);
        state.updated_at = Some(Utc::now());
        self.save(&state)?;
        Ok(state)
    }

    /// Removes the state file. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(STATE_FILE_NAME);
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path.with_file_name(format!(
            ".{file_name}.{}.{counter}.tmp",
            std::process::id()
        ))
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
