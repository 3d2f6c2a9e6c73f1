/*!
 * State file persistence.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::errors::SessionError;
use crate::file_utils::FileManager;

use super::models::SessionState;

/// One-line summary of a state file, for listings
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub state_path: PathBuf,
    pub session_id: String,
    pub input_path: PathBuf,
    pub format: String,
    pub languages: String,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub percent_complete: f64,
    pub finalized: bool,
    pub updated_at: String,
}

impl SessionSummary {
    fn from_state(state_path: PathBuf, state: &SessionState) -> Self {
        let counts = state.counts();
        Self {
            state_path,
            session_id: state.session_id.clone(),
            input_path: state.input_path.clone(),
            format: state.format.clone(),
            languages: state.languages().to_string(),
            total_batches: state.total_batches(),
            completed_batches: counts.completed,
            failed_batches: counts.failed,
            percent_complete: state.percent_complete(),
            finalized: state.finalized_at.is_some(),
            updated_at: state.updated_at.clone(),
        }
    }
}

/// Reads and writes session state files
pub struct SessionStore;

impl SessionStore {
    /// Load a state file without checking it against the input
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SessionState> {
        let path = path.as_ref();
        if !FileManager::file_exists(path) {
            return Err(SessionError::SessionNotFound(path.to_path_buf()).into());
        }

        let content = FileManager::read_to_string(path)?;
        let state: SessionState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session state: {:?}", path))?;

        debug!("Loaded session {} from {:?}", state.session_id, path);
        Ok(state)
    }

    /// Persist atomically, replacing any previous state
    pub fn save<P: AsRef<Path>>(path: P, state: &SessionState) -> Result<()> {
        let path = path.as_ref();
        let mut json = serde_json::to_string_pretty(state).context("Failed to serialize session state")?;
        json.push('\n');
        FileManager::write_atomic(path, &json)
            .with_context(|| format!("Failed to save session state: {:?}", path))?;
        debug!("Saved session {} to {:?}", state.session_id, path);
        Ok(())
    }

    /// Summaries of all state files under `dir`; unreadable files are skipped
    pub fn list<P: AsRef<Path>>(dir: P, recursive: bool) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for path in FileManager::find_state_files(dir, recursive)? {
            match Self::load(&path) {
                Ok(state) => summaries.push(SessionSummary::from_state(path, &state)),
                Err(e) => warn!("Skipping unreadable session file {:?}: {:#}", path, e),
            }
        }
        Ok(summaries)
    }
}
