/*!
 * Persisted session state.
 *
 * One `SessionState` is serialised to `.loc-<id>.json` next to the input
 * file and reloaded by every command.
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use crate::app_config::{EstimatorKind, ValidationMode};
use crate::batcher::Batch;
use crate::errors::SessionError;
use crate::language_utils::LanguagePair;
use crate::validation::ValidationError;

/// Layout version of the state file
pub const STATE_VERSION: u32 = 1;

/// Lifecycle of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    /// Completed and failed batches accept no further work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planned batch plus its progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    #[serde(flatten)]
    pub batch: Batch,

    pub status: BatchStatus,

    /// Rejected submissions so far
    #[serde(default)]
    pub retry_count: u32,

    /// Errors of the most recent rejection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_errors: Vec<ValidationError>,

    /// Placeholder warnings recorded at acceptance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_warnings: Vec<ValidationError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl BatchRecord {
    pub fn new(batch: Batch) -> Self {
        Self {
            batch,
            status: BatchStatus::Pending,
            retry_count: 0,
            last_errors: Vec::new(),
            last_warnings: Vec::new(),
            completed_at: None,
        }
    }

    pub fn index(&self) -> usize {
        self.batch.index
    }
}

/// Settings frozen into the session at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub target_tokens: usize,
    pub context_window: usize,
    pub fallback_batch_size: usize,
    pub estimator: EstimatorKind,
    pub max_attempts: u32,
    pub validation_mode: ValidationMode,
}

/// Number of batches in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Full persisted state of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    pub session_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub format: String,
    pub source_language: String,
    pub target_language: String,
    /// sha256 of the input content at creation
    pub source_hash: String,
    pub settings: SessionSettings,
    pub total_entries: usize,
    pub batches: Vec<BatchRecord>,
    /// Accepted translations, exactly the ids of completed batches
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<String>,
}

impl SessionState {
    pub fn languages(&self) -> LanguagePair {
        LanguagePair::new(&self.source_language, &self.target_language)
    }

    pub fn total_batches(&self) -> usize {
        self.batches.len()
    }

    /// Batch by 1-based index
    pub fn batch(&self, index: usize) -> Result<&BatchRecord, SessionError> {
        index
            .checked_sub(1)
            .and_then(|i| self.batches.get(i))
            .ok_or(SessionError::BatchNotFound {
                index,
                total: self.batches.len(),
            })
    }

    /// Mutable batch by 1-based index
    pub fn batch_mut(&mut self, index: usize) -> Result<&mut BatchRecord, SessionError> {
        let total = self.batches.len();
        index
            .checked_sub(1)
            .and_then(|i| self.batches.get_mut(i))
            .ok_or(SessionError::BatchNotFound { index, total })
    }

    pub fn counts(&self) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for record in &self.batches {
            match record.status {
                BatchStatus::Pending => counts.pending += 1,
                BatchStatus::InProgress => counts.in_progress += 1,
                BatchStatus::Completed => counts.completed += 1,
                BatchStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Entries belonging to completed batches
    pub fn completed_entries(&self) -> usize {
        self.batches
            .iter()
            .filter(|r| r.status == BatchStatus::Completed)
            .map(|r| r.batch.entry_ids.len())
            .sum()
    }

    /// Completed entries over total entries, in percent with one decimal
    pub fn percent_complete(&self) -> f64 {
        if self.total_entries == 0 {
            return 100.0;
        }
        let percent = self.completed_entries() as f64 * 100.0 / self.total_entries as f64;
        (percent * 10.0).round() / 10.0
    }

    /// Indices of batches that can still make progress
    pub fn remaining_batches(&self) -> Vec<usize> {
        self.batches
            .iter()
            .filter(|r| !r.status.is_terminal())
            .map(BatchRecord::index)
            .collect()
    }

    /// First batch to work on: an in-progress batch before any pending one
    pub fn next_batch(&self) -> Option<usize> {
        self.batches
            .iter()
            .find(|r| r.status == BatchStatus::InProgress)
            .or_else(|| self.batches.iter().find(|r| r.status == BatchStatus::Pending))
            .map(BatchRecord::index)
    }

    /// Whether every batch reached a terminal status
    pub fn is_finished(&self) -> bool {
        self.batches.iter().all(|r| r.status.is_terminal())
    }

    /// Verify the persisted invariants against the entry ids of the input.
    pub fn check_invariants(&self, entry_ids: &[String]) -> Result<(), SessionError> {
        let fail = |message: String| Err(SessionError::InternalConsistency(message));

        if self.version != STATE_VERSION {
            return fail(format!("unsupported state version {}", self.version));
        }
        if self.total_entries != entry_ids.len() {
            return fail(format!(
                "state records {} entries but the input has {}",
                self.total_entries,
                entry_ids.len()
            ));
        }

        let total = self.batches.len();
        for (i, record) in self.batches.iter().enumerate() {
            if record.batch.index != i + 1 || record.batch.total_batches != total {
                return fail(format!(
                    "batch at position {} is labelled {}/{}",
                    i + 1,
                    record.batch.index,
                    record.batch.total_batches
                ));
            }
            if record.retry_count > self.settings.max_attempts {
                return fail(format!(
                    "batch {} has {} attempts, above the ceiling of {}",
                    record.batch.index, record.retry_count, self.settings.max_attempts
                ));
            }
            let exhausted = record.retry_count >= self.settings.max_attempts;
            if (record.status == BatchStatus::Failed) != exhausted && record.status != BatchStatus::Completed {
                return fail(format!(
                    "batch {} is {} with {} attempts",
                    record.batch.index, record.status, record.retry_count
                ));
            }
        }

        let planned: Vec<&String> = self.batches.iter().flat_map(|r| &r.batch.entry_ids).collect();
        if planned.len() != entry_ids.len() || planned.iter().zip(entry_ids).any(|(a, b)| *a != b) {
            return fail("batch plan does not partition the input entries in order".to_string());
        }

        let completed: HashSet<&str> = self
            .batches
            .iter()
            .filter(|r| r.status == BatchStatus::Completed)
            .flat_map(|r| r.batch.entry_ids.iter().map(String::as_str))
            .collect();
        let translated: HashSet<&str> = self.translations.keys().map(String::as_str).collect();
        if completed != translated {
            return fail(format!(
                "{} translations recorded for {} entries of completed batches",
                translated.len(),
                completed.len()
            ));
        }

        Ok(())
    }
}
