/*!
 * Session lifecycle.
 *
 * This module handles:
 * - Creating a session: parse, plan, persist
 * - Handing out batch requests
 * - Validating and recording submissions with bounded retries
 * - Progress reporting and final reconstruction
 *
 * Every mutation is applied to a copy of the state, persisted atomically
 * and only then adopted, so a failed write or a fault leaves both the file
 * and the in-memory state untouched.
 */

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::app_config::{Config, EstimatorKind};
use crate::batcher::{self, CharRatioEstimator, PlanOptions, TokenEstimator};
use crate::entry::Entry;
use crate::errors::SessionError;
use crate::exchange::codec;
use crate::file_utils::FileManager;
use crate::formats::{FormatHandler, FormatRegistry, ReconstructOptions};
use crate::language_utils::LanguagePair;
use crate::validation::{ValidationError, ValidationOutcome, Validator};

use super::models::{BatchCounts, BatchRecord, BatchStatus, STATE_VERSION, SessionSettings, SessionState};
use super::store::SessionStore;

/// Parameters for creating a new session
#[derive(Debug, Clone)]
pub struct SessionCreateParams {
    /// Path to the source file
    pub input_path: PathBuf,
    /// Where `finalize` writes; defaults to `<tgt>_<stem>.<ext>` next to the input
    pub output_path: Option<PathBuf>,
    /// Format name; detected from the file when absent
    pub format: Option<String>,
    pub languages: LanguagePair,
    /// Batching and validation settings to freeze into the session
    pub config: Config,
}

impl SessionCreateParams {
    pub fn new(input_path: impl Into<PathBuf>, languages: LanguagePair, config: Config) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: None,
            format: None,
            languages,
            config,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Text handed to the agent for one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub batch: usize,
    pub total_batches: usize,
    pub batch_status: BatchStatus,
    pub retry_count: u32,
    /// True when the batch was already accepted; the text is informational
    pub already_completed: bool,
    pub entries: usize,
    pub estimated_tokens: usize,
    #[serde(skip)]
    pub text: String,
}

/// Overall progress numbers
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Progress {
    pub completed_batches: usize,
    pub total_batches: usize,
    pub completed_entries: usize,
    pub total_entries: usize,
    pub percent_complete: f64,
}

/// Result of a submission
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum SubmitOutcome {
    #[serde(rename = "ok")]
    Accepted {
        batch: usize,
        batch_status: BatchStatus,
        entries_translated: usize,
        warnings: Vec<ValidationError>,
        next_batch: Option<usize>,
        progress: Progress,
    },
    #[serde(rename = "rejected")]
    Rejected {
        batch: usize,
        attempt: u32,
        max_attempts: u32,
        batch_status: BatchStatus,
        validation_errors: Vec<ValidationError>,
    },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Suggested next step for the agent
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextAction {
    RequestBatch { batch: usize },
    Finalize,
}

/// Per-batch line of a status report
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch: usize,
    pub status: BatchStatus,
    pub entries: usize,
    pub retry_count: u32,
}

/// Result of `status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub format: String,
    pub source_language: String,
    pub target_language: String,
    pub total_entries: usize,
    pub completed_entries: usize,
    pub percent_complete: f64,
    pub total_batches: usize,
    pub batches: BatchCounts,
    pub remaining_batches: Vec<usize>,
    pub next_action: NextAction,
    pub batch_status: Vec<BatchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<String>,
}

/// Result of `finalize`
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeReport {
    pub output_path: PathBuf,
    pub total_entries: usize,
    pub translated_entries: usize,
    pub fallback_entries: usize,
    pub fallback_ids: Vec<String>,
    pub incomplete_batches: Vec<usize>,
}

/// A loaded session bound to its input file and format handler
pub struct Session {
    state: SessionState,
    state_path: PathBuf,
    source: String,
    entries: Vec<Entry>,
    handler: Arc<dyn FormatHandler>,
    validator: Validator,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Reject ids that are empty, duplicated or would break an exchange line
fn validate_entry_ids(entries: &[Entry]) -> Result<(), SessionError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !entry.has_exchange_safe_id() {
            return Err(SessionError::InvalidEntryId {
                id: entry.id.clone(),
                reason: "ids must be non-empty and may not contain '[', ']' or line breaks".to_string(),
            });
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(SessionError::InvalidEntryId {
                id: entry.id.clone(),
                reason: "id appears more than once".to_string(),
            });
        }
    }
    Ok(())
}

impl Session {
    /// Create and persist a new session using the configured estimator
    pub fn create(params: SessionCreateParams, registry: &FormatRegistry) -> Result<Self> {
        let chars = CharRatioEstimator::default();
        let estimator: Option<&dyn TokenEstimator> = match params.config.batching.estimator {
            EstimatorKind::Chars => Some(&chars),
            EstimatorKind::None => None,
        };
        Self::create_with_estimator(params, registry, estimator)
    }

    /// Create and persist a new session with an explicit token estimator
    pub fn create_with_estimator(
        params: SessionCreateParams,
        registry: &FormatRegistry,
        estimator: Option<&dyn TokenEstimator>,
    ) -> Result<Self> {
        params.config.validate().context("Configuration validation failed")?;

        let input_path = std::fs::canonicalize(&params.input_path)
            .with_context(|| format!("Input file not found: {:?}", params.input_path))?;
        let source = FileManager::read_to_string(&input_path)?;

        let handler = match &params.format {
            Some(name) => registry.get(name)?,
            None => registry.detect(&input_path, &source)?,
        };

        let entries = handler
            .parse(&source)
            .with_context(|| format!("Failed to parse {:?} as {}", input_path, handler.name()))?;
        if entries.is_empty() {
            return Err(anyhow!("No translatable entries found in {:?}", input_path));
        }
        validate_entry_ids(&entries)?;

        let batching = &params.config.batching;
        let batches = batcher::plan(
            &entries,
            PlanOptions {
                target_tokens: batching.target_tokens,
                context_window: batching.context_window,
                supports_context: handler.supports_context(),
                fallback_batch_size: batching.fallback_batch_size,
                estimator,
            },
        );

        let source_hash = FileManager::sha256_hex(&source);
        let uuid = Uuid::new_v4().simple().to_string();
        let session_id = format!("{}-{}", &uuid[..4], &source_hash[..8]);

        let output_path = match &params.output_path {
            Some(path) => std::path::absolute(path)
                .with_context(|| format!("Invalid output path: {:?}", path))?,
            None => FileManager::generate_output_path(&input_path, &params.languages.target),
        };

        let created_at = now();
        let state = SessionState {
            version: STATE_VERSION,
            session_id: session_id.clone(),
            input_path: input_path.clone(),
            output_path,
            format: handler.name().to_string(),
            source_language: params.languages.source.clone(),
            target_language: params.languages.target.clone(),
            source_hash,
            settings: SessionSettings {
                target_tokens: batching.target_tokens,
                context_window: batching.context_window,
                fallback_batch_size: batching.fallback_batch_size,
                estimator: batching.estimator,
                max_attempts: params.config.validation.max_attempts,
                validation_mode: params.config.validation.mode,
            },
            total_entries: entries.len(),
            batches: batches.into_iter().map(BatchRecord::new).collect(),
            translations: BTreeMap::new(),
            created_at: created_at.clone(),
            updated_at: created_at,
            finalized_at: None,
        };

        let state_path = FileManager::state_file_path(&input_path, &session_id);
        SessionStore::save(&state_path, &state)?;

        info!(
            "Created session {} for {:?}: {} entries in {} batches ({})",
            session_id,
            input_path,
            state.total_entries,
            state.total_batches(),
            state.languages()
        );

        let validator = Validator::new(state.settings.validation_mode, handler.placeholder_patterns());
        Ok(Self {
            state,
            state_path,
            source,
            entries,
            handler,
            validator,
        })
    }

    /// Load a session and verify it against its input file
    pub fn load<P: AsRef<Path>>(state_path: P, registry: &FormatRegistry) -> Result<Self> {
        let state_path = state_path.as_ref().to_path_buf();
        let state = SessionStore::load(&state_path)?;
        let handler = registry.get(&state.format)?;

        let source = FileManager::read_to_string(&state.input_path)
            .with_context(|| format!("Cannot read input of session {}", state.session_id))?;
        if FileManager::sha256_hex(&source) != state.source_hash {
            return Err(SessionError::SourceChanged {
                path: state.input_path.clone(),
            }
            .into());
        }

        let entries = handler
            .parse(&source)
            .with_context(|| format!("Failed to parse {:?} as {}", state.input_path, handler.name()))?;
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        if let Err(e) = state.check_invariants(&ids) {
            error!("Session {} is inconsistent: {}", state.session_id, e);
            return Err(e.into());
        }

        debug!(
            "Loaded session {} ({} batches, {}% complete)",
            state.session_id,
            state.total_batches(),
            state.percent_complete()
        );

        let validator = Validator::new(state.settings.validation_mode, handler.placeholder_patterns());
        Ok(Self {
            state,
            state_path,
            source,
            entries,
            handler,
            validator,
        })
    }

    /// Resume the most recently updated session for the same input file
    /// and language pair, or create a new one when there is none or
    /// `fresh` is set.
    ///
    /// Returns the session and whether it was created.
    pub fn resume_or_create(
        params: SessionCreateParams,
        registry: &FormatRegistry,
        fresh: bool,
    ) -> Result<(Self, bool)> {
        if !fresh {
            let input_path = std::fs::canonicalize(&params.input_path)
                .with_context(|| format!("Input file not found: {:?}", params.input_path))?;
            let dir = input_path.parent().unwrap_or_else(|| Path::new("."));
            let languages = params.languages.to_string();

            let latest = SessionStore::list(dir, false)?
                .into_iter()
                .filter(|s| s.input_path == input_path && s.languages == languages)
                .max_by_key(|s| DateTime::parse_from_rfc3339(&s.updated_at).ok());
            if let Some(summary) = latest {
                info!("Resuming session {} from {:?}", summary.session_id, summary.state_path);
                return Ok((Self::load(&summary.state_path, registry)?, false));
            }
        }

        Ok((Self::create(params, registry)?, true))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn handler(&self) -> &Arc<dyn FormatHandler> {
        &self.handler
    }

    fn commit(&mut self, mut next: SessionState) -> Result<()> {
        next.updated_at = now();
        SessionStore::save(&self.state_path, &next)?;
        self.state = next;
        Ok(())
    }

    fn render(&self, record: &BatchRecord) -> Result<String> {
        let by_id: HashMap<&str, &Entry> = self.entries.iter().map(|e| (e.id.as_str(), e)).collect();
        codec::encode(&record.batch, &by_id, &self.state.languages())
            .map_err(|e| SessionError::InternalConsistency(e.to_string()).into())
    }

    fn progress(state: &SessionState) -> Progress {
        Progress {
            completed_batches: state.counts().completed,
            total_batches: state.total_batches(),
            completed_entries: state.completed_entries(),
            total_entries: state.total_entries,
            percent_complete: state.percent_complete(),
        }
    }

    /// Exchange text for batch `index`.
    ///
    /// The first request moves a pending batch to in progress. Repeated
    /// requests return identical text. A completed batch is re-rendered
    /// read-only with `already_completed` set.
    pub fn request_batch(&mut self, index: usize) -> Result<BatchRequest> {
        let record = self.state.batch(index)?.clone();

        if record.status == BatchStatus::Failed {
            return Err(SessionError::BatchFailed {
                index,
                attempts: record.retry_count,
            }
            .into());
        }

        let text = self.render(&record)?;

        if record.status == BatchStatus::Pending {
            let mut next = self.state.clone();
            next.batch_mut(index)?.status = BatchStatus::InProgress;
            self.commit(next)?;
            info!("Batch {}/{} requested", index, record.batch.total_batches);
        } else {
            debug!("Batch {} re-requested while {}", index, record.status);
        }

        Ok(BatchRequest {
            batch: index,
            total_batches: record.batch.total_batches,
            batch_status: self.state.batch(index)?.status,
            retry_count: record.retry_count,
            already_completed: record.status == BatchStatus::Completed,
            entries: record.batch.entry_ids.len(),
            estimated_tokens: record.batch.estimated_tokens,
            text,
        })
    }

    /// Validate `candidate` as the response for batch `index` and record
    /// the outcome.
    ///
    /// Rejections are returned as `Ok(SubmitOutcome::Rejected)`; lifecycle
    /// faults are errors and leave the state untouched.
    pub fn submit_batch(&mut self, index: usize, candidate: &str) -> Result<SubmitOutcome> {
        let record = self.state.batch(index)?.clone();
        match record.status {
            BatchStatus::Completed => return Err(SessionError::AlreadyCompleted { index }.into()),
            BatchStatus::Failed => {
                return Err(SessionError::BatchFailed {
                    index,
                    attempts: record.retry_count,
                }
                .into());
            }
            BatchStatus::Pending | BatchStatus::InProgress => {}
        }

        let expected: HashSet<&str> = record.batch.entry_ids.iter().map(String::as_str).collect();
        let sources: HashMap<&str, &str> = self
            .entries
            .iter()
            .filter(|e| expected.contains(e.id.as_str()))
            .map(|e| (e.id.as_str(), e.text.as_str()))
            .collect();

        let max_attempts = self.state.settings.max_attempts;
        let mut next = self.state.clone();

        match self.validator.validate(candidate, &record.batch, &sources) {
            ValidationOutcome::Accepted { translations, warnings } => {
                let returned: HashSet<&str> = translations.keys().map(String::as_str).collect();
                if returned != expected {
                    error!("Batch {} accepted with a mismatched id set", index);
                    return Err(SessionError::InternalConsistency(format!(
                        "accepted response for batch {} does not cover its ids",
                        index
                    ))
                    .into());
                }
                if let Some(id) = translations.keys().find(|id| next.translations.contains_key(*id)) {
                    error!("Entry {} of batch {} is already translated", id, index);
                    return Err(SessionError::InternalConsistency(format!(
                        "entry '{}' of batch {} already has a translation",
                        id, index
                    ))
                    .into());
                }

                let entries_translated = translations.len();
                next.translations.extend(translations);
                let batch = next.batch_mut(index)?;
                batch.status = BatchStatus::Completed;
                batch.last_errors.clear();
                batch.last_warnings = warnings.clone();
                batch.completed_at = Some(now());

                self.commit(next)?;
                info!(
                    "Batch {}/{} accepted ({} entries, {} warnings)",
                    index,
                    record.batch.total_batches,
                    entries_translated,
                    warnings.len()
                );

                Ok(SubmitOutcome::Accepted {
                    batch: index,
                    batch_status: BatchStatus::Completed,
                    entries_translated,
                    warnings,
                    next_batch: self.state.next_batch(),
                    progress: Self::progress(&self.state),
                })
            }
            ValidationOutcome::Rejected { errors } => {
                let batch = next.batch_mut(index)?;
                batch.retry_count += 1;
                batch.status = if batch.retry_count >= max_attempts {
                    BatchStatus::Failed
                } else {
                    BatchStatus::InProgress
                };
                batch.last_errors = errors.clone();
                let (attempt, batch_status) = (batch.retry_count, batch.status);

                self.commit(next)?;
                if batch_status == BatchStatus::Failed {
                    warn!("Batch {} failed after {} attempts", index, attempt);
                } else {
                    info!(
                        "Batch {} rejected (attempt {}/{}): {}",
                        index,
                        attempt,
                        max_attempts,
                        errors.iter().map(|e| e.kind.as_str()).collect::<Vec<_>>().join(", ")
                    );
                }

                Ok(SubmitOutcome::Rejected {
                    batch: index,
                    attempt,
                    max_attempts,
                    batch_status,
                    validation_errors: errors,
                })
            }
        }
    }

    /// Progress summary; never mutates
    pub fn status(&self) -> StatusReport {
        let state = &self.state;
        let next_action = match state.next_batch() {
            Some(batch) => NextAction::RequestBatch { batch },
            None => NextAction::Finalize,
        };

        StatusReport {
            session_id: state.session_id.clone(),
            input_path: state.input_path.clone(),
            output_path: state.output_path.clone(),
            format: state.format.clone(),
            source_language: state.source_language.clone(),
            target_language: state.target_language.clone(),
            total_entries: state.total_entries,
            completed_entries: state.completed_entries(),
            percent_complete: state.percent_complete(),
            total_batches: state.total_batches(),
            batches: state.counts(),
            remaining_batches: state.remaining_batches(),
            next_action,
            batch_status: state
                .batches
                .iter()
                .map(|r| BatchSummary {
                    batch: r.index(),
                    status: r.status,
                    entries: r.batch.entry_ids.len(),
                    retry_count: r.retry_count,
                })
                .collect(),
            finalized_at: state.finalized_at.clone(),
        }
    }

    /// Write the output file.
    ///
    /// Entries without an accepted translation keep their source text; the
    /// report lists them. Never fails because batches are incomplete.
    pub fn finalize(&mut self) -> Result<FinalizeReport> {
        let mut merged = self.state.translations.clone();
        let mut fallback_ids = Vec::new();
        for entry in &self.entries {
            if !merged.contains_key(&entry.id) {
                merged.insert(entry.id.clone(), entry.text.clone());
                fallback_ids.push(entry.id.clone());
            }
        }

        let incomplete_batches: Vec<usize> = self
            .state
            .batches
            .iter()
            .filter(|r| r.status != BatchStatus::Completed)
            .map(BatchRecord::index)
            .collect();

        let options = ReconstructOptions {
            target_language: &self.state.target_language,
            source: &self.source,
        };
        let output = self
            .handler
            .reconstruct(&self.entries, &merged, &options)
            .context("Failed to rebuild output document")?;

        let output_path = self.state.output_path.clone();
        FileManager::write_atomic(&output_path, &output)?;

        if !fallback_ids.is_empty() {
            warn!(
                "{} entries from batches {:?} kept their source text",
                fallback_ids.len(),
                incomplete_batches
            );
        }

        let mut next = self.state.clone();
        next.finalized_at = Some(now());
        self.commit(next)?;
        info!("Session {} finalized to {:?}", self.state.session_id, output_path);

        Ok(FinalizeReport {
            output_path,
            total_entries: self.entries.len(),
            translated_entries: self.entries.len() - fallback_ids.len(),
            fallback_entries: fallback_ids.len(),
            fallback_ids,
            incomplete_batches,
        })
    }
}
