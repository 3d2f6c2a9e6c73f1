/*!
 * Error types for the locbridge application.
 *
 * Lifecycle faults are typed so callers can tell them apart from validation
 * rejections, which are ordinary results rather than errors. Everything else
 * travels as `anyhow::Error` with context.
 */

use std::path::PathBuf;

use thiserror::Error;

/// Faults raised by session operations.
///
/// A fault never changes the persisted session state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The requested batch index is outside the plan
    #[error("Batch {index} not found (session has {total} batches)")]
    BatchNotFound { index: usize, total: usize },

    /// The batch was already accepted
    #[error("Batch {index} is already completed")]
    AlreadyCompleted { index: usize },

    /// The batch exhausted its attempts
    #[error("Batch {index} failed after {attempts} attempts and accepts no further work")]
    BatchFailed { index: usize, attempts: u32 },

    /// No state file exists at the given path
    #[error("Session not found: {0:?}")]
    SessionNotFound(PathBuf),

    /// The input file no longer matches the hash recorded at init
    #[error("Source file {path:?} changed since the session was created")]
    SourceChanged { path: PathBuf },

    /// An entry id cannot be carried through the exchange format
    #[error("Invalid entry id '{id}': {reason}")]
    InvalidEntryId { id: String, reason: String },

    /// No handler is registered for the file or name
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// Persisted or computed state violates a session invariant
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),
}

impl SessionError {
    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BatchNotFound { .. } => "batch_not_found",
            Self::AlreadyCompleted { .. } => "already_completed",
            Self::BatchFailed { .. } => "batch_failed",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SourceChanged { .. } => "source_changed",
            Self::InvalidEntryId { .. } => "invalid_entry_id",
            Self::UnknownFormat(_) => "unknown_format",
            Self::InternalConsistency(_) => "internal_consistency",
        }
    }
}

/// Name used for faults that are not `SessionError`
pub const GENERIC_ERROR_KIND: &str = "error";

/// Machine-readable kind of any error
pub fn error_kind(error: &anyhow::Error) -> &'static str {
    error
        .downcast_ref::<SessionError>()
        .map(SessionError::kind)
        .unwrap_or(GENERIC_ERROR_KIND)
}
