/*!
 * Session management for batch translation.
 *
 * This module provides:
 * - The persisted state model (`models`)
 * - Atomic state-file storage (`store`)
 * - Lifecycle operations: create, request, submit, status, finalize (`manager`)
 */

pub mod manager;
pub mod models;
pub mod store;

// Re-export main types
pub use manager::{
    BatchRequest, FinalizeReport, NextAction, Progress, Session, SessionCreateParams, StatusReport, SubmitOutcome,
};
pub use models::{BatchCounts, BatchRecord, BatchStatus, SessionSettings, SessionState};
pub use store::{SessionStore, SessionSummary};
