/*!
 * Validation of agent responses.
 *
 * # Architecture
 *
 * - `error`: finding kinds and values
 * - `structure`: structural and extraction stages
 * - `content`: id coverage and batch identity
 * - `placeholders`: placeholder preservation warnings
 * - `service`: the staged pipeline
 */

pub mod content;
pub mod error;
pub mod placeholders;
pub mod service;
pub mod structure;

// Re-export main types
pub use error::{ValidationError, ValidationErrorKind};
pub use service::{ValidationOutcome, Validator};
