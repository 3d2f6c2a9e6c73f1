/*!
 * Content stage: the decoded response must cover exactly the batch's ids.
 */

use std::collections::HashSet;

use log::debug;

use crate::batcher::Batch;
use crate::exchange::codec::{DecodedEntry, ResponseHeader};
use crate::validation::error::{ValidationError, ValidationErrorKind};

/// Compare a decoded response with the batch it answers.
///
/// Every failing check is reported so one retry can fix them all.
/// `ENTRY_COUNT_MISMATCH` is only raised when the id sets agree but the
/// header count does not, since missing or extra ids already explain a
/// count difference.
pub fn check_content(header: &ResponseHeader, entries: &[DecodedEntry], batch: &Batch) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if header.batch_index != batch.index || header.total_batches != batch.total_batches {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::BatchMismatch,
                format!(
                    "Header names batch {}/{} but this is batch {}/{}",
                    header.batch_index, header.total_batches, batch.index, batch.total_batches
                ),
            )
            .at_line(1)
            .with_fix(format!(
                "Use 'batch={}/{}' in the header",
                batch.index, batch.total_batches
            )),
        );
    }

    let expected: HashSet<&str> = batch.entry_ids.iter().map(String::as_str).collect();
    let actual: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();

    let missing: Vec<String> = batch
        .entry_ids
        .iter()
        .filter(|id| !actual.contains(id.as_str()))
        .cloned()
        .collect();
    let extra: Vec<String> = entries
        .iter()
        .filter(|e| !expected.contains(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();

    if !missing.is_empty() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::MissingEntries,
                format!("Missing {} entries: {}", missing.len(), missing.join(", ")),
            )
            .with_fix("Translate every entry listed under @translate, keeping its id")
            .with_ids(missing.clone()),
        );
    }

    if !extra.is_empty() {
        let line = entries
            .iter()
            .find(|e| !expected.contains(e.id.as_str()))
            .map(|e| e.line);
        let mut error = ValidationError::new(
            ValidationErrorKind::ExtraEntries,
            format!("Unexpected entries: {}", extra.join(", ")),
        )
        .with_fix("Return only the entries listed under @translate; do not include context entries")
        .with_ids(extra.clone());
        error.line = line;
        errors.push(error);
    }

    if missing.is_empty() && extra.is_empty() && header.count != entries.len() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::EntryCountMismatch,
                format!("Header count is {} but {} entries were returned", header.count, entries.len()),
            )
            .at_line(1)
            .with_fix(format!("Set 'count={}' in the header", entries.len())),
        );
    }

    debug!(
        "Content check for batch {}: {} expected, {} returned, {} errors",
        batch.index,
        expected.len(),
        entries.len(),
        errors.len()
    );
    errors
}
