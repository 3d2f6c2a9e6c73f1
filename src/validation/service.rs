/*!
 * Validation pipeline for agent responses.
 *
 * Stages run in order and the first failing stage stops the pipeline:
 *
 * 1. structural: header tag/version, terminator placement, line shapes
 * 2. extraction: locate the header..terminator block
 * 3. decode: header fields, entry lines, duplicate ids
 * 4. content: batch identity, missing/extra ids, header count
 * 5. placeholders: warnings only, never rejects
 */

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::app_config::ValidationMode;
use crate::batcher::Batch;
use crate::exchange::codec::{self, CodecError, DecodedEntry, Header, ResponseHeader, STATUS_OK};

use super::content::check_content;
use super::error::{ValidationError, ValidationErrorKind};
use super::placeholders::PlaceholderChecker;
use super::structure::{ExtractedBlock, check_structure, extract};

/// Result of validating one candidate response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Response covers the batch exactly
    Accepted {
        translations: BTreeMap<String, String>,
        warnings: Vec<ValidationError>,
    },
    /// Response must be corrected and resubmitted
    Rejected { errors: Vec<ValidationError> },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    fn rejected(errors: Vec<ValidationError>) -> Self {
        Self::Rejected { errors }
    }
}

/// Stateless response validator
#[derive(Debug, Clone)]
pub struct Validator {
    mode: ValidationMode,
    placeholders: PlaceholderChecker,
}

impl Validator {
    pub fn new(mode: ValidationMode, placeholder_patterns: Vec<Regex>) -> Self {
        Self {
            mode,
            placeholders: PlaceholderChecker::new(placeholder_patterns),
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validate `candidate` against `batch`.
    ///
    /// `sources` maps entry ids to source text for the placeholder stage.
    pub fn validate(&self, candidate: &str, batch: &Batch, sources: &HashMap<&str, &str>) -> ValidationOutcome {
        if let Err(error) = check_structure(candidate, self.mode) {
            debug!("Batch {} rejected at structural stage: {}", batch.index, error);
            return ValidationOutcome::rejected(vec![error]);
        }

        let block = match extract(candidate) {
            Ok(block) => block,
            Err(error) => {
                debug!("Batch {} rejected at extraction stage: {}", batch.index, error);
                return ValidationOutcome::rejected(vec![error]);
            }
        };

        let (header, entries) = match decode_block(&block) {
            Ok(decoded) => decoded,
            Err(error) => {
                debug!("Batch {} rejected at decode stage: {}", batch.index, error);
                return ValidationOutcome::rejected(vec![error]);
            }
        };

        // Content lines are relative to the block; report them in candidate terms
        let errors: Vec<ValidationError> = check_content(&header, &entries, batch)
            .into_iter()
            .map(|mut error| {
                error.line = error.line.map(|line| block.absolute_line(line));
                error
            })
            .collect();
        if !errors.is_empty() {
            return ValidationOutcome::rejected(errors);
        }

        let translations: BTreeMap<String, String> = entries.into_iter().map(|e| (e.id, e.text)).collect();
        let warnings = self.placeholders.check(sources, &translations);

        debug!(
            "Batch {} accepted with {} entries and {} warnings",
            batch.index,
            translations.len(),
            warnings.len()
        );
        ValidationOutcome::Accepted { translations, warnings }
    }
}

fn decode_error(block: &ExtractedBlock, line: usize, message: impl Into<String>) -> ValidationError {
    ValidationError::new(ValidationErrorKind::Decode, message).at_line(block.absolute_line(line))
}

/// Stage 3: decode the extracted block into a response header and entries
fn decode_block(block: &ExtractedBlock) -> Result<(ResponseHeader, Vec<DecodedEntry>), ValidationError> {
    let document = codec::decode(&block.text).map_err(|e| match e {
        CodecError::Decode { line, message } => decode_error(block, line, message)
            .with_fix("Use '#TRANSLATED:v1:batch=<n>/<total>:count=<k>:status=ok' followed by '[id] text' lines"),
        other => decode_error(block, 1, other.to_string()),
    })?;

    let header = match document.header {
        Header::Response(header) => header,
        Header::Request(_) => {
            return Err(decode_error(block, 1, "Found a request header where a response header was expected")
                .with_fix("Reply with '#TRANSLATED:...', not the '#TRANSLATE:...' request header"));
        }
    };

    if header.status != STATUS_OK {
        return Err(decode_error(
            block,
            1,
            format!("Header status is '{}', expected '{}'", header.status, STATUS_OK),
        ));
    }

    let mut seen = HashSet::new();
    for entry in &document.entries {
        if !seen.insert(entry.id.as_str()) {
            return Err(decode_error(block, entry.line, format!("Duplicate entry id '{}'", entry.id))
                .with_fix("Each id may appear only once")
                .with_ids(vec![entry.id.clone()]));
        }
    }

    Ok((header, document.entries))
}
