/*!
 * Structural and extraction stages.
 *
 * Agents often wrap the response in commentary. Leading text before the
 * `#TRANSLATED` header is tolerated in every mode; text after the terminator
 * is rejected in strict mode and ignored in lenient mode.
 */

use log::debug;

use crate::app_config::ValidationMode;
use crate::exchange::codec::{ENTRY_LINE_REGEX, FORMAT_VERSION, RESPONSE_TAG, TERMINATOR};
use crate::validation::error::{ValidationError, ValidationErrorKind};

const ENTRY_SHAPE_FIX: &str = "Each entry must be on its own line as '[id] translated text' (or '[id]' when empty)";

/// Response block cut out of the submitted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    /// Header line through terminator line
    pub text: String,
    /// 1-based line of the header in the submitted text
    pub first_line: usize,
}

impl ExtractedBlock {
    /// Translate a line number inside `text` back to the submitted text
    pub fn absolute_line(&self, relative: usize) -> usize {
        self.first_line + relative.saturating_sub(1)
    }
}

fn header_position(lines: &[&str]) -> Option<usize> {
    lines
        .iter()
        .position(|l| l.trim_start().starts_with(RESPONSE_TAG))
}

fn terminator_positions(lines: &[&str], after: usize) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .skip(after + 1)
        .filter(|(_, l)| l.trim() == TERMINATOR)
        .map(|(i, _)| i)
        .collect()
}

fn structural(message: impl Into<String>, index: usize) -> ValidationError {
    ValidationError::new(ValidationErrorKind::Structural, message).at_line(index + 1)
}

/// Stage 1: header tag and version, terminator placement, line shapes.
///
/// Missing landmarks are left to the extraction stage.
pub fn check_structure(text: &str, mode: ValidationMode) -> Result<(), ValidationError> {
    let lines: Vec<&str> = text.lines().collect();

    let Some(header) = header_position(&lines) else {
        return Ok(());
    };

    let versioned = format!("{}:{}:", RESPONSE_TAG, FORMAT_VERSION);
    let header_line = lines[header].trim();
    if !header_line.starts_with(&versioned) {
        return Err(structural(
            format!("Header '{}' does not start with '{}'", header_line, versioned),
            header,
        )
        .with_fix(format!("Start the response with '{}batch=<n>/<total>:count=<k>:status=ok'", versioned)));
    }

    let terminators = terminator_positions(&lines, header);
    let Some(&terminator) = terminators.first() else {
        return Ok(());
    };

    if mode == ValidationMode::Strict {
        if let Some(&second) = terminators.get(1) {
            return Err(structural("Terminator '---' appears more than once", second)
                .with_fix("End the response with a single '---' line"));
        }
        if let Some(trailing) = (terminator + 1..lines.len()).find(|&i| !lines[i].trim().is_empty()) {
            return Err(structural(
                format!("Unexpected content after terminator: '{}'", lines[trailing].trim()),
                trailing,
            )
            .with_fix("Nothing may follow the closing '---' line"));
        }
    }

    for (i, raw) in lines.iter().enumerate().take(terminator).skip(header + 1) {
        let line = raw.trim_start();
        if line.trim().is_empty() || line.starts_with('@') {
            continue;
        }
        if ENTRY_LINE_REGEX.is_match(line) {
            continue;
        }

        let message = if line.starts_with('[') && line.contains(']') && !line.contains("] ") {
            format!("Missing space after entry id: '{}'", line)
        } else if line.trim_start().starts_with(RESPONSE_TAG) {
            "Second header inside the response block".to_string()
        } else {
            format!("Line is not an entry: '{}'", line)
        };
        return Err(structural(message, i).with_fix(ENTRY_SHAPE_FIX));
    }

    debug!("Structure check passed ({} lines)", lines.len());
    Ok(())
}

/// Stage 2: locate the header/terminator block
pub fn extract(text: &str) -> Result<ExtractedBlock, ValidationError> {
    let lines: Vec<&str> = text.lines().collect();

    let header = header_position(&lines).ok_or_else(|| {
        ValidationError::new(
            ValidationErrorKind::Extraction,
            format!("No '{}' header found in response", RESPONSE_TAG),
        )
        .with_fix(format!(
            "Begin the translated block with '{}:{}:batch=<n>/<total>:count=<k>:status=ok'",
            RESPONSE_TAG, FORMAT_VERSION
        ))
    })?;

    let terminator = terminator_positions(&lines, header)
        .first()
        .copied()
        .ok_or_else(|| {
            ValidationError::new(ValidationErrorKind::Extraction, "No '---' terminator after the header")
                .at_line(header + 1)
                .with_fix("Close the translated block with a '---' line")
        })?;

    let mut block: Vec<&str> = Vec::with_capacity(terminator - header + 1);
    block.push(lines[header].trim());
    block.extend_from_slice(&lines[header + 1..=terminator]);

    debug!("Extracted response block at lines {}-{}", header + 1, terminator + 1);
    Ok(ExtractedBlock {
        text: block.join("\n"),
        first_line: header + 1,
    })
}
