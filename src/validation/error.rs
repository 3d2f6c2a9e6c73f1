/*!
 * Validation error values.
 *
 * These are data, not Rust errors: a rejected response is an expected
 * outcome reported back to the agent so it can correct and resubmit.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    /// Malformed header, misplaced terminator or a line of the wrong shape
    Structural,
    /// No header/terminator block could be located
    Extraction,
    /// Block located but its header or lines could not be decoded
    Decode,
    /// Header count disagrees with the decoded entries
    EntryCountMismatch,
    /// Expected ids absent from the response
    MissingEntries,
    /// Response ids not part of the batch
    ExtraEntries,
    /// Header names a different batch
    BatchMismatch,
    /// Placeholders differ between source and translation (non-fatal)
    PlaceholderWarning,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "STRUCTURAL",
            Self::Extraction => "EXTRACTION",
            Self::Decode => "DECODE",
            Self::EntryCountMismatch => "ENTRY_COUNT_MISMATCH",
            Self::MissingEntries => "MISSING_ENTRIES",
            Self::ExtraEntries => "EXTRA_ENTRIES",
            Self::BatchMismatch => "BATCH_MISMATCH",
            Self::PlaceholderWarning => "PLACEHOLDER_WARNING",
        }
    }

    /// Whether findings of this kind reject the response
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PlaceholderWarning)
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,

    pub message: String,

    /// 1-based line in the submitted text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Suggested correction for the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,

    /// Entry ids the finding is about
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            fix: None,
            ids: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = ids;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.kind, line, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
