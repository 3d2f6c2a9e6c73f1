/*!
 * Line-oriented exchange format.
 *
 * Request (what the agent receives):
 *
 * ```text
 * #TRANSLATE:v1:en>fr:batch=2/7:entries=3:ctx=2
 * @context_before
 * [4] Previous line
 * @translate
 * [5] Hello
 * [6]
 * [7] Two\nlines
 * @context_after
 * [8] Next line
 * ---
 * ```
 *
 * Response (what the agent returns):
 *
 * ```text
 * #TRANSLATED:v1:batch=2/7:count=3:status=ok
 * [5] Bonjour
 * [6]
 * [7] Deux\nlignes
 * ---
 * ```
 */

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::batcher::Batch;
use crate::entry::Entry;
use crate::language_utils::LanguagePair;

pub const REQUEST_TAG: &str = "#TRANSLATE";
pub const RESPONSE_TAG: &str = "#TRANSLATED";
pub const FORMAT_VERSION: &str = "v1";
pub const TERMINATOR: &str = "---";
pub const SECTION_CONTEXT_BEFORE: &str = "@context_before";
pub const SECTION_TRANSLATE: &str = "@translate";
pub const SECTION_CONTEXT_AFTER: &str = "@context_after";

/// Status value of a well-formed response header
pub const STATUS_OK: &str = "ok";

static REQUEST_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#TRANSLATE:v1:([^>:]+)>([^:]+):batch=(\d+)/(\d+):entries=(\d+):ctx=(\d+)$")
        .expect("Invalid request header regex")
});

static RESPONSE_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#TRANSLATED:v1:batch=(\d+)/(\d+):count=(\d+):status=(\w+)$")
        .expect("Invalid response header regex")
});

/// `[id]` or `[id] text`
pub static ENTRY_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([^\[\]]+)\](?: (.*))?$").expect("Invalid entry line regex")
});

/// Codec failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The batch references an id that is not among the entries
    #[error("batch {batch} references unknown entry id '{id}'")]
    UnknownEntry { batch: usize, id: String },

    /// A line could not be decoded
    #[error("line {line}: {message}")]
    Decode { line: usize, message: String },
}

impl CodecError {
    fn decode(line: usize, message: impl Into<String>) -> Self {
        Self::Decode {
            line,
            message: message.into(),
        }
    }
}

/// Header of a request document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestHeader {
    pub source_language: String,
    pub target_language: String,
    pub batch_index: usize,
    pub total_batches: usize,
    pub entry_count: usize,
    pub context_count: usize,
}

impl fmt::Display for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}>{}:batch={}/{}:entries={}:ctx={}",
            REQUEST_TAG,
            FORMAT_VERSION,
            self.source_language,
            self.target_language,
            self.batch_index,
            self.total_batches,
            self.entry_count,
            self.context_count
        )
    }
}

/// Header of a response document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseHeader {
    pub batch_index: usize,
    pub total_batches: usize,
    pub count: usize,
    pub status: String,
}

impl ResponseHeader {
    pub fn ok(batch_index: usize, total_batches: usize, count: usize) -> Self {
        Self {
            batch_index,
            total_batches,
            count,
            status: STATUS_OK.to_string(),
        }
    }
}

impl fmt::Display for ResponseHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:batch={}/{}:count={}:status={}",
            RESPONSE_TAG, FORMAT_VERSION, self.batch_index, self.total_batches, self.count, self.status
        )
    }
}

/// Either kind of header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Request(RequestHeader),
    Response(ResponseHeader),
}

/// One decoded `[id] text` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub id: String,
    pub text: String,
    /// 1-based line number in the decoded text
    pub line: usize,
}

/// Result of decoding a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    pub header: Header,
    /// Entries of the translate region, in document order
    pub entries: Vec<DecodedEntry>,
}

/// Replace line breaks with the two-character `\n` sequence
pub fn escape_text(text: &str) -> String {
    text.replace("\r\n", "\\n").replace('\n', "\\n")
}

/// Inverse of [`escape_text`]
pub fn unescape_text(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Render a single exchange line
pub fn format_line(id: &str, text: &str) -> String {
    if text.is_empty() {
        format!("[{}]", id)
    } else {
        format!("[{}] {}", id, escape_text(text))
    }
}

/// Render `batch` as request text.
///
/// Deterministic: the same batch and entries always produce the same text.
pub fn encode(
    batch: &Batch,
    entries_by_id: &HashMap<&str, &Entry>,
    languages: &LanguagePair,
) -> Result<String, CodecError> {
    let lookup = |id: &String| {
        entries_by_id
            .get(id.as_str())
            .copied()
            .ok_or_else(|| CodecError::UnknownEntry {
                batch: batch.index,
                id: id.clone(),
            })
    };

    let header = RequestHeader {
        source_language: languages.source.clone(),
        target_language: languages.target.clone(),
        batch_index: batch.index,
        total_batches: batch.total_batches,
        entry_count: batch.entry_ids.len(),
        context_count: batch.context_count(),
    };

    let mut lines = vec![header.to_string()];

    if !batch.context_before_ids.is_empty() {
        lines.push(SECTION_CONTEXT_BEFORE.to_string());
        for id in &batch.context_before_ids {
            lines.push(format_line(id, &lookup(id)?.text));
        }
    }

    lines.push(SECTION_TRANSLATE.to_string());
    for id in &batch.entry_ids {
        lines.push(format_line(id, &lookup(id)?.text));
    }

    if !batch.context_after_ids.is_empty() {
        lines.push(SECTION_CONTEXT_AFTER.to_string());
        for id in &batch.context_after_ids {
            lines.push(format_line(id, &lookup(id)?.text));
        }
    }

    lines.push(TERMINATOR.to_string());
    Ok(lines.join("\n"))
}

/// Render a response document. Agents produce these; tests and tooling use
/// this to build well-formed candidates.
pub fn encode_response(header: &ResponseHeader, entries: &[(String, String)]) -> String {
    let mut lines = vec![header.to_string()];
    lines.extend(entries.iter().map(|(id, text)| format_line(id, text)));
    lines.push(TERMINATOR.to_string());
    lines.join("\n")
}

/// Parse a header line of either kind
pub fn parse_header(line: &str) -> Option<Result<Header, String>> {
    let line = line.trim();
    if let Some(caps) = RESPONSE_HEADER_REGEX.captures(line) {
        let numbers: Result<Vec<usize>, _> = (1..=3).map(|i| caps[i].parse::<usize>()).collect();
        return Some(
            numbers
                .map(|n| {
                    Header::Response(ResponseHeader {
                        batch_index: n[0],
                        total_batches: n[1],
                        count: n[2],
                        status: caps[4].to_string(),
                    })
                })
                .map_err(|e| format!("numeric field out of range: {}", e)),
        );
    }
    if let Some(caps) = REQUEST_HEADER_REGEX.captures(line) {
        let numbers: Result<Vec<usize>, _> = (3..=6).map(|i| caps[i].parse::<usize>()).collect();
        return Some(
            numbers
                .map(|n| {
                    Header::Request(RequestHeader {
                        source_language: caps[1].to_string(),
                        target_language: caps[2].to_string(),
                        batch_index: n[0],
                        total_batches: n[1],
                        entry_count: n[2],
                        context_count: n[3],
                    })
                })
                .map_err(|e| format!("numeric field out of range: {}", e)),
        );
    }
    None
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Implicit,
    Translate,
    Context,
}

/// Decode a request or response document.
///
/// The first line must be a header and the last non-blank line the
/// terminator. Only the translate region is returned: lines under
/// `@translate`, or lines outside any section when the document has none.
/// Context sections are skipped.
pub fn decode(text: &str) -> Result<DecodedDocument, CodecError> {
    let lines: Vec<&str> = text.lines().collect();

    let first = lines
        .first()
        .ok_or_else(|| CodecError::decode(1, "empty document"))?;
    let header = match parse_header(first) {
        Some(Ok(header)) => header,
        Some(Err(message)) => return Err(CodecError::decode(1, message)),
        None => {
            return Err(CodecError::decode(
                1,
                format!("malformed header '{}'", first.trim()),
            ));
        }
    };

    let mut section = Section::Implicit;
    let mut entries = Vec::new();
    let mut terminated = false;

    for (offset, raw) in lines.iter().enumerate().skip(1) {
        let line_no = offset + 1;
        let line = raw.trim_start();

        if terminated {
            if line.trim().is_empty() {
                continue;
            }
            return Err(CodecError::decode(line_no, "content after terminator"));
        }
        if line.trim().is_empty() {
            continue;
        }
        if line.trim_end() == TERMINATOR {
            terminated = true;
            continue;
        }
        if line.starts_with('@') {
            section = match line.trim_end() {
                SECTION_TRANSLATE => Section::Translate,
                SECTION_CONTEXT_BEFORE | SECTION_CONTEXT_AFTER => Section::Context,
                other => {
                    return Err(CodecError::decode(
                        line_no,
                        format!("unknown section '{}'", other),
                    ));
                }
            };
            continue;
        }

        let caps = ENTRY_LINE_REGEX.captures(line).ok_or_else(|| {
            CodecError::decode(line_no, format!("expected '[id] text', found '{}'", line))
        })?;
        if section == Section::Context {
            continue;
        }
        entries.push(DecodedEntry {
            id: caps[1].to_string(),
            text: caps.get(2).map(|m| unescape_text(m.as_str())).unwrap_or_default(),
            line: line_no,
        });
    }

    if !terminated {
        return Err(CodecError::decode(lines.len(), "missing terminator '---'"));
    }

    Ok(DecodedDocument { header, entries })
}
