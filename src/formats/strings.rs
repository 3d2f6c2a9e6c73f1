use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: Apple .strings handler

// @const: `"key" = "value";`, values may span lines
static PAIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^"((?:[^"\\]|\\.)*)"\s*=\s*"((?:[^"\\]|\\.)*)"\s*;\s*$"#).expect("Invalid strings pair regex")
});

// @const: Start of a key/value pair
static PAIR_START_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*"(?:[^"\\]|\\.)*"\s*="#).expect("Invalid strings pair start regex"));

/// One key/value pair with the comment lines above it
#[derive(Debug, Clone)]
struct StringsPair {
    comments: Vec<String>,
    notes: Vec<String>,
    key: String,
    value: String,
}

#[derive(Debug, Default)]
struct StringsDocument {
    pairs: Vec<StringsPair>,
    trailing: Vec<String>,
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

fn comment_text(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("//")
        .trim_start_matches("/*")
        .trim_end_matches("*/")
        .trim()
        .to_string()
}

fn parse_document(content: &str) -> Result<StringsDocument> {
    let lines: Vec<&str> = content.lines().collect();
    let mut document = StringsDocument::default();
    let mut comments: Vec<String> = Vec::new();
    let mut notes: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.is_empty() {
            i += 1;
            continue;
        }

        if line.starts_with("/*") {
            let start = i;
            while !lines[i].contains("*/") {
                i += 1;
                if i == lines.len() {
                    return Err(anyhow!("line {}: unterminated comment", start + 1));
                }
            }
            let block: Vec<&str> = lines[start..=i].to_vec();
            comments.extend(block.iter().map(|l| l.to_string()));
            notes.push(comment_text(&block.join("\n")));
            i += 1;
            continue;
        }

        if line.starts_with("//") {
            comments.push(line.to_string());
            notes.push(comment_text(line));
            i += 1;
            continue;
        }

        if !PAIR_START_REGEX.is_match(line) {
            return Err(anyhow!("line {}: expected '\"key\" = \"value\";', found '{}'", i + 1, line));
        }

        // Multi-line values continue until the pair closes
        let start = i;
        let mut pair = line.to_string();
        while !PAIR_REGEX.is_match(&pair) {
            i += 1;
            if i == lines.len() {
                return Err(anyhow!("line {}: unterminated key/value pair", start + 1));
            }
            pair.push('\n');
            pair.push_str(lines[i]);
        }
        let captures = PAIR_REGEX
            .captures(&pair)
            .ok_or_else(|| anyhow!("line {}: malformed key/value pair", start + 1))?;

        document.pairs.push(StringsPair {
            comments: std::mem::take(&mut comments),
            notes: std::mem::take(&mut notes),
            key: unescape(&captures[1]),
            value: unescape(&captures[2]),
        });
        i += 1;
    }

    document.trailing = comments;
    Ok(document)
}

/// Apple `.strings` files (`"key" = "value";`).
///
/// Block and line comments above a pair become its note and are written
/// back verbatim. Values may span several lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringsHandler;

impl StringsHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for StringsHandler {
    fn name(&self) -> &'static str {
        "strings"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["strings"]
    }

    fn supports_context(&self) -> bool {
        false
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["ios", "printf"])
    }

    fn sniff(&self, content: &str) -> bool {
        content.lines().any(|l| PAIR_START_REGEX.is_match(l) && l.trim_end().ends_with(';'))
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let document = parse_document(content)?;
        Ok(document
            .pairs
            .into_iter()
            .map(|pair| {
                let entry = Entry::new(pair.key, pair.value);
                if pair.notes.is_empty() {
                    entry
                } else {
                    entry.with_context(pair.notes.join("\n"))
                }
            })
            .collect())
    }

    fn reconstruct(
        &self,
        _entries: &[Entry],
        translations: &BTreeMap<String, String>,
        options: &ReconstructOptions<'_>,
    ) -> Result<String> {
        let document = parse_document(options.source)?;

        let mut out = String::new();
        for pair in &document.pairs {
            for comment in &pair.comments {
                out.push_str(comment);
                out.push('\n');
            }
            let text = translations.get(&pair.key).unwrap_or(&pair.value);
            out.push_str(&format!("\"{}\" = \"{}\";\n\n", escape(&pair.key), escape(text)));
        }
        for comment in &document.trailing {
            out.push_str(comment);
            out.push('\n');
        }
        Ok(out)
    }
}
