use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use log::debug;
use regex::Regex;

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: GNU gettext catalog handler

// @const: Output line width before a string is wrapped
const WRAP_WIDTH: usize = 76;

// @const: Header field rewritten to the target language
const LANGUAGE_FIELD: &str = "Language:";

/// Which string a continuation line extends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str,
    StrPlural(usize),
}

/// One catalog unit: comments, keywords and strings up to the next unit
#[derive(Debug, Clone, Default)]
struct PoUnit {
    comments: Vec<String>,
    msgctxt: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: String,
    msgstr_plural: BTreeMap<usize, String>,
}

impl PoUnit {
    fn is_header(&self) -> bool {
        self.msgctxt.is_none() && self.msgid.as_deref() == Some("")
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Context => self.msgctxt.get_or_insert_with(String::new),
            Field::Id => self.msgid.get_or_insert_with(String::new),
            Field::IdPlural => self.msgid_plural.get_or_insert_with(String::new),
            Field::Str => &mut self.msgstr,
            Field::StrPlural(index) => self.msgstr_plural.entry(index).or_default(),
        }
    }

    /// Comment lines of one kind (`#.`, `#:`), without the marker
    fn comments_with(&self, marker: &str) -> impl Iterator<Item = &str> {
        self.comments
            .iter()
            .filter_map(move |c| c.strip_prefix(marker))
            .map(str::trim)
    }
}

/// Parsed catalog, including comments that follow the last unit
#[derive(Debug, Default)]
struct PoDocument {
    units: Vec<PoUnit>,
    trailing: Vec<String>,
}

impl PoDocument {
    /// Entry id of every unit, `None` for the header
    fn unit_ids(&self) -> Vec<Option<String>> {
        let mut ordinal = 0;
        self.units
            .iter()
            .map(|unit| {
                if unit.is_header() {
                    None
                } else {
                    ordinal += 1;
                    Some(entry_id(unit, ordinal))
                }
            })
            .collect()
    }
}

/// `msgctxt|msgid`, or `#<n>` when the msgid cannot be used as an exchange id
fn entry_id(unit: &PoUnit, ordinal: usize) -> String {
    let msgid = unit.msgid.as_deref().unwrap_or_default();
    let id = match &unit.msgctxt {
        Some(context) => format!("{}|{}", context, msgid),
        None => msgid.to_string(),
    };
    if Entry::new(id.as_str(), "").has_exchange_safe_id() {
        id
    } else {
        format!("#{}", ordinal)
    }
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
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
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

fn unquote(text: &str, line_no: usize) -> Result<String> {
    let text = text.trim();
    if text.len() < 2 || !text.starts_with('"') || !text.ends_with('"') {
        return Err(anyhow!("line {}: expected a quoted string, found '{}'", line_no, text));
    }
    Ok(unescape(&text[1..text.len() - 1]))
}

fn keyword_field(keyword: &str) -> Option<Field> {
    match keyword {
        "msgctxt" => Some(Field::Context),
        "msgid" => Some(Field::Id),
        "msgid_plural" => Some(Field::IdPlural),
        "msgstr" => Some(Field::Str),
        _ => keyword
            .strip_prefix("msgstr[")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|index| index.parse().ok())
            .map(Field::StrPlural),
    }
}

fn parse_document(content: &str) -> Result<PoDocument> {
    let mut document = PoDocument::default();
    let mut current = PoUnit::default();
    let mut field: Option<Field> = None;

    for (offset, raw) in content.lines().enumerate() {
        let line_no = offset + 1;
        let line = raw.trim();

        if line.is_empty() {
            if current.msgid.is_some() {
                document.units.push(std::mem::take(&mut current));
            }
            field = None;
            continue;
        }

        if line.starts_with('#') {
            if current.msgid.is_some() {
                document.units.push(std::mem::take(&mut current));
            }
            current.comments.push(line.to_string());
            field = None;
            continue;
        }

        if line.starts_with('"') {
            let value = unquote(line, line_no)?;
            let target = field.ok_or_else(|| anyhow!("line {}: string continuation without a keyword", line_no))?;
            current.field_mut(target).push_str(&value);
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| anyhow!("line {}: expected a keyword and a string", line_no))?;
        let next = keyword_field(keyword).ok_or_else(|| anyhow!("line {}: unknown keyword '{}'", line_no, keyword))?;

        // msgctxt or msgid after a complete msgid opens the next unit
        if matches!(next, Field::Context | Field::Id) && current.msgid.is_some() {
            document.units.push(std::mem::take(&mut current));
        }

        let value = unquote(rest, line_no)?;
        *current.field_mut(next) = value;
        field = Some(next);
    }

    if current.msgid.is_some() {
        document.units.push(current);
    } else {
        document.trailing = current.comments;
    }

    Ok(document)
}

/// Byte offset at which `chunk[..split]` does not end inside an escape
fn safe_split(chunk: &str, split: usize) -> usize {
    let backslashes = chunk[..split].chars().rev().take_while(|c| *c == '\\').count();
    if backslashes % 2 == 1 && split > 1 { split - 1 } else { split }
}

fn wrap_segment(segment: &str, max_chars: usize, lines: &mut Vec<String>) {
    let mut rest = segment;
    while rest.chars().count() > max_chars {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let split = match rest[..cut].rfind(' ') {
            Some(space) if space > 0 => space + 1,
            _ => safe_split(rest, cut),
        };
        lines.push(format!("\"{}\"", &rest[..split]));
        rest = &rest[split..];
    }
    if !rest.is_empty() {
        lines.push(format!("\"{}\"", rest));
    }
}

/// Render `keyword "value"`, wrapping long or multi-line strings
fn format_string(keyword: &str, value: &str) -> Vec<String> {
    let escaped = escape(value);
    let single = format!("{} \"{}\"", keyword, escaped);
    let interior_break = escaped.trim_end_matches("\\n").contains("\\n");
    if single.chars().count() <= WRAP_WIDTH && !interior_break {
        return vec![single];
    }

    let mut lines = vec![format!("{} \"\"", keyword)];
    for segment in escaped.split_inclusive("\\n") {
        wrap_segment(segment, WRAP_WIDTH - 2, &mut lines);
    }
    lines
}

fn localize_header(header: &str, target_language: &str) -> String {
    header
        .split_inclusive('\n')
        .map(|line| {
            if line.starts_with(LANGUAGE_FIELD) {
                let ending = if line.ends_with('\n') { "\n" } else { "" };
                format!("{} {}{}", LANGUAGE_FIELD, target_language, ending)
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Gettext `.po` and `.pot` catalogs.
///
/// Entry ids are `msgid`, or `msgctxt|msgid` when a context is present. A
/// msgid that cannot travel as an exchange id (it contains a line break or
/// brackets) is numbered `#<n>` by its position instead. Extracted comments
/// and references become the entry note. Reconstruction re-reads the source
/// catalog, keeps every comment and flag, and fills `msgstr` (or
/// `msgstr[0]` for plural units).
#[derive(Debug, Default, Clone, Copy)]
pub struct PoHandler;

impl PoHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for PoHandler {
    fn name(&self) -> &'static str {
        "po"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["po", "pot"]
    }

    fn supports_context(&self) -> bool {
        false
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["printf", "printf_named"])
    }

    fn sniff(&self, content: &str) -> bool {
        content.lines().any(|l| l.starts_with("msgid \""))
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let document = parse_document(content)?;

        let entries: Vec<Entry> = document
            .units
            .iter()
            .zip(document.unit_ids())
            .filter_map(|(unit, id)| id.map(|id| (id, unit)))
            .map(|(id, unit)| {
                let mut note: Vec<String> = unit.comments_with("#.").map(str::to_string).collect();
                let references: Vec<&str> = unit.comments_with("#:").collect();
                if !references.is_empty() {
                    note.push(format!("References: {}", references.join(", ")));
                }

                let entry = Entry::new(id, unit.msgid.clone().unwrap_or_default());
                if note.is_empty() { entry } else { entry.with_context(note.join("\n")) }
            })
            .collect();

        debug!("Parsed {} catalog units into {} entries", document.units.len(), entries.len());
        Ok(entries)
    }

    fn reconstruct(
        &self,
        _entries: &[Entry],
        translations: &BTreeMap<String, String>,
        options: &ReconstructOptions<'_>,
    ) -> Result<String> {
        let document = parse_document(options.source)?;
        let mut lines: Vec<String> = Vec::new();
        for (unit, id) in document.units.iter().zip(document.unit_ids()) {
            lines.extend(unit.comments.iter().cloned());
            if let Some(context) = &unit.msgctxt {
                lines.extend(format_string("msgctxt", context));
            }
            lines.extend(format_string("msgid", unit.msgid.as_deref().unwrap_or_default()));
            if let Some(plural) = &unit.msgid_plural {
                lines.extend(format_string("msgid_plural", plural));
            }

            let translated = match &id {
                Some(id) => translations
                    .get(id)
                    .cloned()
                    .ok_or_else(|| anyhow!("No text for catalog entry {}", id))?,
                None => localize_header(&unit.msgstr, options.target_language),
            };

            if unit.msgid_plural.is_some() {
                lines.extend(format_string("msgstr[0]", &translated));
                for (index, text) in unit.msgstr_plural.range(1..) {
                    lines.extend(format_string(&format!("msgstr[{}]", index), text));
                }
            } else {
                lines.extend(format_string("msgstr", &translated));
            }
            lines.push(String::new());
        }
        lines.extend(document.trailing.iter().cloned());

        let mut output = lines.join("\n");
        if !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(output)
    }
}
