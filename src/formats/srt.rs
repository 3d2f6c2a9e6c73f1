use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: SubRip subtitle handler

// @const: SRT timing line regex
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}:\d{2}:\d{2}[,.]\d{3})\s*-->\s*(\d{1,2}:\d{2}:\d{2}[,.]\d{3})(.*)$")
        .expect("Invalid SRT timing regex")
});

// @const: Metadata keys
const META_START: &str = "start_time";
const META_END: &str = "end_time";
const META_SETTINGS: &str = "settings";

/// Parse an SRT timestamp (`HH:MM:SS,mmm`) to milliseconds
pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
    let parts: Vec<&str> = timestamp.split(&[':', ',', '.'][..]).collect();

    if parts.len() != 4 {
        return Err(anyhow!("Invalid timestamp format: {}", timestamp));
    }

    let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
    let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
    let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
    let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
    }

    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Format milliseconds as an SRT timestamp
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn is_cue_number(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn is_timing_line(line: &str) -> bool {
    TIMING_REGEX.is_match(line.trim())
}

/// Whether the blank line at `blank` closes the current cue: the next
/// non-blank line must be a cue number followed by a timing line, or the
/// input must end.
fn closes_cue(lines: &[&str], blank: usize) -> bool {
    let next = lines[blank..].iter().position(|l| !l.trim().is_empty());
    match next {
        None => true,
        Some(offset) => {
            let j = blank + offset;
            is_cue_number(lines[j]) && lines.get(j + 1).is_some_and(|l| is_timing_line(l))
        }
    }
}

// @struct: SRT format handler
#[derive(Debug, Default, Clone, Copy)]
pub struct SrtHandler;

impl SrtHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for SrtHandler {
    fn name(&self) -> &'static str {
        "srt"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["srt"]
    }

    fn supports_context(&self) -> bool {
        true
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["html_tag", "ass_override"])
    }

    fn sniff(&self, content: &str) -> bool {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(2).collect();
        lines.len() == 2 && is_cue_number(lines[0]) && is_timing_line(lines[1])
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
        let lines: Vec<&str> = normalized.lines().collect();
        let mut entries = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].trim().is_empty() {
                i += 1;
                continue;
            }

            let number = lines[i].trim();
            if !is_cue_number(number) {
                warn!("Unexpected text at line {} before cue number or timing: {}", i + 1, number);
                i += 1;
                continue;
            }
            let Some(caps) = lines.get(i + 1).and_then(|l| TIMING_REGEX.captures(l.trim())) else {
                warn!("Missing timing line after cue {} at line {}", number, i + 1);
                i += 1;
                continue;
            };

            let start = caps[1].to_string();
            let end = caps[2].to_string();
            let settings = caps[3].to_string();
            i += 2;

            let mut text_lines: Vec<&str> = Vec::new();
            while i < lines.len() {
                if lines[i].trim().is_empty() && closes_cue(&lines, i) {
                    break;
                }
                text_lines.push(lines[i].trim_end());
                i += 1;
            }
            while text_lines.last().is_some_and(|l| l.is_empty()) {
                text_lines.pop();
            }

            if let (Ok(start_ms), Ok(end_ms)) = (parse_timestamp(&start), parse_timestamp(&end)) {
                if end_ms <= start_ms {
                    warn!("Cue {} has an invalid time range: {} --> {}", number, start, end);
                }
            }

            let mut entry = Entry::new(number, text_lines.join("\n"))
                .with_metadata(META_START, Value::from(start))
                .with_metadata(META_END, Value::from(end));
            if !settings.trim().is_empty() {
                entry = entry.with_metadata(META_SETTINGS, Value::from(settings));
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
        }

        debug!("Parsed {} subtitle cues", entries.len());
        Ok(entries)
    }

    fn reconstruct(
        &self,
        entries: &[Entry],
        translations: &BTreeMap<String, String>,
        _options: &ReconstructOptions<'_>,
    ) -> Result<String> {
        let meta = |entry: &Entry, key: &str| -> Result<String> {
            entry
                .metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Cue {} is missing '{}' metadata", entry.id, key))
        };

        let mut blocks = Vec::with_capacity(entries.len());
        for entry in entries {
            let text = translations.get(&entry.id).unwrap_or(&entry.text);
            let settings = entry
                .metadata
                .get(META_SETTINGS)
                .and_then(Value::as_str)
                .unwrap_or_default();
            blocks.push(format!(
                "{}\n{} --> {}{}\n{}\n",
                entry.id,
                meta(entry, META_START)?,
                meta(entry, META_END)?,
                settings,
                text
            ));
        }

        Ok(blocks.join("\n"))
    }
}
