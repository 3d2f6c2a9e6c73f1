use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde_json::{Map, Value};

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: Flutter Application Resource Bundle handler

// @const: File-level locale key
const LOCALE_KEY: &str = "@@locale";

/// Flutter `.arb` files.
///
/// Top-level string values become entries keyed by their message name.
/// `@name` objects carry the description, which is exposed as the entry
/// note, and every `@`-prefixed key is written back unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArbHandler;

impl ArbHandler {
    pub fn new() -> Self {
        Self
    }

    fn read_root(content: &str) -> Result<Map<String, Value>> {
        match serde_json::from_str(content).context("Invalid JSON in ARB file")? {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow!("ARB root must be a JSON object")),
        }
    }
}

impl FormatHandler for ArbHandler {
    fn name(&self) -> &'static str {
        "arb"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["arb"]
    }

    fn supports_context(&self) -> bool {
        false
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["icu", "icu_full"])
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let root = Self::read_root(content)?;

        let entries = root
            .iter()
            .filter(|(key, _)| !key.starts_with('@'))
            .filter_map(|(key, value)| value.as_str().map(|text| (key, text)))
            .map(|(key, text)| {
                let description = root
                    .get(&format!("@{}", key))
                    .and_then(|meta| meta.get("description"))
                    .and_then(Value::as_str);
                let entry = Entry::new(key.as_str(), text);
                match description {
                    Some(note) => entry.with_context(note),
                    None => entry,
                }
            })
            .collect();
        Ok(entries)
    }

    fn reconstruct(
        &self,
        entries: &[Entry],
        translations: &BTreeMap<String, String>,
        options: &ReconstructOptions<'_>,
    ) -> Result<String> {
        let source = Self::read_root(options.source)?;

        // Locale first, then the source order
        let mut root = Map::with_capacity(source.len() + 1);
        root.insert(LOCALE_KEY.to_string(), Value::from(options.target_language));
        for (key, value) in source {
            if key != LOCALE_KEY {
                root.insert(key, value);
            }
        }

        for entry in entries {
            let slot = root
                .get_mut(&entry.id)
                .ok_or_else(|| anyhow!("Message {} not found in source", entry.id))?;
            let text = translations.get(&entry.id).unwrap_or(&entry.text);
            *slot = Value::String(text.clone());
        }

        let mut output = serde_json::to_string_pretty(&Value::Object(root)).context("Failed to serialize ARB")?;
        output.push('\n');
        Ok(output)
    }
}
