use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde_json::{Map, Value};

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: Nested JSON resource handler

// @const: Metadata key holding the key path
const META_PATH: &str = "path";

// @const: Locale marker updated on reconstruction
const LOCALE_KEY: &str = "@@locale";

/// JSON resource files.
///
/// Nested keys are flattened to dotted ids (`user.greeting`, `items.0`).
/// Only string leaves become entries; keys starting with `@` are metadata and
/// are left untouched. Reconstruction re-reads the source document, so
/// numbers, booleans and metadata survive unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHandler;

impl JsonHandler {
    pub fn new() -> Self {
        Self
    }

    fn flatten(value: &Value, prefix: &str, path: &mut Vec<Value>, entries: &mut Vec<Entry>) {
        let join = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{}.{}", prefix, segment)
            }
        };

        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if key.starts_with('@') {
                        continue;
                    }
                    path.push(Value::from(key.as_str()));
                    Self::flatten(child, &join(key), path, entries);
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push(Value::from(i));
                    Self::flatten(child, &join(&i.to_string()), path, entries);
                    path.pop();
                }
            }
            Value::String(text) => {
                entries.push(
                    Entry::new(prefix, text.as_str()).with_metadata(META_PATH, Value::Array(path.clone())),
                );
            }
            _ => {}
        }
    }

    fn leaf_mut<'a>(root: &'a mut Value, path: &[Value]) -> Option<&'a mut Value> {
        path.iter().try_fold(root, |node, segment| match segment {
            Value::String(key) => node.as_object_mut()?.get_mut(key),
            Value::Number(n) => {
                let index = usize::try_from(n.as_u64()?).ok()?;
                node.as_array_mut()?.get_mut(index)
            }
            _ => None,
        })
    }
}

impl FormatHandler for JsonHandler {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn supports_context(&self) -> bool {
        false
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["i18next", "icu", "icu_full"])
    }

    fn sniff(&self, content: &str) -> bool {
        content.trim_start().starts_with('{')
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let root: Value = serde_json::from_str(content).context("Invalid JSON")?;
        if !root.is_object() {
            return Err(anyhow!("JSON root must be an object"));
        }

        let mut entries = Vec::new();
        Self::flatten(&root, "", &mut Vec::new(), &mut entries);
        Ok(entries)
    }

    fn reconstruct(
        &self,
        entries: &[Entry],
        translations: &BTreeMap<String, String>,
        options: &ReconstructOptions<'_>,
    ) -> Result<String> {
        let mut root: Value = serde_json::from_str(options.source).context("Invalid JSON source")?;

        for entry in entries {
            let path = entry
                .metadata
                .get(META_PATH)
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow!("Entry {} is missing its key path", entry.id))?;
            let leaf = Self::leaf_mut(&mut root, path)
                .ok_or_else(|| anyhow!("Key path of entry {} not found in source", entry.id))?;
            let text = translations.get(&entry.id).unwrap_or(&entry.text);
            *leaf = Value::String(text.clone());
        }

        if let Some(map) = root.as_object_mut() {
            set_locale(map, options.target_language);
        }

        let mut output = serde_json::to_string_pretty(&root).context("Failed to serialize JSON")?;
        output.push('\n');
        Ok(output)
    }
}

fn set_locale(map: &mut Map<String, Value>, target_language: &str) {
    if let Some(locale) = map.get_mut(LOCALE_KEY) {
        *locale = Value::from(target_language);
    }
}
