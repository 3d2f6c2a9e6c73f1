use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde_yaml::Value;

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: Rails/Symfony style YAML handler

// @const: Metadata key holding the key path
const META_PATH: &str = "path";

/// Scalar mapping keys as id segments; complex keys are not addressable
fn key_segment(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// YAML message catalogs.
///
/// Nested mappings and sequences are flattened to dotted ids
/// (`en.user.greeting`, `en.days.0`). Only string leaves become entries.
/// Reconstruction re-reads the source so key order and non-string values
/// survive; comments and anchors do not.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlHandler;

impl YamlHandler {
    pub fn new() -> Self {
        Self
    }

    fn flatten(value: &Value, prefix: &str, path: &mut Vec<serde_json::Value>, entries: &mut Vec<Entry>) {
        let join = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{}.{}", prefix, segment)
            }
        };

        match value {
            Value::Mapping(map) => {
                for (key, child) in map {
                    let Some(segment) = key_segment(key) else {
                        continue;
                    };
                    path.push(serde_json::Value::from(segment.as_str()));
                    Self::flatten(child, &join(&segment), path, entries);
                    path.pop();
                }
            }
            Value::Sequence(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push(serde_json::Value::from(i));
                    Self::flatten(child, &join(&i.to_string()), path, entries);
                    path.pop();
                }
            }
            Value::String(text) => {
                entries.push(
                    Entry::new(prefix, text.as_str())
                        .with_metadata(META_PATH, serde_json::Value::Array(path.clone())),
                );
            }
            _ => {}
        }
    }

    fn leaf_mut<'a>(root: &'a mut Value, path: &[serde_json::Value]) -> Option<&'a mut Value> {
        path.iter().try_fold(root, |node, segment| match segment {
            serde_json::Value::String(key) => node
                .as_mapping_mut()?
                .iter_mut()
                .find(|(k, _)| key_segment(k).as_deref() == Some(key.as_str()))
                .map(|(_, v)| v),
            serde_json::Value::Number(n) => {
                let index = usize::try_from(n.as_u64()?).ok()?;
                node.as_sequence_mut()?.get_mut(index)
            }
            _ => None,
        })
    }
}

impl FormatHandler for YamlHandler {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yml", "yaml"]
    }

    fn supports_context(&self) -> bool {
        false
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["ruby", "i18next"])
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let root: Value = serde_yaml::from_str(content).context("Invalid YAML")?;
        if !root.is_mapping() {
            return Err(anyhow!("YAML root must be a mapping"));
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
        let mut root: Value = serde_yaml::from_str(options.source).context("Invalid YAML source")?;

        for entry in entries {
            let path = entry
                .metadata
                .get(META_PATH)
                .and_then(serde_json::Value::as_array)
                .ok_or_else(|| anyhow!("Entry {} is missing its key path", entry.id))?;
            let leaf = Self::leaf_mut(&mut root, path)
                .ok_or_else(|| anyhow!("Key path of entry {} not found in source", entry.id))?;
            let text = translations.get(&entry.id).unwrap_or(&entry.text);
            *leaf = Value::String(text.clone());
        }

        serde_yaml::to_string(&root).context("Failed to serialize YAML")
    }
}
