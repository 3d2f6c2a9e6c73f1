/*!
 * Placeholder stage: warn when a translation changes `{name}`, `%s`, tags
 * or other format-specific tokens. Never rejects.
 */

use std::collections::{BTreeMap, HashMap};

use log::warn;
use regex::Regex;

use crate::validation::error::{ValidationError, ValidationErrorKind};

/// Compares placeholder multisets between source and translation
#[derive(Debug, Clone, Default)]
pub struct PlaceholderChecker {
    patterns: Vec<Regex>,
}

impl PlaceholderChecker {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every placeholder match in `text`, counted
    pub fn extract(&self, text: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(text) {
                *counts.entry(m.as_str().to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Warning for one entry, if its placeholders differ
    pub fn check_entry(&self, id: &str, source: &str, translation: &str) -> Option<ValidationError> {
        if self.is_empty() {
            return None;
        }

        let expected = self.extract(source);
        let actual = self.extract(translation);
        if expected == actual {
            return None;
        }

        let missing = difference(&expected, &actual);
        let added = difference(&actual, &expected);

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing {}", missing.join(", ")));
        }
        if !added.is_empty() {
            parts.push(format!("unexpected {}", added.join(", ")));
        }

        Some(
            ValidationError::new(
                ValidationErrorKind::PlaceholderWarning,
                format!("Entry {}: placeholders differ ({})", id, parts.join("; ")),
            )
            .with_fix("Copy placeholders from the source text unchanged")
            .with_ids(vec![id.to_string()]),
        )
    }

    /// Warnings for every translated entry with a known source text
    pub fn check(
        &self,
        sources: &HashMap<&str, &str>,
        translations: &BTreeMap<String, String>,
    ) -> Vec<ValidationError> {
        let warnings: Vec<ValidationError> = translations
            .iter()
            .filter_map(|(id, translation)| {
                let source = sources.get(id.as_str())?;
                self.check_entry(id, source, translation)
            })
            .collect();

        for warning in &warnings {
            warn!("{}", warning.message);
        }
        warnings
    }
}

/// Items of `a` not covered by `b`, repeated per surplus occurrence
fn difference(a: &BTreeMap<String, usize>, b: &BTreeMap<String, usize>) -> Vec<String> {
    a.iter()
        .flat_map(|(token, &count)| {
            let surplus = count.saturating_sub(b.get(token).copied().unwrap_or(0));
            std::iter::repeat_n(token.clone(), surplus)
        })
        .collect()
}
