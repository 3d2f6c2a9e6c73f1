/*!
 * Language utilities for ISO language code handling
 *
 * Codes may carry a region or script subtag (`pt-BR`, `zh_Hans`); only the
 * primary subtag is checked against ISO 639-1 / ISO 639-2.
 */

use std::fmt;

use anyhow::{Result, anyhow};
use isolang::Language;
use serde::{Deserialize, Serialize};

/// Language code type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter) code
    Part2B,
}

/// ISO 639-2/B codes that differ from their ISO 639-2/T form
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    PART2B_TO_PART2T
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

/// Primary subtag of a language tag, lowercased
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Validate if a language code is a valid ISO 639-1 or ISO 639-2 code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let primary = primary_subtag(code);

    match primary.len() {
        2 if Language::from_639_1(&primary).is_some() => return Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(&primary).is_some() => return Ok(LanguageCodeType::Part2T),
        3 if part2b_to_part2t(&primary).is_some() => return Ok(LanguageCodeType::Part2B),
        _ => {}
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let primary = primary_subtag(code);

    if primary.len() == 2 {
        if let Some(lang) = Language::from_639_1(&primary) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if primary.len() == 3 {
        if Language::from_639_3(&primary).is_some() {
            return Ok(primary);
        }
        if let Some(part2t) = part2b_to_part2t(&primary) {
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b && region_subtag(code1) == region_subtag(code2),
        _ => false,
    }
}

fn region_subtag(code: &str) -> Option<String> {
    code.trim()
        .split(['-', '_'])
        .nth(1)
        .map(|s| s.to_lowercase())
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Human-readable name, falling back to the code itself
pub fn display_name(code: &str) -> String {
    match get_language_name(code) {
        Ok(name) if region_subtag(code).is_some() => format!("{} ({})", name, code),
        Ok(name) => name,
        Err(_) => code.to_string(),
    }
}

/// Source and target language of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.source, self.target)
    }
}

/// Source language assumed when a pair names only the target
pub const DEFAULT_SOURCE_LANGUAGE: &str = "en";

/// Parse `src>tgt`, or a bare `tgt` meaning `en>tgt`.
///
/// Both codes must be valid ISO codes and must not name the same language.
pub fn parse_language_pair(value: &str) -> Result<LanguagePair> {
    let (source, target) = match value.split_once('>') {
        Some((source, target)) => (source.trim(), target.trim()),
        None => (DEFAULT_SOURCE_LANGUAGE, value.trim()),
    };

    if source.is_empty() || target.is_empty() {
        return Err(anyhow!(
            "Invalid language pair '{}', expected 'src>tgt' or 'tgt'",
            value
        ));
    }
    if source.contains(':') || target.contains([':', '>']) {
        return Err(anyhow!("Invalid language pair '{}'", value));
    }

    validate_language_code(source)?;
    validate_language_code(target)?;

    if language_codes_match(source, target) {
        return Err(anyhow!(
            "Source and target language are the same: {} and {}",
            source,
            target
        ));
    }

    Ok(LanguagePair::new(source, target))
}
