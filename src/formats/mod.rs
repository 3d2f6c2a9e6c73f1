/*!
 * File format handlers.
 *
 * A handler turns file content into ordered entries and rebuilds the file
 * from those entries plus a translation map. Session code only sees this
 * trait, so formats can be added without touching batching or validation.
 */

use std::collections::BTreeMap;
use std::fmt::Debug;

use anyhow::Result;
use regex::Regex;

use crate::entry::Entry;

pub mod android;
pub mod arb;
pub mod json;
pub mod placeholder;
pub mod po;
pub mod registry;
pub mod srt;
pub mod strings;
pub mod yaml;

pub use android::AndroidHandler;
pub use arb::ArbHandler;
pub use json::JsonHandler;
pub use po::PoHandler;
pub use registry::{FormatInfo, FormatRegistry};
pub use srt::SrtHandler;
pub use strings::StringsHandler;
pub use yaml::YamlHandler;

/// Extra inputs for reconstruction
#[derive(Debug, Clone, Copy)]
pub struct ReconstructOptions<'a> {
    /// Target language code
    pub target_language: &'a str,
    /// Unmodified content of the input file
    pub source: &'a str,
}

/// Capability interface implemented once per file format
pub trait FormatHandler: Debug + Send + Sync {
    /// Unique lowercase name (`srt`, `json`, `po`)
    fn name(&self) -> &'static str;

    /// File extensions without the dot
    fn extensions(&self) -> &'static [&'static str];

    /// Whether neighbouring entries help translation
    fn supports_context(&self) -> bool;

    /// Patterns whose matches must survive translation unchanged
    fn placeholder_patterns(&self) -> Vec<Regex> {
        Vec::new()
    }

    /// Content-based detection for ambiguous extensions
    fn sniff(&self, _content: &str) -> bool {
        false
    }

    /// Parse file content into ordered entries
    fn parse(&self, content: &str) -> Result<Vec<Entry>>;

    /// Rebuild file content.
    ///
    /// `translations` holds a value for every entry id.
    fn reconstruct(
        &self,
        entries: &[Entry],
        translations: &BTreeMap<String, String>,
        options: &ReconstructOptions<'_>,
    ) -> Result<String>;
}
