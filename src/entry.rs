/*!
 * Format-neutral translation entry.
 *
 * Every format handler turns a file into an ordered list of entries and
 * rebuilds the file from the same entries plus a translation map. The
 * session never looks inside `metadata`.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of translatable text with a stable identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Identifier, unique within a file (cue number, dotted key, ...)
    pub id: String,

    /// Source text, may be empty
    pub text: String,

    /// Optional translator-facing note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Format-specific data used only by reconstruction
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Entry {
    /// Create an entry without context or metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            context: None,
            metadata: Map::new(),
        }
    }

    /// Attach a metadata value
    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Attach a translator note
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether the id can travel through the exchange format unchanged.
    ///
    /// Ids are written as `[id]` on a single line, so they may not be empty
    /// and may not contain brackets or line breaks.
    pub fn has_exchange_safe_id(&self) -> bool {
        !self.id.is_empty() && !self.id.contains(['[', ']', '\n', '\r'])
    }
}
