/*!
 * Instruction prompt wrapped around a request document.
 */

use crate::batcher::Batch;
use crate::language_utils::{LanguagePair, display_name};

/// Prompt template for one batch
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Default agent instructions
    pub const BATCH_TRANSLATOR: &'static str = r#"Translate the {source_language} entries to {target_language}.

INPUT FORMAT:
- @context_before: previous entries (read-only, for understanding context)
- @translate: entries you MUST translate
- @context_after: following entries (read-only, for understanding context)

OUTPUT FORMAT:
Return ONLY the translated entries in this exact format:
#TRANSLATED:v1:batch={batch}/{total}:count={count}:status=ok
[id] Translated text
[id] Another translated text
---

RULES:
1. Translate ONLY entries under @translate
2. Keep every entry id exactly as given, one entry per line
3. Output exactly {count} entries
4. Write line breaks inside a text as \n
5. Keep placeholders such as {{name}}, {name}, %s and markup tags unchanged
6. Do NOT add explanations or extra text

INPUT:
{input}

OUTPUT:"#;

    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the prompt for `batch` around the encoded request `input`
    pub fn render(&self, batch: &Batch, languages: &LanguagePair, input: &str) -> String {
        self.template
            .replace("{source_language}", &display_name(&languages.source))
            .replace("{target_language}", &display_name(&languages.target))
            .replace("{batch}", &batch.index.to_string())
            .replace("{total}", &batch.total_batches.to_string())
            .replace("{count}", &batch.entry_ids.len().to_string())
            .replace("{input}", input)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(Self::BATCH_TRANSLATOR)
    }
}
