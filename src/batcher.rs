/*!
 * Batch planning.
 *
 * Splits the ordered entry list into contiguous batches whose estimated
 * output size stays under a token target. The plan is computed once when a
 * session is created and never re-split afterwards.
 */

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// Translations tend to run longer than their source
pub const EXPANSION_FACTOR: f64 = 1.2;

/// Framing cost of one `[id] text` line in the exchange format
pub const ENTRY_OVERHEAD: usize = 10;

/// Entries per batch when no token estimator is available
pub const DEFAULT_FALLBACK_BATCH_SIZE: usize = 25;

/// Opaque token counting function
pub trait TokenEstimator {
    /// Count tokens in `text`
    fn count_tokens(&self, text: &str) -> usize;
}

/// Character-ratio heuristic (roughly four characters per token)
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// One planned batch. Immutable once planning completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based batch index
    pub index: usize,
    /// Number of batches in the plan
    pub total_batches: usize,
    /// Entries to translate, in source order
    pub entry_ids: Vec<String>,
    /// Read-only entries preceding the batch, most distant first
    #[serde(default)]
    pub context_before_ids: Vec<String>,
    /// Read-only entries following the batch, nearest first
    #[serde(default)]
    pub context_after_ids: Vec<String>,
    /// Estimated output tokens (0 when planned by entry count)
    pub estimated_tokens: usize,
}

impl Batch {
    /// Number of context entries rendered with this batch
    pub fn context_count(&self) -> usize {
        self.context_before_ids.len() + self.context_after_ids.len()
    }
}

/// Parameters for a planning run
#[derive(Clone, Copy)]
pub struct PlanOptions<'a> {
    /// Upper bound for a batch's estimated output tokens
    pub target_tokens: usize,
    /// Neighbouring entries to attach on each side
    pub context_window: usize,
    /// Whether the format benefits from context at all
    pub supports_context: bool,
    /// Entry cap per batch when `estimator` is `None`
    pub fallback_batch_size: usize,
    /// Token counter; `None` selects entry-count batching
    pub estimator: Option<&'a dyn TokenEstimator>,
}

/// Estimated output tokens for one entry
pub fn estimate_entry_tokens(estimator: &dyn TokenEstimator, text: &str) -> usize {
    (estimator.count_tokens(text) as f64 * EXPANSION_FACTOR).floor() as usize + ENTRY_OVERHEAD
}

/// Plan batches over `entries`.
///
/// An entry that alone exceeds the limit still gets its own batch; entries
/// are never dropped or split.
pub fn plan(entries: &[Entry], options: PlanOptions<'_>) -> Vec<Batch> {
    if entries.is_empty() {
        return Vec::new();
    }

    let limit = match options.estimator {
        Some(_) => options.target_tokens,
        None => options.fallback_batch_size.max(1),
    };

    // (start, end, estimated tokens)
    let mut spans: Vec<(usize, usize, usize)> = Vec::new();
    let mut start = 0;
    let mut current_weight = 0;
    let mut current_tokens = 0;

    for (i, entry) in entries.iter().enumerate() {
        let (weight, tokens) = match options.estimator {
            Some(estimator) => {
                let tokens = estimate_entry_tokens(estimator, &entry.text);
                (tokens, tokens)
            }
            None => (1, 0),
        };

        if current_weight + weight > limit && i > start {
            spans.push((start, i, current_tokens));
            start = i;
            current_weight = 0;
            current_tokens = 0;
        }

        current_weight += weight;
        current_tokens += tokens;
    }
    spans.push((start, entries.len(), current_tokens));

    let total_batches = spans.len();
    let window = if options.supports_context {
        options.context_window
    } else {
        0
    };

    let batches: Vec<Batch> = spans
        .into_iter()
        .enumerate()
        .map(|(i, (start, end, estimated_tokens))| {
            let before_start = start.saturating_sub(window);
            let after_end = (end + window).min(entries.len());
            Batch {
                index: i + 1,
                total_batches,
                entry_ids: ids(&entries[start..end]),
                context_before_ids: ids(&entries[before_start..start]),
                context_after_ids: ids(&entries[end..after_end]),
                estimated_tokens,
            }
        })
        .collect();

    let planned: usize = batches.iter().map(|b| b.entry_ids.len()).sum();
    if planned != entries.len() {
        error!(
            "Lost entries during planning! Original: {}, planned: {}",
            entries.len(),
            planned
        );
    } else if log::max_level() >= log::LevelFilter::Debug {
        for batch in &batches {
            debug!(
                "Batch {}/{}: {} entries, ~{} tokens, {} context",
                batch.index,
                batch.total_batches,
                batch.entry_ids.len(),
                batch.estimated_tokens,
                batch.context_count()
            );
        }
    }

    batches
}

fn ids(entries: &[Entry]) -> Vec<String> {
    entries.iter().map(|e| e.id.clone()).collect()
}

/// Summary numbers for a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    pub total_batches: usize,
    pub total_entries: usize,
    pub total_estimated_tokens: usize,
    pub avg_tokens_per_batch: usize,
    pub max_tokens: usize,
}

impl PlanStats {
    pub fn from_batches(batches: &[Batch]) -> Self {
        if batches.is_empty() {
            return Self::default();
        }
        let total_estimated_tokens: usize = batches.iter().map(|b| b.estimated_tokens).sum();
        Self {
            total_batches: batches.len(),
            total_entries: batches.iter().map(|b| b.entry_ids.len()).sum(),
            total_estimated_tokens,
            avg_tokens_per_batch: total_estimated_tokens / batches.len(),
            max_tokens: batches.iter().map(|b| b.estimated_tokens).max().unwrap_or(0),
        }
    }
}
