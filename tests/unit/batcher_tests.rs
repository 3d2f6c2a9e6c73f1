/*!
 * Tests for batch planning
 */

use locbridge::batcher::{self, CharRatioEstimator, PlanOptions, PlanStats, TokenEstimator, estimate_entry_tokens};
use locbridge::entry::Entry;

fn entries_with_lengths(lengths: &[usize]) -> Vec<Entry> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, len)| Entry::new(format!("e{}", i), "x".repeat(*len)))
        .collect()
}

fn options(target_tokens: usize, context_window: usize, estimator: Option<&dyn TokenEstimator>) -> PlanOptions<'_> {
    PlanOptions {
        target_tokens,
        context_window,
        supports_context: true,
        fallback_batch_size: 3,
        estimator,
    }
}

/// Test that every plan partitions the input exactly and in order
#[test]
fn test_plan_withVariedInputs_shouldPartitionEntriesInOrder() {
    let estimator = CharRatioEstimator::default();
    let length_sets: Vec<Vec<usize>> = vec![
        vec![1],
        vec![0, 0, 0],
        vec![40; 50],
        vec![4000, 10, 10, 4000, 10],
        (0..97).map(|i| (i * 37) % 300).collect(),
    ];

    for lengths in &length_sets {
        let entries = entries_with_lengths(lengths);
        let expected: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();

        for target in [1, 30, 200, 5000] {
            for est in [Some(&estimator as &dyn TokenEstimator), None] {
                let batches = batcher::plan(&entries, options(target, 2, est));
                let planned: Vec<String> = batches.iter().flat_map(|b| b.entry_ids.clone()).collect();
                assert_eq!(planned, expected, "target {} lengths {:?}", target, lengths.len());

                for (i, batch) in batches.iter().enumerate() {
                    assert_eq!(batch.index, i + 1);
                    assert_eq!(batch.total_batches, batches.len());
                    assert!(!batch.entry_ids.is_empty());
                }
            }
        }
    }
}

/// Test that a batch only exceeds the target when it holds a single entry
#[test]
fn test_plan_withTokenTarget_shouldOnlyOverflowForSingleEntries() {
    let estimator = CharRatioEstimator::default();
    let entries = entries_with_lengths(&[100, 100, 2000, 100, 100, 100]);
    let batches = batcher::plan(&entries, options(120, 0, Some(&estimator)));

    for batch in &batches {
        if batch.estimated_tokens > 120 {
            assert_eq!(batch.entry_ids.len(), 1, "batch {} overflowed", batch.index);
        }
    }
    assert!(batches.iter().any(|b| b.entry_ids == vec!["e2".to_string()]));
}

/// Test that context ids are neighbours outside the batch
#[test]
fn test_plan_withContextWindow_shouldAttachNeighbours() {
    let entries = entries_with_lengths(&[5; 7]);
    let batches = batcher::plan(&entries, options(0, 2, None));

    assert_eq!(batches.len(), 3);
    assert!(batches[0].context_before_ids.is_empty());
    assert_eq!(batches[0].context_after_ids, vec!["e3", "e4"]);
    assert_eq!(batches[1].context_before_ids, vec!["e1", "e2"]);
    assert_eq!(batches[1].context_after_ids, vec!["e6"]);
    assert_eq!(batches[2].context_before_ids, vec!["e4", "e5"]);
    assert!(batches[2].context_after_ids.is_empty());

    for batch in &batches {
        for id in batch.context_before_ids.iter().chain(&batch.context_after_ids) {
            assert!(!batch.entry_ids.contains(id));
        }
    }
}

/// Test that formats without context support get no context ids
#[test]
fn test_plan_withoutContextSupport_shouldOmitContext() {
    let entries = entries_with_lengths(&[5; 7]);
    let mut opts = options(0, 4, None);
    opts.supports_context = false;

    let batches = batcher::plan(&entries, opts);
    assert!(batches.iter().all(|b| b.context_count() == 0));
}

/// Test the estimate formula and a closure estimator
#[test]
fn test_estimateEntryTokens_withClosure_shouldApplyExpansionAndOverhead() {
    let per_word = |text: &str| text.split_whitespace().count();
    assert_eq!(estimate_entry_tokens(&per_word, "one two three four five"), 16);
    assert_eq!(estimate_entry_tokens(&CharRatioEstimator::default(), ""), 10);
}

/// Test plan statistics
#[test]
fn test_planStats_shouldSummarizeBatches() {
    let estimator = CharRatioEstimator::default();
    let entries = entries_with_lengths(&[40, 40, 40, 40]);
    let batches = batcher::plan(&entries, options(50, 0, Some(&estimator)));
    let stats = PlanStats::from_batches(&batches);

    assert_eq!(stats.total_batches, 2);
    assert_eq!(stats.total_entries, 4);
    assert_eq!(stats.total_estimated_tokens, 88);
    assert_eq!(stats.max_tokens, 44);
}
