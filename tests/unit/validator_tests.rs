/*!
 * Tests for the response validation pipeline
 */

use std::collections::{BTreeMap, HashMap};

use locbridge::app_config::ValidationMode;
use locbridge::batcher::Batch;
use locbridge::formats::placeholder;
use locbridge::validation::{ValidationErrorKind, ValidationOutcome, Validator};

fn batch(index: usize, total: usize, ids: &[&str]) -> Batch {
    Batch {
        index,
        total_batches: total,
        entry_ids: ids.iter().map(|s| s.to_string()).collect(),
        context_before_ids: Vec::new(),
        context_after_ids: Vec::new(),
        estimated_tokens: 0,
    }
}

fn kinds(outcome: &ValidationOutcome) -> Vec<ValidationErrorKind> {
    match outcome {
        ValidationOutcome::Rejected { errors } => errors.iter().map(|e| e.kind).collect(),
        ValidationOutcome::Accepted { .. } => Vec::new(),
    }
}

fn strict() -> Validator {
    Validator::new(ValidationMode::Strict, Vec::new())
}

/// Test the accepted example from the exchange documentation
#[test]
fn test_validate_withCompleteResponse_shouldAcceptTranslations() {
    let sources = HashMap::from([("a", "Hi"), ("b", "Bye")]);
    let outcome = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=2:status=ok\n[a] Salut\n[b] Au revoir\n---",
        &batch(1, 1, &["a", "b"]),
        &sources,
    );

    let expected = BTreeMap::from([
        ("a".to_string(), "Salut".to_string()),
        ("b".to_string(), "Au revoir".to_string()),
    ]);
    assert_eq!(
        outcome,
        ValidationOutcome::Accepted {
            translations: expected,
            warnings: Vec::new(),
        }
    );
}

/// Test that a missing id is reported with the id attached
#[test]
fn test_validate_withMissingEntry_shouldRejectWithIds() {
    let sources = HashMap::from([("a", "Hi"), ("b", "Bye")]);
    let outcome = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[b] Au revoir\n---",
        &batch(1, 1, &["a", "b"]),
        &sources,
    );

    match outcome {
        ValidationOutcome::Rejected { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].kind, ValidationErrorKind::MissingEntries);
            assert_eq!(errors[0].ids, vec!["a".to_string()]);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

/// Test that a wrong batch index is rejected even when all ids match
#[test]
fn test_validate_withWrongBatchIndex_shouldReportBatchMismatch() {
    let sources = HashMap::from([("x", "One"), ("y", "Two")]);
    let outcome = strict().validate(
        "#TRANSLATED:v1:batch=2/5:count=2:status=ok\n[x] Un\n[y] Deux\n---",
        &batch(3, 5, &["x", "y"]),
        &sources,
    );
    assert_eq!(kinds(&outcome), vec![ValidationErrorKind::BatchMismatch]);
}

/// Test that missing and unexpected ids are reported in one pass
#[test]
fn test_validate_withMissingAndExtraIds_shouldReportBoth() {
    let sources = HashMap::from([("a", "A"), ("b", "B")]);
    let outcome = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=2:status=ok\n[a] A\n[z] Z\n---",
        &batch(1, 1, &["a", "b"]),
        &sources,
    );

    let found = kinds(&outcome);
    assert!(found.contains(&ValidationErrorKind::MissingEntries));
    assert!(found.contains(&ValidationErrorKind::ExtraEntries));
    assert!(!found.contains(&ValidationErrorKind::EntryCountMismatch));
}

/// Test that a wrong count with correct ids is a count mismatch
#[test]
fn test_validate_withWrongCount_shouldReportEntryCountMismatch() {
    let sources = HashMap::from([("a", "A")]);
    let outcome = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=3:status=ok\n[a] A\n---",
        &batch(1, 1, &["a"]),
        &sources,
    );
    assert_eq!(kinds(&outcome), vec![ValidationErrorKind::EntryCountMismatch]);
}

/// Test that an altered placeholder only produces a warning
#[test]
fn test_validate_withAlteredPlaceholder_shouldAcceptWithWarning() {
    let validator = Validator::new(ValidationMode::Strict, placeholder::regexes(&["i18next"]));
    let sources = HashMap::from([("greet", "Hello {{name}}"), ("bye", "Bye {{name}}")]);
    let outcome = validator.validate(
        "#TRANSLATED:v1:batch=1/1:count=2:status=ok\n[greet] Bonjour {{nom}}\n[bye] Salut {{name}}\n---",
        &batch(1, 1, &["greet", "bye"]),
        &sources,
    );

    match outcome {
        ValidationOutcome::Accepted { translations, warnings } => {
            assert_eq!(translations["greet"], "Bonjour {{nom}}");
            assert_eq!(warnings.len(), 1);
            assert_eq!(warnings[0].kind, ValidationErrorKind::PlaceholderWarning);
            assert_eq!(warnings[0].ids, vec!["greet".to_string()]);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
}

/// Test that commentary before the block is tolerated
#[test]
fn test_validate_withLeadingCommentary_shouldExtractBlock() {
    let sources = HashMap::from([("a", "Hi")]);
    let outcome = strict().validate(
        "Sure, here is the translation:\n\n#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[a] Salut\n---\n",
        &batch(1, 1, &["a"]),
        &sources,
    );
    assert!(outcome.is_accepted(), "{:?}", outcome);
}

/// Test that trailing commentary depends on the validation mode
#[test]
fn test_validate_withTrailingCommentary_shouldDependOnMode() {
    let sources = HashMap::from([("a", "Hi")]);
    let candidate = "#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[a] Salut\n---\nHope this helps!";
    let target = batch(1, 1, &["a"]);

    let strict_outcome = strict().validate(candidate, &target, &sources);
    assert_eq!(kinds(&strict_outcome), vec![ValidationErrorKind::Structural]);

    let lenient = Validator::new(ValidationMode::Lenient, Vec::new());
    assert!(lenient.validate(candidate, &target, &sources).is_accepted());
}

/// Test the structural and extraction stage failures
#[test]
fn test_validate_withBrokenShape_shouldRejectAtEarlyStages() {
    let sources = HashMap::from([("a", "Hi")]);
    let target = batch(1, 1, &["a"]);

    let no_space = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[a]Salut\n---",
        &target,
        &sources,
    );
    assert_eq!(kinds(&no_space), vec![ValidationErrorKind::Structural]);

    let no_header = strict().validate("[a] Salut\n---", &target, &sources);
    assert_eq!(kinds(&no_header), vec![ValidationErrorKind::Extraction]);

    let no_terminator = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[a] Salut",
        &target,
        &sources,
    );
    assert_eq!(kinds(&no_terminator), vec![ValidationErrorKind::Extraction]);

    let wrong_version = strict().validate(
        "#TRANSLATED:v2:batch=1/1:count=1:status=ok\n[a] Salut\n---",
        &target,
        &sources,
    );
    assert_eq!(kinds(&wrong_version), vec![ValidationErrorKind::Structural]);
}

/// Test that decode errors point at the line in the submitted text
#[test]
fn test_validate_withDuplicateId_shouldReportDecodeLine() {
    let sources = HashMap::from([("a", "Hi")]);
    let outcome = strict().validate(
        "note\n#TRANSLATED:v1:batch=1/1:count=2:status=ok\n[a] Salut\n[a] Encore\n---",
        &batch(1, 1, &["a"]),
        &sources,
    );

    match outcome {
        ValidationOutcome::Rejected { errors } => {
            assert_eq!(errors[0].kind, ValidationErrorKind::Decode);
            assert_eq!(errors[0].line, Some(4));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

/// Test that escaped line breaks are restored in accepted text
#[test]
fn test_validate_withEscapedNewline_shouldUnescapeTranslation() {
    let sources = HashMap::from([("a", "Line one\nLine two")]);
    let outcome = strict().validate(
        "#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[a] Ligne un\\nLigne deux\n---",
        &batch(1, 1, &["a"]),
        &sources,
    );

    match outcome {
        ValidationOutcome::Accepted { translations, .. } => {
            assert_eq!(translations["a"], "Ligne un\nLigne deux");
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
}
