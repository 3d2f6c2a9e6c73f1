/*!
 * Integration tests for the batch lifecycle state machine
 */

use anyhow::Result;

use locbridge::errors::{SessionError, error_kind};
use locbridge::session::{BatchStatus, NextAction, SubmitOutcome};
use locbridge::validation::ValidationErrorKind;

use crate::common::{self, MockHandler};

/// Test that init plans batches covering every entry in order
#[test]
fn test_create_withSmallBatches_shouldPartitionEntries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(7),
        MockHandler::new().with_context(),
        common::entry_count_config(3),
    )?;

    let state = session.state();
    assert_eq!(state.total_entries, 7);
    assert_eq!(state.total_batches(), 3);

    let planned: Vec<String> = state.batches.iter().flat_map(|r| r.batch.entry_ids.clone()).collect();
    let expected: Vec<String> = (1..=7).map(|i| format!("k{}", i)).collect();
    assert_eq!(planned, expected);
    assert!(state.batches.iter().all(|r| r.status == BatchStatus::Pending));
    assert_eq!(state.batches[1].batch.context_before_ids, vec!["k3"]);
    assert_eq!(state.batches[1].batch.context_after_ids, vec!["k7"]);

    assert!(session.state_path().exists());
    let name = session.state_path().file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with(".loc-") && name.ends_with(".json"), "{}", name);
    Ok(())
}

/// Test the accepted and rejected examples of a two-entry batch
#[test]
fn test_submit_withDocumentedExamples_shouldAcceptThenReject() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::entry_count_config(25);

    let (mut session, _) = common::create_session(temp_dir.path(), "a=Hi\nb=Bye\n", MockHandler::new(), config.clone())?;
    session.request_batch(1)?;
    let outcome = session.submit_batch(
        1,
        "#TRANSLATED:v1:batch=1/1:count=2:status=ok\n[a] Salut\n[b] Au revoir\n---",
    )?;
    match outcome {
        SubmitOutcome::Accepted {
            entries_translated,
            warnings,
            next_batch,
            progress,
            ..
        } => {
            assert_eq!(entries_translated, 2);
            assert!(warnings.is_empty());
            assert_eq!(next_batch, None);
            assert_eq!(progress.percent_complete, 100.0);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
    assert_eq!(session.state().translations["a"], "Salut");
    assert_eq!(session.state().translations["b"], "Au revoir");

    let other_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(other_dir.path(), "a=Hi\nb=Bye\n", MockHandler::new(), config)?;
    session.request_batch(1)?;
    let outcome = session.submit_batch(1, "#TRANSLATED:v1:batch=1/1:count=1:status=ok\n[b] Au revoir\n---")?;
    match outcome {
        SubmitOutcome::Rejected {
            attempt,
            batch_status,
            validation_errors,
            ..
        } => {
            assert_eq!(attempt, 1);
            assert_eq!(batch_status, BatchStatus::InProgress);
            assert_eq!(validation_errors.len(), 1);
            assert_eq!(validation_errors[0].kind, ValidationErrorKind::MissingEntries);
            assert_eq!(validation_errors[0].ids, vec!["a".to_string()]);
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    let record = session.state().batch(1)?;
    assert_eq!(record.retry_count, 1);
    assert_eq!(record.status, BatchStatus::InProgress);
    assert_eq!(record.last_errors.len(), 1);
    assert!(session.state().translations.is_empty());
    Ok(())
}

/// Test that requesting a batch twice returns the same text
#[test]
fn test_requestBatch_calledTwice_shouldBeIdempotent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(4),
        MockHandler::new().with_context(),
        common::entry_count_config(2),
    )?;

    let first = session.request_batch(2)?;
    assert_eq!(first.batch_status, BatchStatus::InProgress);
    assert!(first.text.starts_with("#TRANSLATE:v1:en>fr:batch=2/2:entries=2:ctx=1"));

    let second = session.request_batch(2)?;
    assert_eq!(first.text, second.text);
    assert_eq!(session.state().batch(2)?.retry_count, 0);
    assert_eq!(session.state().batch(1)?.status, BatchStatus::Pending);
    Ok(())
}

/// Test that a completed batch re-renders read-only and refuses resubmission
#[test]
fn test_requestBatch_onCompletedBatch_shouldReturnSameTextWithoutChanges() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(2),
        MockHandler::new(),
        common::entry_count_config(5),
    )?;

    let requested = session.request_batch(1)?;
    let response = common::translate_batch(&session, 1)?;
    assert!(session.submit_batch(1, &response)?.is_accepted());
    let before = session.state().batch(1)?.clone();

    let again = session.request_batch(1)?;
    assert!(again.already_completed);
    assert_eq!(again.text, requested.text);
    assert_eq!(session.state().batch(1)?, &before);

    let error = session.submit_batch(1, &response).unwrap_err();
    assert_eq!(error_kind(&error), "already_completed");
    Ok(())
}

/// Test that a batch fails after the attempt ceiling and is then blocked
#[test]
fn test_submit_withThreeRejections_shouldFailAndBlockBatch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(2),
        MockHandler::new(),
        common::entry_count_config(5),
    )?;

    session.request_batch(1)?;
    let bad = common::response(1, 1, &[("k1", "Un")]);

    for expected_attempt in 1..=3u32 {
        match session.submit_batch(1, &bad)? {
            SubmitOutcome::Rejected {
                attempt,
                max_attempts,
                batch_status,
                ..
            } => {
                assert_eq!(attempt, expected_attempt);
                assert_eq!(max_attempts, 3);
                let expected_status = if expected_attempt == 3 {
                    BatchStatus::Failed
                } else {
                    BatchStatus::InProgress
                };
                assert_eq!(batch_status, expected_status);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    let fourth = session.request_batch(1).unwrap_err();
    assert_eq!(
        fourth.downcast_ref::<SessionError>(),
        Some(&SessionError::BatchFailed { index: 1, attempts: 3 })
    );

    let good = common::translate_batch(&session, 1)?;
    assert_eq!(error_kind(&session.submit_batch(1, &good).unwrap_err()), "batch_failed");
    assert_eq!(session.state().batch(1)?.retry_count, 3);
    Ok(())
}

/// Test that a header naming another batch is rejected even with matching ids
#[test]
fn test_submit_withWrongBatchHeader_shouldRejectBatchMismatch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(4),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;

    session.request_batch(2)?;
    let response = common::response(1, 2, &[("k3", "Trois"), ("k4", "Quatre")]);
    match session.submit_batch(2, &response)? {
        SubmitOutcome::Rejected { validation_errors, .. } => {
            let kinds: Vec<_> = validation_errors.iter().map(|e| e.kind).collect();
            assert_eq!(kinds, vec![ValidationErrorKind::BatchMismatch]);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    Ok(())
}

/// Test that missing and unexpected ids are reported together
#[test]
fn test_submit_withMissingAndExtraIds_shouldReportBoth() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(4),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;

    let response = common::response(1, 2, &[("k1", "Un"), ("k3", "Trois")]);
    match session.submit_batch(1, &response)? {
        SubmitOutcome::Rejected { validation_errors, .. } => {
            let missing = validation_errors
                .iter()
                .find(|e| e.kind == ValidationErrorKind::MissingEntries)
                .map(|e| e.ids.clone());
            let extra = validation_errors
                .iter()
                .find(|e| e.kind == ValidationErrorKind::ExtraEntries)
                .map(|e| e.ids.clone());
            assert_eq!(missing, Some(vec!["k2".to_string()]));
            assert_eq!(extra, Some(vec!["k3".to_string()]));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    Ok(())
}

/// Test that a changed placeholder is accepted with a warning
#[test]
fn test_submit_withAlteredPlaceholder_shouldAcceptWithWarning() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        "greet=Hello {{name}}\n",
        MockHandler::new().with_patterns(&[r"\{\{\w+\}\}"]),
        common::entry_count_config(5),
    )?;

    let response = common::response(1, 1, &[("greet", "Bonjour {{nom}}")]);
    match session.submit_batch(1, &response)? {
        SubmitOutcome::Accepted { warnings, .. } => {
            assert_eq!(warnings.len(), 1);
            assert_eq!(warnings[0].kind, ValidationErrorKind::PlaceholderWarning);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
    assert_eq!(session.state().batch(1)?.last_warnings.len(), 1);
    assert_eq!(session.state().translations["greet"], "Bonjour {{nom}}");
    Ok(())
}

/// Test that batches can be submitted out of order without a prior request
#[test]
fn test_submit_outOfOrder_shouldBeAccepted() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(6),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;

    let third = common::translate_batch(&session, 3)?;
    match session.submit_batch(3, &third)? {
        SubmitOutcome::Accepted { next_batch, .. } => assert_eq!(next_batch, Some(1)),
        other => panic!("expected acceptance, got {:?}", other),
    }

    let status = session.status();
    assert_eq!(status.batches.completed, 1);
    assert_eq!(status.batches.pending, 2);
    assert_eq!(status.completed_entries, 2);
    assert_eq!(status.percent_complete, 33.3);
    assert_eq!(status.remaining_batches, vec![1, 2]);
    assert_eq!(status.next_action, NextAction::RequestBatch { batch: 1 });
    Ok(())
}

/// Test that out-of-range indices are typed faults that change nothing
#[test]
fn test_requestBatch_withOutOfRangeIndex_shouldFault() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(3),
        MockHandler::new(),
        common::entry_count_config(5),
    )?;

    let before = session.state().clone();
    assert_eq!(error_kind(&session.request_batch(0).unwrap_err()), "batch_not_found");
    assert_eq!(error_kind(&session.request_batch(2).unwrap_err()), "batch_not_found");
    assert_eq!(error_kind(&session.submit_batch(9, "x").unwrap_err()), "batch_not_found");
    assert_eq!(session.state(), &before);
    Ok(())
}

/// Test finalize over completed, failed and pending batches
#[test]
fn test_finalize_withMixedStatuses_shouldFallBackToSource() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::entry_count_config(2);
    config.validation.max_attempts = 1;
    let (mut session, _) = common::create_session(temp_dir.path(), &common::mock_content(6), MockHandler::new(), config)?;

    let first = common::translate_batch(&session, 1)?;
    assert!(session.submit_batch(1, &first)?.is_accepted());

    let bad = common::response(2, 3, &[("k3", "Trois")]);
    assert!(!session.submit_batch(2, &bad)?.is_accepted());
    assert_eq!(session.state().batch(2)?.status, BatchStatus::Failed);

    let report = session.finalize()?;
    assert_eq!(report.total_entries, 6);
    assert_eq!(report.translated_entries, 2);
    assert_eq!(report.fallback_ids, vec!["k3", "k4", "k5", "k6"]);
    assert_eq!(report.incomplete_batches, vec![2, 3]);

    let output = std::fs::read_to_string(&report.output_path)?;
    assert_eq!(output, "k1=FR Text 1\nk2=FR Text 2\nk3=Text 3\nk4=Text 4\nk5=Text 5\nk6=Text 6\n");
    assert!(report.output_path.ends_with("fr_strings.mock"));
    assert!(session.state().finalized_at.is_some());
    Ok(())
}

/// Test that duplicate or unsafe ids are refused at init
#[test]
fn test_create_withInvalidIds_shouldRefuse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    let duplicate = common::create_session(temp_dir.path(), "a=1\na=2\n", MockHandler::new(), common::entry_count_config(5));
    assert_eq!(duplicate.err().map(|e| error_kind(&e)), Some("invalid_entry_id"));

    let bracket = common::create_session(temp_dir.path(), "a[0]=x\n", MockHandler::new(), common::entry_count_config(5));
    assert_eq!(bracket.err().map(|e| error_kind(&e)), Some("invalid_entry_id"));

    let empty = common::create_session(temp_dir.path(), "\n\n", MockHandler::new(), common::entry_count_config(5));
    assert!(empty.is_err());
    Ok(())
}
