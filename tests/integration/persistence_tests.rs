/*!
 * Integration tests for state persistence across invocations
 */

use anyhow::Result;
use std::fs;

use locbridge::errors::error_kind;
use locbridge::language_utils::LanguagePair;
use locbridge::session::{BatchStatus, Session, SessionCreateParams, SessionStore};

use crate::common::{self, MockHandler};

/// Test that every mutation is visible to a fresh load
#[test]
fn test_load_afterMutations_shouldSeePersistedState() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (mut session, registry) = common::create_session(
        temp_dir.path(),
        &common::mock_content(4),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;
    let state_path = session.state_path().to_path_buf();

    session.request_batch(1)?;
    let reloaded = Session::load(&state_path, &registry)?;
    assert_eq!(reloaded.state().batch(1)?.status, BatchStatus::InProgress);

    let response = common::translate_batch(&session, 1)?;
    assert!(session.submit_batch(1, &response)?.is_accepted());

    let reloaded = Session::load(&state_path, &registry)?;
    assert_eq!(reloaded.state().batch(1)?.status, BatchStatus::Completed);
    assert_eq!(reloaded.state().translations.len(), 2);
    assert_eq!(reloaded.state(), session.state());

    let mut reloaded = reloaded;
    let bad = common::response(2, 2, &[("k3", "Trois")]);
    assert!(!reloaded.submit_batch(2, &bad)?.is_accepted());
    let again = SessionStore::load(&state_path)?;
    assert_eq!(again.batch(2)?.retry_count, 1);
    assert_eq!(again.batch(2)?.last_errors.len(), 1);
    Ok(())
}

/// Test that a missing state file is a typed fault
#[test]
fn test_load_withMissingFile_shouldReturnSessionNotFound() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let registry = common::registry_with(MockHandler::new());

    let error = Session::load(temp_dir.path().join(".loc-0000-00000000.json"), &registry)
        .err()
        .map(|e| error_kind(&e));
    assert_eq!(error, Some("session_not_found"));
    Ok(())
}

/// Test that editing the input after init is detected on load
#[test]
fn test_load_withModifiedInput_shouldReturnSourceChanged() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (session, registry) = common::create_session(
        temp_dir.path(),
        &common::mock_content(3),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;
    let state_path = session.state_path().to_path_buf();
    let before = fs::read_to_string(&state_path)?;

    fs::write(temp_dir.path().join("strings.mock"), "k1=Changed\n")?;

    let error = Session::load(&state_path, &registry).err().map(|e| error_kind(&e));
    assert_eq!(error, Some("source_changed"));
    assert_eq!(fs::read_to_string(&state_path)?, before);
    Ok(())
}

/// Test that a tampered state file is refused
#[test]
fn test_load_withTamperedTranslations_shouldReturnInternalConsistency() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (session, registry) = common::create_session(
        temp_dir.path(),
        &common::mock_content(3),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;
    let state_path = session.state_path().to_path_buf();

    let mut state = SessionStore::load(&state_path)?;
    state.translations.insert("k1".into(), "Stray".into());
    SessionStore::save(&state_path, &state)?;

    let error = Session::load(&state_path, &registry).err().map(|e| error_kind(&e));
    assert_eq!(error, Some("internal_consistency"));
    Ok(())
}

/// Test that the settings captured at init survive config changes
#[test]
fn test_load_shouldKeepSettingsFromInit() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::entry_count_config(2);
    config.validation.max_attempts = 5;
    let (session, registry) = common::create_session(temp_dir.path(), &common::mock_content(3), MockHandler::new(), config)?;

    let reloaded = Session::load(session.state_path(), &registry)?;
    assert_eq!(reloaded.state().settings.max_attempts, 5);
    assert_eq!(reloaded.state().settings.fallback_batch_size, 2);
    assert_eq!(reloaded.state().format, "mock");
    Ok(())
}

/// Test that session listing finds state files and skips broken ones
#[test]
fn test_list_withSessionsAndJunk_shouldSummarizeValidFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (session, _) = common::create_session(
        temp_dir.path(),
        &common::mock_content(3),
        MockHandler::new(),
        common::entry_count_config(2),
    )?;
    common::create_test_file(temp_dir.path(), ".loc-broken.json", "{ not json")?;
    common::create_test_file(temp_dir.path(), "other.json", "{}")?;

    let summaries = SessionStore::list(temp_dir.path(), false)?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, session.session_id());
    assert_eq!(summaries[0].total_batches, 2);
    assert_eq!(summaries[0].languages, "en>fr");
    assert!(!summaries[0].finalized);
    Ok(())
}

/// Test that oneshot-style startup picks up the session for the same file and pair
#[test]
fn test_resumeOrCreate_withExistingSession_shouldResumeUnlessFresh() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::entry_count_config(2);
    let (mut session, registry) =
        common::create_session(temp_dir.path(), &common::mock_content(3), MockHandler::new(), config.clone())?;
    session.request_batch(1)?;
    let input = temp_dir.path().join("strings.mock");

    let params = SessionCreateParams::new(&input, LanguagePair::new("en", "fr"), config.clone());
    let (resumed, created) = Session::resume_or_create(params, &registry, false)?;
    assert!(!created);
    assert_eq!(resumed.session_id(), session.session_id());
    assert_eq!(resumed.state().batch(1)?.status, BatchStatus::InProgress);

    let params = SessionCreateParams::new(&input, LanguagePair::new("en", "de"), config.clone());
    let (german, created) = Session::resume_or_create(params, &registry, false)?;
    assert!(created);
    assert_ne!(german.session_id(), session.session_id());

    let params = SessionCreateParams::new(&input, LanguagePair::new("en", "fr"), config);
    let (fresh, created) = Session::resume_or_create(params, &registry, true)?;
    assert!(created);
    assert_ne!(fresh.session_id(), session.session_id());
    assert_eq!(SessionStore::list(temp_dir.path(), false)?.len(), 3);
    Ok(())
}
