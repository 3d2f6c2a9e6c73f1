/*!
 * End-to-end tests over the built-in file formats
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use locbridge::app_config::Config;
use locbridge::exchange::codec;
use locbridge::formats::FormatRegistry;
use locbridge::language_utils::{LanguagePair, parse_language_pair};
use locbridge::session::{NextAction, Session, SessionCreateParams, SubmitOutcome};

use crate::common;

const SRT: &str = "1
00:00:01,000 --> 00:00:03,000
Good morning.

2
00:00:04,000 --> 00:00:06,000
<i>How are you?</i>

3
00:00:07,000 --> 00:00:09,000
Fine, thanks.
See you later.
";

/// Answer a request text by prefixing every translate line
fn answer(request: &str) -> Result<String> {
    let decoded = codec::decode(request)?;
    let (index, total) = match decoded.header {
        codec::Header::Request(header) => (header.batch_index, header.total_batches),
        codec::Header::Response(_) => anyhow::bail!("expected a request"),
    };
    let pairs: Vec<(String, String)> = decoded
        .entries
        .into_iter()
        .map(|e| (e.id, format!("[fr] {}", e.text)))
        .collect();
    Ok(codec::encode_response(
        &codec::ResponseHeader::ok(index, total, pairs.len()),
        &pairs,
    ))
}

/// Request, answer and submit every batch, loading the session once per step as the CLI does
fn drive_to_completion(state_path: &Path, registry: &FormatRegistry) -> Result<()> {
    loop {
        let mut session = Session::load(state_path, registry)?;
        let NextAction::RequestBatch { batch } = session.status().next_action else {
            return Ok(());
        };
        let request = session.request_batch(batch)?;
        let outcome = session.submit_batch(batch, &answer(&request.text)?)?;
        assert!(matches!(outcome, SubmitOutcome::Accepted { .. }), "{:?}", outcome);
    }
}

/// Create a default en>fr session over `content` and translate all of it
fn translate_file(filename: &str, content: &str) -> Result<(String, TempDir)> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), filename, content)?;
    let registry = FormatRegistry::with_builtin();

    let params = SessionCreateParams::new(&input, LanguagePair::new("en", "fr"), Config::default());
    let session = Session::create(params, &registry)?;
    drive_to_completion(session.state_path(), &registry)?;

    let report = Session::load(session.state_path(), &registry)?.finalize()?;
    assert_eq!(report.fallback_entries, 0);
    Ok((fs::read_to_string(&report.output_path)?, temp_dir))
}

/// Test a full SRT session driven by request/answer/submit until finalize
#[test]
fn test_srtSession_withAllBatchesTranslated_shouldWriteTranslatedFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "movie.srt", SRT)?;
    let registry = FormatRegistry::with_builtin();

    let mut config = Config::default();
    config.batching.target_tokens = 30;
    let params = SessionCreateParams::new(&input, parse_language_pair("en>fr")?, config);
    let session = Session::create(params, &registry)?;
    let state_path = session.state_path().to_path_buf();
    assert_eq!(session.state().format, "srt");
    assert!(session.state().total_batches() > 1);

    drive_to_completion(&state_path, &registry)?;

    let mut session = Session::load(&state_path, &registry)?;
    let report = session.finalize()?;
    assert_eq!(report.fallback_entries, 0);
    assert!(report.output_path.ends_with("fr_movie.srt"));

    let output = fs::read_to_string(&report.output_path)?;
    assert_eq!(
        output,
        "1
00:00:01,000 --> 00:00:03,000
[fr] Good morning.

2
00:00:04,000 --> 00:00:06,000
[fr] <i>How are you?</i>

3
00:00:07,000 --> 00:00:09,000
[fr] Fine, thanks.
See you later.
"
    );
    Ok(())
}

/// Test a JSON session with an explicit output path and partial progress
#[test]
fn test_jsonSession_withPartialProgress_shouldMergeAndKeepStructure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = r#"{
  "@@locale": "en",
  "home": {"title": "Welcome {name}", "visits": 3},
  "menu": ["Open", "Save"]
}"#;
    let input = common::create_test_file(temp_dir.path(), "app.json", source)?;
    let output = temp_dir.path().join("out").join("app.fr.json");
    let registry = FormatRegistry::with_builtin();

    let mut config = Config::default();
    config.batching.estimator = locbridge::app_config::EstimatorKind::None;
    config.batching.fallback_batch_size = 2;
    let params = SessionCreateParams::new(&input, LanguagePair::new("en", "fr"), config).with_output(&output);
    let mut session = Session::create(params, &registry)?;

    let first = session.request_batch(1)?;
    assert!(first.text.contains("[home.title] Welcome {name}"));
    assert!(!first.text.contains("@context_before"));
    let outcome = session.submit_batch(1, &common::response(1, 2, &[("home.title", "Bienvenue {name}"), ("menu.0", "Ouvrir")]))?;
    assert!(outcome.is_accepted());

    let report = session.finalize()?;
    assert_eq!(report.output_path, output);
    assert_eq!(report.fallback_ids, vec!["menu.1"]);

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert_eq!(value["@@locale"], "fr");
    assert_eq!(value["home"]["title"], "Bienvenue {name}");
    assert_eq!(value["home"]["visits"], 3);
    assert_eq!(value["menu"][0], "Ouvrir");
    assert_eq!(value["menu"][1], "Save");
    Ok(())
}

/// Test that an explicit format overrides detection
#[test]
fn test_create_withFormatOverride_shouldUseNamedHandler() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "subs.txt", SRT)?;
    let registry = FormatRegistry::with_builtin();

    let params = SessionCreateParams::new(&input, LanguagePair::new("en", "de"), Config::default()).with_format("srt");
    let session = Session::create(params, &registry)?;
    assert_eq!(session.state().format, "srt");
    assert_eq!(session.entries().len(), 3);

    let wrong = SessionCreateParams::new(&input, LanguagePair::new("en", "de"), Config::default()).with_format("json");
    assert!(Session::create(wrong, &registry).is_err());
    Ok(())
}

/// Test a gettext catalog session keeps comments and localizes the header
#[test]
fn test_poSession_withAllBatchesTranslated_shouldFillMsgstr() -> Result<()> {
    let source = r#"msgid ""
msgstr ""
"Language: en\n"

#: src/app.c:10
msgid "Open file"
msgstr ""

msgctxt "menu"
msgid "Save %s"
msgstr ""
"#;
    let (output, _dir) = translate_file("messages.po", source)?;

    assert!(output.contains("\"Language: fr\\n\""));
    assert!(output.contains("#: src/app.c:10\nmsgid \"Open file\"\nmsgstr \"[fr] Open file\"\n"));
    assert!(output.contains("msgctxt \"menu\"\nmsgid \"Save %s\"\nmsgstr \"[fr] Save %s\"\n"));
    Ok(())
}

/// Test an Android resource session including plurals and arrays
#[test]
fn test_androidSession_withAllBatchesTranslated_shouldRewriteResources() -> Result<()> {
    let source = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name" translatable="false">Demo</string>
    <string name="welcome">Welcome, %1$s!</string>
    <plurals name="files">
        <item quantity="one">%d file</item>
        <item quantity="other">%d files</item>
    </plurals>
</resources>
"#;
    let (output, _dir) = translate_file("strings.xml", source)?;

    assert!(output.contains("<string name=\"app_name\" translatable=\"false\">Demo</string>"));
    assert!(output.contains("<string name=\"welcome\">[fr] Welcome, %1$s!</string>"));
    assert!(output.contains("<item quantity=\"other\">[fr] %d files</item>"));
    Ok(())
}

/// Test that .strings, YAML and ARB files go through a session unchanged in shape
#[test]
fn test_keyValueSessions_withAllBatchesTranslated_shouldRebuildFiles() -> Result<()> {
    let (strings, _dir) = translate_file("Localizable.strings", "/* Title */\n\"title\" = \"Home\";\n")?;
    assert_eq!(strings, "/* Title */\n\"title\" = \"[fr] Home\";\n\n");

    let (yaml, _dir) = translate_file("en.yml", "en:\n  title: Home\n  count: 2\n")?;
    let value: serde_yaml::Value = serde_yaml::from_str(&yaml)?;
    assert_eq!(value["en"]["title"], serde_yaml::Value::from("[fr] Home"));
    assert_eq!(value["en"]["count"], serde_yaml::Value::from(2));

    let (arb, _dir) = translate_file("app_en.arb", r#"{"@@locale": "en", "title": "Home", "@title": {"description": "Tab"}}"#)?;
    let value: serde_json::Value = serde_json::from_str(&arb)?;
    assert_eq!(value["@@locale"], "fr");
    assert_eq!(value["title"], "[fr] Home");
    assert_eq!(value["@title"]["description"], "Tab");
    Ok(())
}
