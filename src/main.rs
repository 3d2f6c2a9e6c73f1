// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use locbridge::app_config::{self, Config, EstimatorKind, ValidationMode};
use locbridge::batcher::{Batch, PlanStats};
use locbridge::errors::error_kind;
use locbridge::exchange::PromptTemplate;
use locbridge::file_utils::FileManager;
use locbridge::formats::FormatRegistry;
use locbridge::language_utils::parse_language_pair;
use locbridge::session::{NextAction, Session, SessionCreateParams, SessionStore, SubmitOutcome};

/// Exit code for lifecycle faults and I/O errors
const EXIT_FAULT: u8 = 1;

/// Exit code for a validator rejection
const EXIT_REJECTED: u8 = 2;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for ValidationMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliValidationMode {
    Strict,
    Lenient,
}

impl From<CliValidationMode> for ValidationMode {
    fn from(cli_mode: CliValidationMode) -> Self {
        match cli_mode {
            CliValidationMode::Strict => ValidationMode::Strict,
            CliValidationMode::Lenient => ValidationMode::Lenient,
        }
    }
}

/// CLI Wrapper for EstimatorKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliEstimator {
    Chars,
    None,
}

impl From<CliEstimator> for EstimatorKind {
    fn from(cli_estimator: CliEstimator) -> Self {
        match cli_estimator {
            CliEstimator::Chars => EstimatorKind::Chars,
            CliEstimator::None => EstimatorKind::None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a file, plan batches and create a session
    Init(InitArgs),

    /// Resume or create a session and print its next batch with a status line
    Oneshot(OneshotArgs),

    /// Print the exchange text for one batch
    Batch {
        /// Session state file (.loc-<id>.json)
        #[arg(value_name = "SESSION")]
        session: PathBuf,

        /// 1-based batch index
        #[arg(value_name = "INDEX")]
        index: usize,

        /// Wrap the request in translation instructions
        #[arg(long)]
        with_prompt: bool,
    },

    /// Validate and record an agent response for one batch
    Submit {
        /// Session state file (.loc-<id>.json)
        #[arg(value_name = "SESSION")]
        session: PathBuf,

        /// 1-based batch index
        #[arg(value_name = "INDEX")]
        index: usize,

        /// Response file, or '-' for stdin
        #[arg(short, long, value_name = "FILE")]
        patch: PathBuf,
    },

    /// Show session progress
    Status {
        /// Session state file (.loc-<id>.json)
        #[arg(value_name = "SESSION")]
        session: PathBuf,
    },

    /// Write the output file, using source text for untranslated entries
    Finalize {
        /// Session state file (.loc-<id>.json)
        #[arg(value_name = "SESSION")]
        session: PathBuf,
    },

    /// List supported formats
    Formats,

    /// List session files under a directory
    Sessions {
        /// Directory to search
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Search subdirectories too
        #[arg(short, long)]
        recursive: bool,
    },

    /// Generate shell completions for locbridge
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Localization file to translate
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Language pair 'src>tgt' (quote it), or a bare target meaning 'en>tgt'
    #[arg(short, long, value_name = "PAIR")]
    lang: String,

    /// Output file (default: <tgt>_<name> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Format name, detected from the file when omitted
    #[arg(short, long)]
    format: Option<String>,

    /// Upper bound of estimated output tokens per batch
    #[arg(long, env = "LOCBRIDGE_TARGET_TOKENS")]
    target_tokens: Option<usize>,

    /// Context entries on each side of a batch
    #[arg(long)]
    context_window: Option<usize>,

    /// Token estimator used for planning
    #[arg(long, value_enum)]
    estimator: Option<CliEstimator>,

    /// Structural validation strictness
    #[arg(long, value_enum)]
    mode: Option<CliValidationMode>,

    /// Rejections before a batch fails
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Parser, Debug)]
struct OneshotArgs {
    #[command(flatten)]
    init: InitArgs,

    /// Batch to print instead of the next suggested one
    #[arg(short, long, value_name = "INDEX")]
    batch: Option<usize>,

    /// Start a new session even if one exists for this file
    #[arg(long)]
    new: bool,
}

/// locbridge - batch/session bridge for agent-driven localization
///
/// Splits a localization file into batches an agent can translate, validates
/// every response and merges accepted translations into the output file.
#[derive(Parser, Debug)]
#[command(name = "locbridge")]
#[command(version)]
#[command(about = "Batch/session bridge between localization files and a translation agent")]
#[command(long_about = "locbridge drives a translation agent through a localization file one batch at a time.

EXAMPLES:
    locbridge init app.json --lang 'en>fr'        # Create a session
    locbridge oneshot app.json --lang fr          # Next batch plus a #STATUS line
    locbridge batch .loc-1a2b-3c4d5e6f.json 1     # Print batch 1
    locbridge batch .loc-1a2b-3c4d5e6f.json 1 --with-prompt
    locbridge submit .loc-1a2b-3c4d5e6f.json 1 --patch reply.txt
    cat reply.txt | locbridge submit .loc-1a2b-3c4d5e6f.json 1 --patch -
    locbridge status .loc-1a2b-3c4d5e6f.json      # Progress and next step
    locbridge finalize .loc-1a2b-3c4d5e6f.json    # Write fr_app.json
    locbridge completions bash > locbridge.bash   # Generate bash completions

OUTPUT:
    Every command prints one JSON object on stdout, except 'batch' which
    prints the exchange text. Logs go to stderr. Exit code 1 means a fault,
    2 means the submitted response was rejected.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LOCBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Set logging level
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            // stdout carries the JSON result
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Result of a command: what to print and how to exit
enum CommandOutput {
    Json(Value),
    Text(String),
    Rejected(Value),
    Nothing,
}

fn main() -> ExitCode {
    // Install the logger once; the effective level is the global max level,
    // updated after the config is loaded
    let _ = CustomLogger::init(LevelFilter::Trace);
    log::set_max_level(LevelFilter::Info);

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    match run(cli) {
        Ok(CommandOutput::Json(value)) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Ok(CommandOutput::Text(text)) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Ok(CommandOutput::Rejected(value)) => {
            print_json(&value);
            ExitCode::from(EXIT_REJECTED)
        }
        Ok(CommandOutput::Nothing) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            print_json(&json!({
                "status": "error",
                "error_type": error_kind(&e),
                "message": format!("{:#}", e),
            }));
            ExitCode::from(EXIT_FAULT)
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

/// Serialize `report` behind a leading `"status": "ok"`
fn ok_json<T: Serialize>(report: &T) -> Result<Value> {
    let mut map = Map::new();
    map.insert("status".to_string(), Value::from("ok"));
    match serde_json::to_value(report).context("Failed to serialize result")? {
        Value::Object(fields) => map.extend(fields),
        other => {
            map.insert("result".to_string(), other);
        }
    }
    Ok(Value::Object(map))
}

/// Load the config file when given, then apply the log level
fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let mut config = match &options.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    // Just update the max level without reinitializing the logger
    log::set_max_level(config.log_level.into());

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn run(cli: CommandLineOptions) -> Result<CommandOutput> {
    let config = load_config(&cli)?;
    let registry = FormatRegistry::with_builtin();

    match cli.command {
        Commands::Init(args) => run_init(args, config, &registry),
        Commands::Oneshot(args) => run_oneshot(args, config, &registry),
        Commands::Batch {
            session,
            index,
            with_prompt,
        } => {
            let mut session = Session::load(&session, &registry)?;
            let request = session.request_batch(index)?;
            if with_prompt {
                let batch = &session.state().batch(index)?.batch;
                let prompt = PromptTemplate::default().render(batch, &session.state().languages(), &request.text);
                Ok(CommandOutput::Text(prompt))
            } else {
                Ok(CommandOutput::Text(request.text))
            }
        }
        Commands::Submit { session, index, patch } => {
            let candidate = read_patch(&patch)?;
            let mut session = Session::load(&session, &registry)?;
            match session.submit_batch(index, &candidate)? {
                outcome @ SubmitOutcome::Accepted { .. } => Ok(CommandOutput::Json(
                    serde_json::to_value(&outcome).context("Failed to serialize result")?,
                )),
                outcome @ SubmitOutcome::Rejected { .. } => Ok(CommandOutput::Rejected(
                    serde_json::to_value(&outcome).context("Failed to serialize result")?,
                )),
            }
        }
        Commands::Status { session } => {
            let session = Session::load(&session, &registry)?;
            Ok(CommandOutput::Json(ok_json(&session.status())?))
        }
        Commands::Finalize { session } => {
            let mut session = Session::load(&session, &registry)?;
            Ok(CommandOutput::Json(ok_json(&session.finalize()?)?))
        }
        Commands::Formats => Ok(CommandOutput::Json(json!({
            "status": "ok",
            "formats": registry.list(),
        }))),
        Commands::Sessions { dir, recursive } => {
            let sessions = SessionStore::list(&dir, recursive)?;
            Ok(CommandOutput::Json(json!({
                "status": "ok",
                "count": sessions.len(),
                "sessions": sessions,
            })))
        }
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "locbridge", &mut std::io::stdout());
            Ok(CommandOutput::Nothing)
        }
    }
}

/// Session parameters from `init` options layered over the config
fn create_params(args: InitArgs, mut config: Config) -> Result<SessionCreateParams> {
    let languages = parse_language_pair(&args.lang)?;

    // Override config with CLI options if provided
    if let Some(target_tokens) = args.target_tokens {
        config.batching.target_tokens = target_tokens;
    }
    if let Some(context_window) = args.context_window {
        config.batching.context_window = context_window;
    }
    if let Some(estimator) = args.estimator {
        config.batching.estimator = estimator.into();
    }
    if let Some(mode) = args.mode {
        config.validation.mode = mode.into();
    }
    if let Some(max_attempts) = args.max_attempts {
        config.validation.max_attempts = max_attempts;
    }

    let mut params = SessionCreateParams::new(&args.input_path, languages, config);
    if let Some(output) = args.output {
        params = params.with_output(output);
    }
    if let Some(format) = args.format {
        params = params.with_format(format);
    }
    Ok(params)
}

fn run_init(args: InitArgs, config: Config, registry: &FormatRegistry) -> Result<CommandOutput> {
    let params = create_params(args, config)?;
    let session = Session::create(params, registry)?;
    let state = session.state();
    let batches: Vec<Batch> = state.batches.iter().map(|r| r.batch.clone()).collect();

    Ok(CommandOutput::Json(json!({
        "status": "ok",
        "session_file": session.state_path(),
        "session_id": state.session_id,
        "format": state.format,
        "source_language": state.source_language,
        "target_language": state.target_language,
        "input_path": state.input_path,
        "output_path": state.output_path,
        "total_entries": state.total_entries,
        "total_batches": state.total_batches(),
        "plan": PlanStats::from_batches(&batches),
        "next_action": session.status().next_action,
    })))
}

fn run_oneshot(args: OneshotArgs, config: Config, registry: &FormatRegistry) -> Result<CommandOutput> {
    let params = create_params(args.init, config)?;
    let (mut session, created) = Session::resume_or_create(params, registry, args.new)?;

    let index = match (args.batch, session.status().next_action) {
        (Some(index), _) => index,
        (None, NextAction::RequestBatch { batch }) => batch,
        (None, NextAction::Finalize) => {
            return Ok(CommandOutput::Json(json!({
                "status": "ok",
                "type": "ready_to_finalize",
                "session_id": session.session_id(),
                "session_file": session.state_path(),
                "next_action": NextAction::Finalize,
            })));
        }
    };

    let request = session.request_batch(index)?;
    let status = json!({
        "session_id": session.session_id(),
        "session_file": session.state_path(),
        "created": created,
        "batch": request.batch,
        "total_batches": request.total_batches,
        "batch_status": request.batch_status,
        "retry_count": request.retry_count,
        "next_action": "translate",
    });
    Ok(CommandOutput::Text(format!("{}\n#STATUS:{}", request.text, status)))
}

/// Read a response from a file or stdin; empty responses are refused
fn read_patch(path: &Path) -> Result<String> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read response from stdin")?;
        buffer
    } else {
        if !FileManager::file_exists(path) {
            return Err(anyhow!("Patch file not found: {:?}", path));
        }
        FileManager::read_to_string(path)?
    };

    if content.trim().is_empty() {
        return Err(anyhow!("Patch is empty: {:?}", path));
    }
    debug!("Read {} bytes of response from {:?}", content.len(), path);
    Ok(content)
}
