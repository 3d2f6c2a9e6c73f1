use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::batcher::DEFAULT_FALLBACK_BATCH_SIZE;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and applying command line overrides.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Batch planning settings
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Response validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How tokens are counted while planning
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    // @estimator: chars / 4
    #[default]
    Chars,
    // @estimator: none, plan by entry count
    None,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chars => write!(f, "chars"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chars" => Ok(Self::Chars),
            "none" => Ok(Self::None),
            _ => Err(anyhow!("Invalid estimator: {}", s)),
        }
    }
}

/// Strictness of the structural validation stage
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    // @mode: terminator must close the response
    #[default]
    Strict,
    // @mode: text after the terminator is ignored
    Lenient,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(anyhow!("Invalid validation mode: {}", s)),
        }
    }
}

/// Batch planning configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchingConfig {
    // @field: Upper bound of estimated output tokens per batch
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,

    // @field: Context entries on each side of a batch
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    // @field: Entries per batch without an estimator
    #[serde(default = "default_fallback_batch_size")]
    pub fallback_batch_size: usize,

    // @field: Token estimator
    #[serde(default)]
    pub estimator: EstimatorKind,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            context_window: default_context_window(),
            fallback_batch_size: default_fallback_batch_size(),
            estimator: EstimatorKind::default(),
        }
    }
}

/// Validation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationConfig {
    // @field: Structural strictness
    #[serde(default)]
    pub mode: ValidationMode,

    // @field: Rejections before a batch fails
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_target_tokens() -> usize {
    5000
}

fn default_context_window() -> usize {
    10
}

fn default_fallback_batch_size() -> usize {
    DEFAULT_FALLBACK_BATCH_SIZE
}

fn default_max_attempts() -> u32 {
    3
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.batching.target_tokens == 0 {
            return Err(anyhow!("batching.target_tokens must be greater than zero"));
        }
        if self.batching.fallback_batch_size == 0 {
            return Err(anyhow!("batching.fallback_batch_size must be greater than zero"));
        }
        if self.validation.max_attempts == 0 {
            return Err(anyhow!("validation.max_attempts must be at least 1"));
        }
        Ok(())
    }
}
