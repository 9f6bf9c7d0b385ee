//! Runner configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Values load from a JSON file and can then be overridden by
//! `SCANFLOW_*` environment variables.

use crate::errors::{Result, ScanflowError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "SCANFLOW_";

/// Top-level runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory receiving archived artifacts and run records.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    /// Whether to compress the report directory in the post phase.
    #[serde(default)]
    pub compress_reports: bool,
    /// Compressor command template; `{output}` and `{dir}` are substituted.
    #[serde(default = "default_compress_command")]
    pub compress_command: String,
    /// Gate wait settings.
    #[serde(default)]
    pub gate: GateConfig,
    /// Budget for releasing one scoped resource.
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup_timeout_seconds: u64,
    /// Regexes selecting environment variables captured into the run snapshot.
    #[serde(default = "default_env_passthrough")]
    pub env_passthrough: Vec<String>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_compress_command() -> String {
    crate::notify::DEFAULT_COMPRESS_COMMAND.to_string()
}

fn default_cleanup_timeout() -> u64 {
    10
}

fn default_env_passthrough() -> Vec<String> {
    vec![
        "^BUILD_".to_string(),
        "^GIT_".to_string(),
        "^BRANCH_NAME$".to_string(),
        "^JOB_NAME$".to_string(),
    ]
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            compress_reports: false,
            compress_command: default_compress_command(),
            gate: GateConfig::default(),
            cleanup_timeout_seconds: default_cleanup_timeout(),
            env_passthrough: default_env_passthrough(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Gate wait configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Total time to wait for a verdict.
    #[serde(default = "default_gate_timeout")]
    pub timeout_seconds: u64,
    /// Delay between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Whether an unresolved or failed gate aborts the run.
    #[serde(default)]
    pub abort_on_timeout: bool,
}

fn default_gate_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_gate_timeout(),
            poll_interval_seconds: default_poll_interval(),
            abort_on_timeout: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ScanflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ScanflowError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScanflowError::Config(format!("invalid value '{value}' for {key}")))
}

impl RunnerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ScanflowError::Config(e.to_string()))
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScanflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Loads from an optional file, applies process environment overrides,
    /// and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, an override, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SCANFLOW_*` overrides from the given variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an override value does not parse.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "REPORT_DIR" => self.report_dir = PathBuf::from(value),
                "COMPRESS_REPORTS" => self.compress_reports = parse_env(&key, &value)?,
                "COMPRESS_COMMAND" => self.compress_command = value,
                "GATE_TIMEOUT_SECONDS" => self.gate.timeout_seconds = parse_env(&key, &value)?,
                "GATE_POLL_INTERVAL_SECONDS" => {
                    self.gate.poll_interval_seconds = parse_env(&key, &value)?;
                }
                "GATE_ABORT_ON_TIMEOUT" => self.gate.abort_on_timeout = parse_env(&key, &value)?,
                "CLEANUP_TIMEOUT_SECONDS" => {
                    self.cleanup_timeout_seconds = parse_env(&key, &value)?;
                }
                "ENV_PASSTHROUGH" => {
                    self.env_passthrough = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect();
                }
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_FORMAT" => self.logging.format = value.parse()?,
                _ => {}
            }
        }
        Ok(self)
    }

    /// Checks value ranges and that every passthrough pattern compiles.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.gate.poll_interval_seconds == 0 {
            return Err(ScanflowError::Config(
                "gate.poll_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.cleanup_timeout_seconds == 0 {
            return Err(ScanflowError::Config(
                "cleanup_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.compress_reports && !self.compress_command.contains("{output}") {
            return Err(ScanflowError::Config(
                "compress_command must contain {output}".to_string(),
            ));
        }
        self.env_patterns().map(|_| ())
    }

    /// Compiles the passthrough patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for the first invalid regex.
    pub fn env_patterns(&self) -> Result<Vec<Regex>> {
        self.env_passthrough
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| ScanflowError::Config(format!("invalid env pattern '{p}': {e}")))
            })
            .collect()
    }

    /// Returns the resource release budget.
    #[must_use]
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_seconds)
    }
}
