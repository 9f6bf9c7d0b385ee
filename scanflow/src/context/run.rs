//! Immutable run-wide context shared with every stage.

use super::RunIdentity;
use crate::config::RunnerConfig;
use crate::errors::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Mask written in place of secret values.
pub const REDACTED: &str = "****";

/// A secret value. Never printed, never serialized.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value, for handing to a child process.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Named credentials available to a run.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    entries: BTreeMap<String, Secret>,
}

impl Credentials {
    /// Creates an empty credential set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a credential.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), Secret::new(value));
    }

    /// Looks up a credential.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.entries.get(name)
    }

    /// Returns the credential names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Returns true if there are no credentials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces every occurrence of a credential value in `text` with [`REDACTED`].
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Longest first so a secret containing another is masked whole.
        let mut values: Vec<&str> = self
            .entries
            .values()
            .map(Secret::expose)
            .filter(|v| !v.is_empty())
            .collect();
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));
        for value in values {
            if out.contains(value) {
                out = out.replace(value, REDACTED);
            }
        }
        out
    }
}

/// Serializable view of the run environment, recorded in the run record.
///
/// Carries credential names only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// The run workspace.
    pub workspace: PathBuf,
    /// Names of the credentials bound to the run.
    #[serde(default)]
    pub credential_names: Vec<String>,
    /// Captured environment variables.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// The immutable context of a pipeline run.
///
/// Built once before execution and shared as `Arc<RunContext>` with every
/// stage, guard, resource, and post action.
#[derive(Debug, Clone)]
pub struct RunContext {
    identity: RunIdentity,
    pipeline_name: String,
    workspace: PathBuf,
    report_dir: PathBuf,
    credentials: Credentials,
    variables: BTreeMap<String, String>,
}

impl RunContext {
    /// Starts building a run context for the named pipeline.
    #[must_use]
    pub fn builder(pipeline_name: impl Into<String>) -> RunContextBuilder {
        RunContextBuilder::new(pipeline_name)
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Returns the workspace directory.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Returns the report directory. Relative paths resolve against the workspace.
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        if self.report_dir.is_absolute() {
            self.report_dir.clone()
        } else {
            self.workspace.join(&self.report_dir)
        }
    }

    /// Returns the run credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns a captured environment variable.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Returns every captured environment variable.
    #[must_use]
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Returns the serializable environment snapshot.
    #[must_use]
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            workspace: self.workspace.clone(),
            credential_names: self.credentials.names(),
            variables: self.variables.clone(),
        }
    }

    /// Masks credential values in captured output.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        self.credentials.redact(text)
    }
}

/// Builder for [`RunContext`].
#[derive(Debug)]
pub struct RunContextBuilder {
    identity: RunIdentity,
    pipeline_name: String,
    workspace: PathBuf,
    report_dir: PathBuf,
    credentials: Credentials,
    variables: BTreeMap<String, String>,
}

impl RunContextBuilder {
    /// Creates a builder with a fresh identity, the current directory as
    /// workspace, and `reports` as report directory.
    #[must_use]
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            identity: RunIdentity::new(),
            pipeline_name: pipeline_name.into(),
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            report_dir: PathBuf::from("reports"),
            credentials: Credentials::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Applies runner configuration: the report directory, and the process
    /// environment variables selected by `env_passthrough`.
    pub fn with_config(self, config: &RunnerConfig) -> Result<Self> {
        let patterns = config.env_patterns()?;
        Ok(self.report_dir(&config.report_dir).capture_env(&patterns))
    }

    /// Sets the run identity.
    #[must_use]
    pub fn identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the workspace directory.
    #[must_use]
    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Sets the report directory.
    #[must_use]
    pub fn report_dir(mut self, report_dir: impl Into<PathBuf>) -> Self {
        self.report_dir = report_dir.into();
        self
    }

    /// Binds a credential.
    #[must_use]
    pub fn credential(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(name, value);
        self
    }

    /// Sets an environment variable in the snapshot.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Captures process environment variables whose names match any pattern.
    #[must_use]
    pub fn capture_env(self, patterns: &[Regex]) -> Self {
        self.capture_from(std::env::vars(), patterns)
    }

    /// Captures variables from an explicit source whose names match any pattern.
    #[must_use]
    pub fn capture_from<I>(mut self, vars: I, patterns: &[Regex]) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if patterns.iter().any(|p| p.is_match(&name)) {
                self.variables.insert(name, value);
            }
        }
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RunContext {
        RunContext {
            identity: self.identity,
            pipeline_name: self.pipeline_name,
            workspace: self.workspace,
            report_dir: self.report_dir,
            credentials: self.credentials,
            variables: self.variables,
        }
    }
}
