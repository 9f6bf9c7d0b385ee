//! Command step description and captured output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One external command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Environment variables bound to run credentials, by credential name.
    ///
    /// Values are looked up when the command runs and never stored here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credential_env: BTreeMap<String, String>,
    /// Working directory. Defaults to the run workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Kill the command if it runs longer than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// A non-zero exit does not fail the enclosing stage (`cmd || true`).
    #[serde(default)]
    pub allow_failure: bool,
}

impl CommandSpec {
    /// Creates a command for a program with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            credential_env: BTreeMap::new(),
            cwd: None,
            timeout: None,
            allow_failure: false,
        }
    }

    /// Creates a `sh -c` command.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the command as allowed to fail.
    #[must_use]
    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    /// Exposes the run credential `credential` to the command as `var`.
    #[must_use]
    pub fn env_credential(mut self, var: impl Into<String>, credential: impl Into<String>) -> Self {
        self.credential_env.insert(var.into(), credential.into());
        self
    }

    /// Anchors the working directory to `workspace`.
    #[must_use]
    pub fn resolve_cwd(mut self, workspace: &Path) -> Self {
        self.cwd = Some(match self.cwd.take() {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => workspace.join(dir),
            None => workspace.to_path_buf(),
        });
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

impl CommandOutput {
    /// Creates an output with the given exit code and empty streams.
    #[must_use]
    pub fn with_code(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            ..Self::default()
        }
    }

    /// Sets captured standard output.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Sets captured standard error.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Returns true if the command exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns the exit code, mapping signal termination to -1.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let spec = CommandSpec::new("semgrep")
            .args(["--config", "auto"])
            .arg("--json")
            .env("SEMGREP_SEND_METRICS", "off")
            .allow_failure();

        assert_eq!(spec.to_string(), "semgrep --config auto --json");
        assert!(spec.allow_failure);
        assert_eq!(spec.env.get("SEMGREP_SEND_METRICS").map(String::as_str), Some("off"));

        let shell = CommandSpec::shell("mvn -B package");
        assert_eq!(shell.to_string(), "sh -c 'mvn -B package'");
    }

    #[test]
    fn test_resolve_cwd() {
        let ws = Path::new("/ws");
        assert_eq!(
            CommandSpec::new("ls").resolve_cwd(ws).cwd,
            Some(PathBuf::from("/ws"))
        );
        assert_eq!(
            CommandSpec::new("ls").cwd("app").resolve_cwd(ws).cwd,
            Some(PathBuf::from("/ws/app"))
        );
        assert_eq!(
            CommandSpec::new("ls").cwd("/tmp").resolve_cwd(ws).cwd,
            Some(PathBuf::from("/tmp"))
        );
    }

    #[test]
    fn test_credential_binding_carries_names_only() {
        let spec = CommandSpec::new("git")
            .arg("fetch")
            .env_credential("GIT_PASSWORD", "GIT_TOKEN");

        assert_eq!(spec.to_string(), "git fetch");
        assert_eq!(
            spec.credential_env.get("GIT_PASSWORD").map(String::as_str),
            Some("GIT_TOKEN")
        );
        assert!(spec.env.is_empty());
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains(r#""credential_env":{"GIT_PASSWORD":"GIT_TOKEN"}"#));
        assert!(!serde_json::to_string(&CommandSpec::new("ls")).unwrap().contains("credential_env"));
    }

    #[test]
    fn test_output_code() {
        assert!(CommandOutput::with_code(0).success());
        assert!(!CommandOutput::with_code(2).success());
        assert_eq!(CommandOutput::default().code(), -1);
    }
}
