//! Adapters for the tools a security pipeline wraps.

use super::ExitCodeTable;
use crate::context::RunContext;
use crate::core::FailurePolicy;
use crate::process::CommandSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The category of a wrapped tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Version control checkout.
    Checkout,
    /// Build and test invocation.
    Build,
    /// Static analysis.
    StaticAnalysis,
    /// Dependency vulnerability scan.
    DependencyScan,
    /// Container image build.
    ImageBuild,
    /// Container image vulnerability scan.
    ImageScan,
    /// Secret scan.
    SecretScan,
    /// Dynamic scan of a running application.
    DynamicScan,
}

impl ToolKind {
    /// The failure policy a stage wrapping this kind gets by default.
    ///
    /// Dynamic scans are fatal: their table already maps findings to
    /// `unstable`, so only the fatal exit codes fail the stage.
    #[must_use]
    pub fn default_policy(self) -> FailurePolicy {
        match self {
            Self::Checkout | Self::Build | Self::ImageBuild | Self::DynamicScan => {
                FailurePolicy::Fatal
            }
            Self::StaticAnalysis | Self::DependencyScan | Self::ImageScan | Self::SecretScan => {
                FailurePolicy::BestEffort
            }
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Checkout => "checkout",
            Self::Build => "build",
            Self::StaticAnalysis => "static_analysis",
            Self::DependencyScan => "dependency_scan",
            Self::ImageBuild => "image_build",
            Self::ImageScan => "image_scan",
            Self::SecretScan => "secret_scan",
            Self::DynamicScan => "dynamic_scan",
        };
        f.write_str(s)
    }
}

/// An external tool with a fixed invocation and exit-code mapping.
pub trait ToolAdapter: Send + Sync {
    /// The tool category.
    fn kind(&self) -> ToolKind;

    /// Builds the invocation for this run.
    fn command(&self, run: &RunContext) -> CommandSpec;

    /// How exit codes map to outcomes.
    fn exit_codes(&self) -> ExitCodeTable;

    /// Report files the tool writes, relative to the workspace.
    fn reports(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A tool described by data: a command, an exit-code table, and report paths.
#[derive(Debug, Clone)]
pub struct Tool {
    kind: ToolKind,
    command: CommandSpec,
    exit_codes: ExitCodeTable,
    reports: Vec<PathBuf>,
}

impl Tool {
    /// Creates a tool with an explicit exit-code table.
    #[must_use]
    pub fn new(kind: ToolKind, command: CommandSpec, exit_codes: ExitCodeTable) -> Self {
        Self {
            kind,
            command,
            exit_codes,
            reports: Vec::new(),
        }
    }

    /// `git clone --branch <branch> <url> .`
    #[must_use]
    pub fn checkout(url: impl Into<String>, branch: impl Into<String>) -> Self {
        let command = CommandSpec::new("git")
            .args(["clone", "--depth", "1", "--branch"])
            .arg(branch)
            .arg(url)
            .arg(".");
        Self::new(ToolKind::Checkout, command, ExitCodeTable::strict())
    }

    /// A build or test command. Any non-zero exit is fatal.
    #[must_use]
    pub fn build(command: CommandSpec) -> Self {
        Self::new(ToolKind::Build, command, ExitCodeTable::strict())
    }

    /// A static analyser. Non-zero exits are findings.
    #[must_use]
    pub fn static_analysis(command: CommandSpec) -> Self {
        Self::new(ToolKind::StaticAnalysis, command, ExitCodeTable::advisory())
    }

    /// A dependency scanner. Findings become fatal when `enforce` is set.
    #[must_use]
    pub fn dependency_scan(command: CommandSpec, enforce: bool) -> Self {
        let table = if enforce {
            ExitCodeTable::strict()
        } else {
            ExitCodeTable::advisory()
        };
        Self::new(ToolKind::DependencyScan, command, table)
    }

    /// `docker build -t <tag> <context>`
    #[must_use]
    pub fn image_build(tag: impl Into<String>, context: impl Into<String>) -> Self {
        let command = CommandSpec::new("docker")
            .args(["build", "-t"])
            .arg(tag)
            .arg(context);
        Self::new(ToolKind::ImageBuild, command, ExitCodeTable::strict())
    }

    /// An image scanner. Non-zero exits are findings.
    #[must_use]
    pub fn image_scan(command: CommandSpec) -> Self {
        Self::new(ToolKind::ImageScan, command, ExitCodeTable::advisory())
    }

    /// A secret scanner. Non-zero exits are findings.
    #[must_use]
    pub fn secret_scan(command: CommandSpec) -> Self {
        Self::new(ToolKind::SecretScan, command, ExitCodeTable::advisory())
    }

    /// A dynamic web scanner with the 1/2/3 exit-code convention.
    #[must_use]
    pub fn dynamic_scan(command: CommandSpec) -> Self {
        Self::new(ToolKind::DynamicScan, command, ExitCodeTable::dynamic_scan())
    }

    /// Declares a report file the tool writes.
    #[must_use]
    pub fn with_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.reports.push(path.into());
        self
    }

    /// Replaces the exit-code table.
    #[must_use]
    pub fn with_exit_codes(mut self, table: ExitCodeTable) -> Self {
        self.exit_codes = table;
        self
    }
}

impl ToolAdapter for Tool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn command(&self, _run: &RunContext) -> CommandSpec {
        self.command.clone()
    }

    fn exit_codes(&self) -> ExitCodeTable {
        self.exit_codes.clone()
    }

    fn reports(&self) -> Vec<PathBuf> {
        self.reports.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ToolOutcome;

    #[test]
    fn test_checkout_command() {
        let run = RunContext::builder("p").build();
        let tool = Tool::checkout("https://example.com/app.git", "main");
        assert_eq!(
            tool.command(&run).to_string(),
            "git clone --depth 1 --branch main https://example.com/app.git ."
        );
        assert_eq!(tool.kind().default_policy(), FailurePolicy::Fatal);
    }

    #[test]
    fn test_dependency_scan_enforcement() {
        let advisory = Tool::dependency_scan(CommandSpec::new("dependency-check"), false);
        let enforced = Tool::dependency_scan(CommandSpec::new("dependency-check"), true);
        assert_eq!(advisory.exit_codes().classify(1), ToolOutcome::Findings);
        assert_eq!(enforced.exit_codes().classify(1), ToolOutcome::Fatal);
    }

    #[test]
    fn test_reports_and_kind_display() {
        let tool = Tool::dynamic_scan(CommandSpec::new("zap-baseline.py"))
            .with_report("zap_report.html");
        assert_eq!(tool.reports(), vec![PathBuf::from("zap_report.html")]);
        assert_eq!(tool.kind().to_string(), "dynamic_scan");
        assert_eq!(tool.kind().default_policy(), FailurePolicy::Fatal);
        assert_eq!(ToolKind::SecretScan.default_policy(), FailurePolicy::BestEffort);
    }
}
