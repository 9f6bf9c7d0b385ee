//! Packaging the report directory through an external compressor.

use crate::cancellation::CancellationToken;
use crate::process::{CommandRunner, CommandSpec};
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};

/// Default compressor command.
pub const DEFAULT_COMPRESS_COMMAND: &str = "tar -czf {output} -C {dir} .";

/// Runs an external compressor over the report directory.
///
/// The command template is split on whitespace; `{output}` and `{dir}` are
/// substituted per argument. The bundle is written next to the report
/// directory so the compressor never reads its own output.
#[derive(Debug, Clone)]
pub struct ReportPackager {
    template: String,
    extension: String,
}

impl Default for ReportPackager {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESS_COMMAND)
    }
}

impl ReportPackager {
    /// Creates a packager from a command template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            extension: "tar.gz".to_string(),
        }
    }

    /// Sets the bundle file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Returns the command template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns where the bundle for `report_dir` is written.
    #[must_use]
    pub fn bundle_path(&self, report_dir: &Path) -> PathBuf {
        let stem = report_dir
            .file_name()
            .map_or_else(|| "reports".to_string(), |n| n.to_string_lossy().into_owned());
        report_dir.with_file_name(format!("{stem}.{}", self.extension))
    }

    /// Builds the compressor command for `report_dir`.
    pub fn command(&self, report_dir: &Path) -> anyhow::Result<CommandSpec> {
        let output = self.bundle_path(report_dir);
        let output = output.to_string_lossy();
        let dir = report_dir.to_string_lossy();
        let mut parts = self
            .template
            .split_whitespace()
            .map(|part| part.replace("{output}", &output).replace("{dir}", &dir));

        let Some(program) = parts.next() else {
            bail!("compress command is empty");
        };
        Ok(CommandSpec::new(program).args(parts))
    }

    /// Compresses `report_dir` and returns the bundle path.
    pub async fn package(
        &self,
        report_dir: &Path,
        runner: &dyn CommandRunner,
        cancel: &CancellationToken,
    ) -> anyhow::Result<PathBuf> {
        let spec = self.command(report_dir)?;
        let output = runner
            .run(&spec, cancel)
            .await
            .with_context(|| format!("running compressor '{spec}'"))?;
        if !output.success() {
            bail!(
                "compressor '{}' exited with {}: {}",
                spec.program,
                output.code(),
                output.stderr.trim()
            );
        }
        Ok(self.bundle_path(report_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use crate::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bundle_is_sibling_of_report_dir() {
        let packager = ReportPackager::default();
        assert_eq!(
            packager.bundle_path(Path::new("/ws/reports")),
            PathBuf::from("/ws/reports.tar.gz")
        );
        assert_eq!(
            packager
                .with_extension("zip")
                .bundle_path(Path::new("/ws/out")),
            PathBuf::from("/ws/out.zip")
        );
    }

    #[test]
    fn test_command_substitutes_placeholders() {
        let spec = ReportPackager::default()
            .command(Path::new("/ws/reports"))
            .unwrap();
        assert_eq!(spec.program, "tar");
        assert_eq!(spec.args, vec!["-czf", "/ws/reports.tar.gz", "-C", "/ws/reports", "."]);
    }

    #[test]
    fn test_empty_template_is_rejected() {
        assert!(ReportPackager::new("  ").command(Path::new("/r")).is_err());
    }

    #[tokio::test]
    async fn test_package_reports_compressor_failure() {
        let runner = ScriptedRunner::new().on(
            "tar",
            CommandOutput::with_code(2).with_stderr("tar: cannot open"),
        );
        let err = ReportPackager::default()
            .package(Path::new("/ws/reports"), &runner, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with 2"));
    }

    #[tokio::test]
    async fn test_package_returns_bundle_path() {
        let runner = ScriptedRunner::new();
        let bundle = ReportPackager::default()
            .package(Path::new("/ws/reports"), &runner, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bundle, PathBuf::from("/ws/reports.tar.gz"));
        assert_eq!(runner.invocations(), vec!["tar -czf /ws/reports.tar.gz -C /ws/reports ."]);
    }
}
