//! The reference security-scan pipeline.
//!
//! ```text
//! checkout -> build -> [sast | dependency-scan | secret-scan]
//!          -> image-build -> image-scan -> dast (app running) -> quality-gate
//! post: image-cleanup
//! ```
//!
//! Archival, the run record, packaging, and notification are executor
//! facilities and run after the post stages; configure them on the
//! [`Executor`](crate::pipeline::Executor).

use crate::adapters::Tool;
use crate::config::RunnerConfig;
use crate::core::FailurePolicy;
use crate::errors::PipelineValidationError;
use crate::gate::{GatePolicy, GateSource, GateStage};
use crate::pipeline::{ExecutionPlan, PipelineBuilder, StageSpec};
use crate::process::{BackgroundProcess, CommandSpec, Readiness};
use crate::stages::CommandStage;
use std::sync::Arc;

/// Report written by the static analyser.
pub const SAST_REPORT: &str = "semgrep.json";
/// Report written by the dependency scanner.
pub const DEPENDENCY_REPORT: &str = "dependency-check-report.json";
/// Report written by the secret scanner.
pub const SECRET_REPORT: &str = "gitleaks.json";
/// Report written by the image scanner.
pub const IMAGE_REPORT: &str = "trivy.json";
/// Report written by the dynamic scanner.
pub const DAST_REPORT: &str = "zap_report.html";

/// Options for the security pipeline. Every tool invocation can be replaced.
#[derive(Clone)]
pub struct SecurityPipeline {
    name: String,
    repo_url: String,
    branch: String,
    build: CommandSpec,
    sast: CommandSpec,
    dependency_scan: CommandSpec,
    enforce_dependency_scan: bool,
    secret_scan: CommandSpec,
    image_tag: String,
    image_scan: Option<CommandSpec>,
    app: CommandSpec,
    app_readiness: Readiness,
    dast: Option<CommandSpec>,
    target_url: String,
    gate: Option<Arc<dyn GateSource>>,
    gate_policy: GatePolicy,
}

impl SecurityPipeline {
    /// Creates the default pipeline for a Maven project served on port 8080.
    #[must_use]
    pub fn new(repo_url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            name: "security-scan".to_string(),
            repo_url: repo_url.into(),
            branch: branch.into(),
            build: CommandSpec::new("mvn").args(["-B", "clean", "package"]),
            sast: CommandSpec::new("semgrep").args([
                "scan",
                "--config",
                "auto",
                "--json",
                "--output",
                SAST_REPORT,
            ]),
            dependency_scan: CommandSpec::new("dependency-check.sh").args([
                "--scan",
                ".",
                "--format",
                "JSON",
                "--out",
                DEPENDENCY_REPORT,
            ]),
            enforce_dependency_scan: false,
            secret_scan: CommandSpec::new("gitleaks").args([
                "detect",
                "--source",
                ".",
                "--report-path",
                SECRET_REPORT,
            ]),
            image_tag: "app:latest".to_string(),
            image_scan: None,
            app: CommandSpec::new("java").args(["-jar", "target/app.jar"]),
            app_readiness: Readiness::tcp("127.0.0.1:8080"),
            dast: None,
            target_url: "http://127.0.0.1:8080".to_string(),
            gate: None,
            gate_policy: GatePolicy::default(),
        }
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the build command.
    #[must_use]
    pub fn with_build(mut self, command: CommandSpec) -> Self {
        self.build = command;
        self
    }

    /// Replaces the static analysis command.
    #[must_use]
    pub fn with_sast(mut self, command: CommandSpec) -> Self {
        self.sast = command;
        self
    }

    /// Replaces the dependency scan command.
    #[must_use]
    pub fn with_dependency_scan(mut self, command: CommandSpec) -> Self {
        self.dependency_scan = command;
        self
    }

    /// Makes dependency findings fatal.
    #[must_use]
    pub fn enforce_dependency_scan(mut self, enforce: bool) -> Self {
        self.enforce_dependency_scan = enforce;
        self
    }

    /// Replaces the secret scan command.
    #[must_use]
    pub fn with_secret_scan(mut self, command: CommandSpec) -> Self {
        self.secret_scan = command;
        self
    }

    /// Sets the image tag built and scanned.
    #[must_use]
    pub fn with_image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tag = tag.into();
        self
    }

    /// Replaces the image scan command.
    #[must_use]
    pub fn with_image_scan(mut self, command: CommandSpec) -> Self {
        self.image_scan = Some(command);
        self
    }

    /// Sets the application started for the dynamic scan and how to detect it is up.
    #[must_use]
    pub fn with_app(mut self, command: CommandSpec, readiness: Readiness) -> Self {
        self.app = command;
        self.app_readiness = readiness;
        self
    }

    /// Sets the URL the dynamic scanner targets.
    #[must_use]
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = url.into();
        self
    }

    /// Replaces the dynamic scan command.
    #[must_use]
    pub fn with_dast(mut self, command: CommandSpec) -> Self {
        self.dast = Some(command);
        self
    }

    /// Adds the quality gate stage.
    #[must_use]
    pub fn with_gate(mut self, source: Arc<dyn GateSource>, policy: GatePolicy) -> Self {
        self.gate = Some(source);
        self.gate_policy = policy;
        self
    }

    /// Applies the gate settings from configuration.
    #[must_use]
    pub fn with_config(mut self, config: &RunnerConfig) -> Self {
        self.gate_policy = GatePolicy::from(&config.gate);
        self
    }

    /// Builds the plan.
    pub fn build(self) -> Result<ExecutionPlan, PipelineValidationError> {
        let image_scan = self.image_scan.unwrap_or_else(|| {
            CommandSpec::new("trivy")
                .args(["image", "--format", "json", "--output", IMAGE_REPORT])
                .arg(&self.image_tag)
        });
        let dast = self.dast.unwrap_or_else(|| {
            CommandSpec::new("zap-baseline.py")
                .arg("-t")
                .arg(&self.target_url)
                .args(["-r", DAST_REPORT])
        });

        let app = BackgroundProcess::new("app", self.app).with_readiness(self.app_readiness);

        let mut builder = PipelineBuilder::new(self.name)
            .stage(StageSpec::tool("checkout", Tool::checkout(self.repo_url, self.branch)))
            .stage(StageSpec::tool("build", Tool::build(self.build)))
            .parallel(
                "scans",
                vec![
                    StageSpec::tool(
                        "sast",
                        Tool::static_analysis(self.sast).with_report(SAST_REPORT),
                    ),
                    StageSpec::tool(
                        "dependency-scan",
                        Tool::dependency_scan(self.dependency_scan, self.enforce_dependency_scan)
                            .with_report(DEPENDENCY_REPORT),
                    )
                    .with_policy(if self.enforce_dependency_scan {
                        FailurePolicy::Fatal
                    } else {
                        FailurePolicy::BestEffort
                    }),
                    StageSpec::tool(
                        "secret-scan",
                        Tool::secret_scan(self.secret_scan).with_report(SECRET_REPORT),
                    ),
                ],
            )
            .stage(StageSpec::tool("image-build", Tool::image_build(&self.image_tag, ".")))
            .stage(StageSpec::tool(
                "image-scan",
                Tool::image_scan(image_scan).with_report(IMAGE_REPORT),
            ))
            .stage(
                StageSpec::tool("dast", Tool::dynamic_scan(dast).with_report(DAST_REPORT))
                    .with_resource(app),
            );

        if let Some(source) = self.gate {
            builder = builder.stage(
                StageSpec::new(
                    "quality-gate",
                    Arc::new(GateStage::from_arc("quality-gate", source, self.gate_policy)),
                )
                .fatal(),
            );
        }

        builder
            .post(
                StageSpec::new(
                    "image-cleanup",
                    Arc::new(CommandStage::single(
                        "image-cleanup",
                        CommandSpec::new("docker")
                            .args(["image", "rm", "-f"])
                            .arg(&self.image_tag)
                            .allow_failure(),
                    )),
                )
                .best_effort(),
            )
            .build()
    }
}

impl std::fmt::Debug for SecurityPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityPipeline")
            .field("name", &self.name)
            .field("repo_url", &self.repo_url)
            .field("branch", &self.branch)
            .field("image_tag", &self.image_tag)
            .field("gate", &self.gate.as_ref().map(|g| g.name().to_string()))
            .field("gate_policy", &self.gate_policy)
            .finish_non_exhaustive()
    }
}

/// Builds the default security pipeline for `repo_url` at `branch`, optionally gated.
pub fn security_pipeline(
    repo_url: impl Into<String>,
    branch: impl Into<String>,
    gate: Option<Arc<dyn GateSource>>,
    config: &RunnerConfig,
) -> Result<ExecutionPlan, PipelineValidationError> {
    let mut pipeline = SecurityPipeline::new(repo_url, branch).with_config(config);
    if let Some(source) = gate {
        let policy = GatePolicy::from(&config.gate);
        pipeline = pipeline.with_gate(source, policy);
    }
    pipeline.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::SequenceGateSource;
    use crate::pipeline::Phase;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_plan_layout() {
        let plan = SecurityPipeline::new("https://git.example/app.git", "main")
            .build()
            .unwrap();

        assert_eq!(
            plan.stage_names(),
            vec![
                "checkout",
                "build",
                "sast",
                "dependency-scan",
                "secret-scan",
                "image-build",
                "image-scan",
                "dast"
            ]
        );
        assert_eq!(plan.entries()[2].group(), Some("scans"));
        assert_eq!(plan.post_stages()[0].name, "image-cleanup");
        assert_eq!(plan.stage("dast").unwrap().resources.len(), 1);
    }

    #[test]
    fn test_policies() {
        let plan = SecurityPipeline::new("u", "main").build().unwrap();
        let policy = |name: &str| plan.stage(name).unwrap().policy;

        assert_eq!(policy("build"), FailurePolicy::Fatal);
        assert_eq!(policy("sast"), FailurePolicy::BestEffort);
        assert_eq!(policy("dependency-scan"), FailurePolicy::BestEffort);
        assert_eq!(policy("dast"), FailurePolicy::Fatal);
        assert_eq!(policy("image-cleanup"), FailurePolicy::BestEffort);

        let enforced = SecurityPipeline::new("u", "main")
            .enforce_dependency_scan(true)
            .build()
            .unwrap();
        assert_eq!(enforced.stage("dependency-scan").unwrap().policy, FailurePolicy::Fatal);
    }

    #[test]
    fn test_gate_added_with_config_policy() {
        let mut config = RunnerConfig::default();
        config.gate.timeout_seconds = 120;
        let plan = security_pipeline(
            "u",
            "main",
            Some(Arc::new(SequenceGateSource::never("sonarqube"))),
            &config,
        )
        .unwrap();

        let listing = plan.describe();
        let gate = listing.iter().find(|s| s.name == "quality-gate").unwrap();
        assert_eq!(gate.phase, Phase::Main);
        assert_eq!(gate.policy, FailurePolicy::Fatal);
        assert!(format!("{:?}", plan.stage("quality-gate").unwrap().runner).contains("120s"));
    }
}
