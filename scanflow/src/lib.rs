//! # Scanflow
//!
//! A pipeline orchestration core for security-scanning CI runs.
//!
//! Scanflow sequences external tools (checkout, build, static analysis,
//! dependency and secret scans, image build and scan, dynamic scans, quality
//! gates) and decides the run's outcome:
//!
//! - **Ordered plans**: stages run in declaration order, with declared parallel groups
//! - **Failure policies**: `fatal` stages abort the main phase, `best-effort` ones never do
//! - **Exit-code tables**: each tool adapter maps exit codes to clean, findings, or fatal
//! - **Scoped resources**: background processes and containers live exactly as long as their stage
//! - **Gates**: poll-with-timeout waits on external verdicts, non-aborting by default
//! - **Always-run post phase**: archival, run record, packaging, and notification, once per run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scanflow::prelude::*;
//!
//! let plan = PipelineBuilder::new("security")
//!     .stage(StageSpec::tool("build", Tool::build(CommandSpec::shell("mvn -B package"))))
//!     .stage(StageSpec::tool("sast", Tool::static_analysis(CommandSpec::new("semgrep"))))
//!     .build()?;
//!
//! let config = RunnerConfig::load(None)?;
//! let run = Arc::new(RunContext::builder("security").with_config(&config)?.build());
//! let record = Executor::from_config(&config).run(&plan, run).await;
//! println!("{}", record.status);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod aggregate;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod gate;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod presets;
pub mod process;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{ExitCodeTable, Tool, ToolAdapter, ToolKind, ToolOutcome};
    pub use crate::aggregate::{PipelineRun, StageRecord};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::RunnerConfig;
    pub use crate::context::{RunContext, RunIdentity, StageContext};
    pub use crate::core::{
        Artifact, FailurePolicy, GateResult, PipelineStatus, StageOutput, StageStatus,
    };
    pub use crate::errors::{PipelineValidationError, ScanflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::gate::{GatePolicy, GateSource, GateStage, GateVerdict};
    pub use crate::notify::{JsonFileNotifier, LoggingNotifier, Notifier, ReportPackager};
    pub use crate::pipeline::{
        ExecutionPlan, Executor, Guard, PipelineBuilder, PostCondition, StageSpec,
    };
    pub use crate::process::{BackgroundProcess, CommandSpec, Readiness};
    pub use crate::stages::{CommandStage, Stage, ToolStage};
    pub use std::sync::Arc;
}
