//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications with failure policies, guards, post actions, and
//!   scoped resources
//! - The validating builder and the ordered execution plan it produces
//! - The executor that runs a plan and its always-run post phase
//! - Failure bookkeeping that decides when the main phase aborts

mod builder;
mod executor;
mod failure_tolerance;
mod plan;
mod spec;

pub use builder::PipelineBuilder;
pub use executor::{Executor, DEFAULT_CLEANUP_TIMEOUT, DEFAULT_NOTIFY_TIMEOUT};
pub use failure_tolerance::{FailureCollector, FailureRecord, FailureSummary};
pub use plan::{ExecutionPlan, Phase, PlanEntry, PlannedStage};
pub use spec::{Guard, GuardFn, PostAction, PostCondition, StageSpec};
