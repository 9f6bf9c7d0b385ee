//! Error types for the scanflow engine.
//!
//! Stage-level failures are not errors: they are recorded as stage results and
//! judged by the stage's failure policy. The types here cover engine faults:
//! invalid pipeline definitions, process plumbing, scoped resources, gate
//! polling, report archival, and configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for scanflow operations.
#[derive(Debug, Error)]
pub enum ScanflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// An external command could not be run to completion.
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// A gate could not be evaluated.
    #[error("{0}")]
    Gate(#[from] GateError),

    /// A scoped resource could not be acquired or released.
    #[error("Resource '{name}' error: {reason}")]
    Resource {
        /// The resource name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// Report archival failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled before the work could finish.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanflowError {
    /// Creates a cancellation error carrying the token's reason.
    #[must_use]
    pub fn cancelled(reason: Option<String>) -> Self {
        Self::Cancelled(reason.unwrap_or_else(|| "no reason given".to_string()))
    }

    /// Creates a resource error.
    #[must_use]
    pub fn resource(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Fills in the fix hint from [`ContractSuggestions`] when none was given.
    #[must_use]
    pub fn with_default_hint(mut self) -> Self {
        if self.fix_hint.is_none() {
            self.fix_hint = ContractSuggestions::get(&self.code).map(String::from);
        }
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The command ran longer than its timeout and was killed.
    #[error("Command '{program}' timed out after {timeout:?}")]
    Timeout {
        /// The program that timed out.
        program: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The run was cancelled while the command was running; the child was killed.
    #[error("Command '{program}' cancelled")]
    Cancelled {
        /// The program that was interrupted.
        program: String,
    },

    /// The command binds a credential the run does not have.
    #[error("Command '{program}' needs credential '{credential}', which is not bound")]
    MissingCredential {
        /// The program that needed it.
        program: String,
        /// The credential name.
        credential: String,
    },

    /// Waiting on the child failed.
    #[error("IO error while running '{program}': {source}")]
    Io {
        /// The program being run.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Returns the program associated with the error.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Spawn { program, .. }
            | Self::Timeout { program, .. }
            | Self::Cancelled { program }
            | Self::MissingCredential { program, .. }
            | Self::Io { program, .. } => program,
        }
    }
}

/// Errors raised while polling an external gate.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// The gate source could not be reached.
    #[error("Gate '{source_name}' unavailable: {reason}")]
    Unavailable {
        /// The gate source identifier.
        source_name: String,
        /// Why the source could not be polled.
        reason: String,
    },

    /// The gate source answered with something unintelligible.
    #[error("Gate '{source_name}' returned an invalid response: {reason}")]
    InvalidResponse {
        /// The gate source identifier.
        source_name: String,
        /// What was wrong with the response.
        reason: String,
    },
}

impl GateError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONTRACT-004-NAME" => Some("Give the pipeline a non-blank name."),
            "CONTRACT-004-EMPTY" => Some(
                "Add at least one main stage to the pipeline before building.",
            ),
            "CONTRACT-004-DUPLICATE" => Some(
                "Stage names must be unique across the main and post phases. \
                 Rename one of the stages.",
            ),
            "CONTRACT-004-EMPTY_GROUP" => Some(
                "A parallel group needs at least one stage. Remove the group or add stages to it.",
            ),
            _ => None,
        }
    }
}

/// Result type alias for scanflow operations.
pub type Result<T> = std::result::Result<T, ScanflowError>;
