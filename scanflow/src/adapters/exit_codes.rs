//! Exit-code classification for wrapped tools.

use crate::core::StageStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a tool's exit code means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Nothing to report.
    Clean,
    /// The tool ran and reported findings.
    Findings,
    /// The tool itself failed, or its result must stop the run.
    Fatal,
}

impl ToolOutcome {
    /// Maps the outcome to the stage status it produces.
    #[must_use]
    pub fn stage_status(self) -> StageStatus {
        match self {
            Self::Clean => StageStatus::Success,
            Self::Findings => StageStatus::Unstable,
            Self::Fatal => StageStatus::Failed,
        }
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Findings => write!(f, "findings"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Maps exit codes to outcomes, with a fallback for unlisted codes.
///
/// Exit code 0 is clean unless overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCodeTable {
    codes: BTreeMap<i32, ToolOutcome>,
    otherwise: ToolOutcome,
}

impl ExitCodeTable {
    /// Creates a table where 0 is clean and every other code maps to `otherwise`.
    #[must_use]
    pub fn new(otherwise: ToolOutcome) -> Self {
        let mut codes = BTreeMap::new();
        codes.insert(0, ToolOutcome::Clean);
        Self { codes, otherwise }
    }

    /// 0 clean, anything else fatal. Checkout, build, image build.
    #[must_use]
    pub fn strict() -> Self {
        Self::new(ToolOutcome::Fatal)
    }

    /// 0 clean, anything else findings. Scanners that never block.
    #[must_use]
    pub fn advisory() -> Self {
        Self::new(ToolOutcome::Findings)
    }

    /// Dynamic web scanner: 1 and 3 are scanner errors, 2 means warnings.
    #[must_use]
    pub fn dynamic_scan() -> Self {
        Self::advisory()
            .with(1, ToolOutcome::Fatal)
            .with(2, ToolOutcome::Findings)
            .with(3, ToolOutcome::Fatal)
    }

    /// Overrides the outcome for one code.
    #[must_use]
    pub fn with(mut self, code: i32, outcome: ToolOutcome) -> Self {
        self.codes.insert(code, outcome);
        self
    }

    /// Classifies an exit code.
    #[must_use]
    pub fn classify(&self, code: i32) -> ToolOutcome {
        self.codes.get(&code).copied().unwrap_or(self.otherwise)
    }

    /// Returns the fallback outcome.
    #[must_use]
    pub fn otherwise(&self) -> ToolOutcome {
        self.otherwise
    }
}

impl fmt::Display for ExitCodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (code, outcome) in &self.codes {
            write!(f, "{code}={outcome}, ")?;
        }
        write!(f, "*={}", self.otherwise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_and_advisory() {
        assert_eq!(ExitCodeTable::strict().classify(0), ToolOutcome::Clean);
        assert_eq!(ExitCodeTable::strict().classify(1), ToolOutcome::Fatal);
        assert_eq!(ExitCodeTable::advisory().classify(1), ToolOutcome::Findings);
        assert_eq!(ExitCodeTable::advisory().classify(-1), ToolOutcome::Findings);
    }

    #[test]
    fn test_dynamic_scan_codes() {
        let table = ExitCodeTable::dynamic_scan();
        assert_eq!(table.classify(0), ToolOutcome::Clean);
        assert_eq!(table.classify(1), ToolOutcome::Fatal);
        assert_eq!(table.classify(2), ToolOutcome::Findings);
        assert_eq!(table.classify(3), ToolOutcome::Fatal);
        assert_eq!(table.classify(4), ToolOutcome::Findings);
        assert_eq!(table.to_string(), "0=clean, 1=fatal, 2=findings, 3=fatal, *=findings");
    }

    #[test]
    fn test_outcome_to_status() {
        assert_eq!(ToolOutcome::Clean.stage_status(), StageStatus::Success);
        assert_eq!(ToolOutcome::Findings.stage_status(), StageStatus::Unstable);
        assert_eq!(ToolOutcome::Fatal.stage_status(), StageStatus::Failed);
    }
}
