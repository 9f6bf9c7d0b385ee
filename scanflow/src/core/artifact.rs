//! Artifacts declared or produced by stages.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file produced by a stage, retained for archiving regardless of outcome.
///
/// Relative paths are resolved against the run workspace at archive time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Human-readable artifact name (e.g. "semgrep-report").
    pub name: String,

    /// Location of the artifact.
    pub path: PathBuf,

    /// The stage that produced (or was expected to produce) the artifact.
    pub stage: String,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, stage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            stage: stage.into(),
        }
    }

    /// Resolves the artifact path against a workspace directory.
    #[must_use]
    pub fn resolve(&self, workspace: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace.join(&self.path)
        }
    }

    /// Returns the file name used when archiving, prefixed with the stage.
    #[must_use]
    pub fn archive_name(&self) -> String {
        let file = self
            .path
            .file_name()
            .map_or_else(|| self.name.clone(), |f| f.to_string_lossy().into_owned());
        format!("{}__{}", self.stage, file)
    }
}
