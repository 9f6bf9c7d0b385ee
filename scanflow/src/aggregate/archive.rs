//! Artifact archival into the run's report directory.
//!
//! Archival is "allow empty": a missing artifact becomes a `missing` entry in
//! the manifest, never an error. Only failing to create the report directory
//! or write the manifest is reported as an error.

use crate::core::Artifact;
use crate::errors::{Result, ScanflowError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the manifest written next to archived artifacts.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArchiveState {
    /// Copied into the report directory.
    Archived {
        /// Size in bytes (summed for directories).
        size: u64,
        /// SHA-256 of the file; absent for directories.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
        /// Location inside the artifact directory.
        archived_as: PathBuf,
    },
    /// The path did not exist.
    Missing,
    /// The path existed but could not be copied.
    Failed {
        /// The I/O error.
        reason: String,
    },
}

/// A manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The artifact as declared.
    pub artifact: Artifact,
    /// Outcome.
    #[serde(flatten)]
    pub state: ArchiveState,
}

impl ManifestEntry {
    /// Returns true if the artifact was copied.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        matches!(self.state, ArchiveState::Archived { .. })
    }
}

/// The archival manifest of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Directory artifacts were copied into.
    pub directory: PathBuf,
    /// One entry per artifact, in stage order.
    pub entries: Vec<ManifestEntry>,
}

impl ArchiveManifest {
    /// Number of archived artifacts.
    #[must_use]
    pub fn archived_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_archived()).count()
    }

    /// Number of missing artifacts.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == ArchiveState::Missing)
            .count()
    }

    /// Paths of archived artifacts inside the report directory.
    #[must_use]
    pub fn archived_paths(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter_map(|e| match &e.state {
                ArchiveState::Archived { archived_as, .. } => Some(self.directory.join(archived_as)),
                _ => None,
            })
            .collect()
    }
}

/// Copies artifacts from the workspace into `<report_dir>/artifacts`.
#[derive(Debug, Clone)]
pub struct ArtifactArchiver {
    workspace: PathBuf,
    report_dir: PathBuf,
}

impl ArtifactArchiver {
    /// Creates an archiver.
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            report_dir: report_dir.into(),
        }
    }

    /// Returns the report directory.
    #[must_use]
    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Returns the directory artifacts are copied into.
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.report_dir.join("artifacts")
    }

    /// Archives the artifacts and writes `manifest.json`.
    ///
    /// Blocking; the executor calls it from `spawn_blocking`.
    pub fn archive(&self, artifacts: &[Artifact]) -> Result<ArchiveManifest> {
        let target = self.artifact_dir();
        fs::create_dir_all(&target).map_err(|e| {
            ScanflowError::Archive(format!("cannot create {}: {e}", target.display()))
        })?;

        let mut manifest = ArchiveManifest {
            directory: target.clone(),
            entries: Vec::with_capacity(artifacts.len()),
        };
        for artifact in artifacts {
            let state = self.archive_one(artifact, &target);
            match &state {
                ArchiveState::Archived { archived_as, .. } => {
                    debug!(artifact = %artifact.name, stage = %artifact.stage, to = %archived_as.display(), "Archived artifact");
                }
                ArchiveState::Missing => {
                    debug!(artifact = %artifact.name, stage = %artifact.stage, path = %artifact.path.display(), "Artifact missing; skipped");
                }
                ArchiveState::Failed { reason } => {
                    warn!(artifact = %artifact.name, stage = %artifact.stage, %reason, "Artifact could not be archived");
                }
            }
            manifest.entries.push(ManifestEntry {
                artifact: artifact.clone(),
                state,
            });
        }

        self.write_json(MANIFEST_FILE, &manifest)?;
        Ok(manifest)
    }

    /// Serializes `value` to `<report_dir>/<file_name>`.
    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.report_dir)?;
        let path = self.report_dir.join(file_name);
        let json = serde_json::to_vec_pretty(value)?;
        fs::write(&path, json).map_err(|e| {
            ScanflowError::Archive(format!("cannot write {}: {e}", path.display()))
        })?;
        Ok(path)
    }

    fn archive_one(&self, artifact: &Artifact, target: &Path) -> ArchiveState {
        let source = artifact.resolve(&self.workspace);
        let metadata = match fs::metadata(&source) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return ArchiveState::Missing,
            Err(e) => {
                return ArchiveState::Failed {
                    reason: e.to_string(),
                }
            }
        };

        let archived_as = PathBuf::from(crate::utils::sanitize_file_component(
            &artifact.archive_name(),
        ));
        let destination = target.join(&archived_as);
        let copied = if metadata.is_dir() {
            copy_dir(&source, &destination).map(|size| (size, None))
        } else {
            copy_file(&source, &destination).map(|(size, digest)| (size, Some(digest)))
        };

        match copied {
            Ok((size, sha256)) => ArchiveState::Archived {
                size,
                sha256,
                archived_as,
            },
            Err(e) => ArchiveState::Failed {
                reason: e.to_string(),
            },
        }
    }
}

fn copy_file(source: &Path, destination: &Path) -> io::Result<(u64, String)> {
    let bytes = fs::read(source)?;
    fs::write(destination, &bytes)?;
    Ok((bytes.len() as u64, hex::encode(Sha256::digest(&bytes))))
}

fn copy_dir(source: &Path, destination: &Path) -> io::Result<u64> {
    fs::create_dir_all(destination)?;
    let mut total = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            total += copy_dir(&from, &to)?;
        } else {
            total += fs::copy(&from, &to)?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ArtifactArchiver) {
        let dir = TempDir::new().unwrap();
        let archiver = ArtifactArchiver::new(dir.path(), dir.path().join("reports"));
        (dir, archiver)
    }

    #[test]
    fn test_archives_existing_file_with_digest() {
        let (dir, archiver) = setup();
        fs::write(dir.path().join("trivy.json"), b"{}").unwrap();

        let manifest = archiver
            .archive(&[Artifact::new("trivy", "trivy.json", "image-scan")])
            .unwrap();

        assert_eq!(manifest.archived_count(), 1);
        match &manifest.entries[0].state {
            ArchiveState::Archived { size, sha256, archived_as } => {
                assert_eq!(*size, 2);
                assert_eq!(
                    sha256.as_deref(),
                    Some("44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a")
                );
                assert_eq!(archived_as, &PathBuf::from("image-scan__trivy.json"));
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(dir.path().join("reports/artifacts/image-scan__trivy.json").exists());
        assert!(dir.path().join("reports").join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_missing_artifact_is_not_an_error() {
        let (_dir, archiver) = setup();

        let manifest = archiver
            .archive(&[Artifact::new("zap", "zap_report.html", "dast")])
            .unwrap();

        assert_eq!(manifest.missing_count(), 1);
        assert_eq!(manifest.archived_count(), 0);
        assert!(manifest.archived_paths().is_empty());
    }

    #[test]
    fn test_empty_artifact_list_writes_empty_manifest() {
        let (dir, archiver) = setup();
        let manifest = archiver.archive(&[]).unwrap();

        assert!(manifest.entries.is_empty());
        let written: ArchiveManifest = serde_json::from_slice(
            &fs::read(dir.path().join("reports").join(MANIFEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(written, manifest);
    }

    #[test]
    fn test_directory_artifact_is_copied_recursively() {
        let (dir, archiver) = setup();
        let site = dir.path().join("target/site");
        fs::create_dir_all(site.join("css")).unwrap();
        fs::write(site.join("index.html"), b"<html/>").unwrap();
        fs::write(site.join("css/app.css"), b"a{}").unwrap();

        let manifest = archiver
            .archive(&[Artifact::new("site", "target/site", "build")])
            .unwrap();

        match &manifest.entries[0].state {
            ArchiveState::Archived { size, sha256, .. } => {
                assert_eq!(*size, 10);
                assert!(sha256.is_none());
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(dir
            .path()
            .join("reports/artifacts/build__site/css/app.css")
            .exists());
    }

    #[test]
    fn test_manifest_serialization_shape() {
        let entry = ManifestEntry {
            artifact: Artifact::new("zap", "zap.html", "dast"),
            state: ArchiveState::Missing,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["state"], "missing");
        assert_eq!(json["artifact"]["stage"], "dast");
    }
}
