//! Result aggregation.
//!
//! [`ResultAggregator`] collects [`StageRecord`]s while a run executes and
//! produces the final [`PipelineRun`]. [`ArtifactArchiver`] copies whatever
//! artifacts exist into the report directory and writes the manifest.

mod aggregator;
mod archive;
mod record;

pub use aggregator::ResultAggregator;
pub use archive::{
    ArchiveManifest, ArchiveState, ArtifactArchiver, ManifestEntry, MANIFEST_FILE,
};
pub use record::{PipelineRun, PostActionRecord, StageRecord};

/// File name of the serialized run record.
pub const RUN_RECORD_FILE: &str = "run.json";
