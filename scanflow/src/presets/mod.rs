//! Ready-made pipelines.

mod security;

pub use security::{security_pipeline, SecurityPipeline};
