//! Structured cancellation and cleanup utilities.
//!
//! This module provides:
//! - CancellationToken for cooperative run cancellation
//! - CleanupRegistry for LIFO release of scoped resources

mod cleanup;
mod token;

pub use cleanup::{CleanupRegistry, CleanupReport};
pub use token::CancellationToken;
