//! External process plumbing.
//!
//! - [`CommandSpec`] / [`CommandOutput`] describe one command invocation
//! - [`CommandRunner`] is the seam stages run commands through
//! - [`ScopedResource`] implementations manage processes and containers that
//!   must outlive a single command but not the stage that needs them

mod background;
mod command;
mod resource;
mod runner;

pub use background::{BackgroundProcess, Readiness};
pub use command::{CommandOutput, CommandSpec};
pub use resource::{AuxiliaryContainer, ResourceHandle, ScopedResource};
pub use runner::{CommandRunner, TokioCommandRunner};
