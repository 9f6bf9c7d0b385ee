//! Tool adapters with explicit exit-code tables.
//!
//! Each wrapped tool declares how its exit codes map to a [`ToolOutcome`]:
//!
//! | Kind | Mapping |
//! |---|---|
//! | checkout, build, image build | 0 clean, other fatal |
//! | static analysis, image scan, secret scan | 0 clean, other findings |
//! | dependency scan | 0 clean, other findings (fatal when enforced) |
//! | dynamic scan | 0 clean, 1 fatal, 2 findings, 3 fatal, other findings |

mod exit_codes;
mod tools;

pub use exit_codes::{ExitCodeTable, ToolOutcome};
pub use tools::{Tool, ToolAdapter, ToolKind};
