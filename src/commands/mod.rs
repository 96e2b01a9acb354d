//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod correlate;
pub mod utils;

// Re-export main command functions
pub use correlate::{execute_correlate, validate_args, CorrelateArgs};
pub use utils::{display_schema, display_version, validate_report_file};
