// ============================================================================
// reelrun-cli/src/lib.rs
// ============================================================================
//
// REELRUN CLI: Library Portion of the Binary
//
// Argument definitions, event rendering and command logic.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod output;
pub mod progress;

// Used by the `usage_error!` and `path_error!` macros.
pub use reelrun_core;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, GlobalArgs};
pub use commands::{run_command, RunContext};
pub use error::{CliResult, CommandInput};
