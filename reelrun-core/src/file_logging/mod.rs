// ============================================================================
// reelrun-core/src/file_logging/mod.rs
// ============================================================================
//
// FILE LOGGING: Persistent log files for command runs

pub mod setup;

pub use setup::{log_file_path, setup_file_logging};
