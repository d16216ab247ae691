// ============================================================================
// reelrun-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: Routes the `log` facade for one CLI run
//
// Job output is rendered by the event handlers in `output`, so the `log`
// facade only carries diagnostics. Two backends, only one per process:
// - env_logger on stderr (default). RUST_LOG overrides the level.
// - log4rs into `<log dir>/reelrun_<command>_<timestamp>.log` with --log-dir.
//   Job events are then mirrored into the file by `LogForwardingHandler`.

use std::path::PathBuf;

use log::LevelFilter;
use reelrun_core::file_logging::{log_file_path, setup_file_logging};
use reelrun_core::CoreError;

use crate::cli::GlobalArgs;
use crate::error::CliResult;

/// Level used for the chosen backend.
pub fn log_level(verbose: bool, to_file: bool) -> LevelFilter {
    match (verbose, to_file) {
        (true, _) => LevelFilter::Debug,
        (false, true) => LevelFilter::Info,
        // Info-level job lines already reach the terminal as events.
        (false, false) => LevelFilter::Warn,
    }
}

/// Installs the logger. Returns the log file path when logging to a file.
pub fn init_logging(global: &GlobalArgs, command: &str) -> CliResult<Option<PathBuf>> {
    match &global.log_dir {
        Some(dir) => {
            let path = log_file_path(dir, command);
            setup_file_logging(&path, log_level(global.verbose, true)).map_err(|e| {
                CoreError::Config(format!("Failed to set up log file {}: {e}", path.display()))
            })?;
            log::info!("reelrun {} {command}", env!("CARGO_PKG_VERSION"));
            Ok(Some(path))
        }
        None => {
            let default_level = log_level(global.verbose, false).to_string().to_lowercase();
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
                .format_timestamp(None)
                .format_target(false)
                .init();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(log_level(false, false), LevelFilter::Warn);
        assert_eq!(log_level(false, true), LevelFilter::Info);
        assert_eq!(log_level(true, false), LevelFilter::Debug);
    }
}
