// ============================================================================
// reelrun-cli/src/error.rs
// ============================================================================
//
// CLI ERRORS: Failures found before a job is submitted
//
// The CLI validates its arguments and reads the downloader command list
// itself. Those failures map onto two core variants, so exit codes and the
// final error line treat them like any other error:
// - `usage_error!`: an argument value that cannot work (no API key, an
//   empty command list, a grace window out of bounds) -> InvalidInput
// - `path_error!` and `CommandInput`: a path the user named that cannot be
//   used (commands file, watermark, subtitle directory) -> PathError

use std::fmt;
use std::io;
use std::path::Path;

use reelrun_core::{CoreError, CoreResult};

pub type CliResult<T> = CoreResult<T>;

/// Where the downloader command lines come from.
#[derive(Debug, Clone, Copy)]
pub enum CommandInput<'a> {
    File(&'a Path),
    Stdin,
}

impl fmt::Display for CommandInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandInput::File(path) => write!(f, "{}", path.display()),
            CommandInput::Stdin => f.write_str("standard input"),
        }
    }
}

impl CommandInput<'_> {
    /// Reads the whole command list.
    pub fn read(self) -> CliResult<String> {
        let text = match self {
            CommandInput::File(path) => std::fs::read_to_string(path),
            CommandInput::Stdin => io::read_to_string(io::stdin()),
        };
        text.map_err(|e| self.unreadable(e))
    }

    fn unreadable(self, e: io::Error) -> CoreError {
        CoreError::PathError(format!("Cannot read downloader commands from {self}: {e}"))
    }
}

/// An argument value the command cannot work with.
#[macro_export]
macro_rules! usage_error {
    ($($arg:tt)*) => {
        $crate::reelrun_core::CoreError::InvalidInput(format!($($arg)*))
    };
}

/// A path named on the command line that is missing or of the wrong kind.
#[macro_export]
macro_rules! path_error {
    ($($arg:tt)*) => {
        $crate::reelrun_core::CoreError::PathError(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_commands_file_is_a_path_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.txt");
        let err = CommandInput::File(&path).read().unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, CoreError::PathError(_)), "{text}");
        assert!(text.contains("Cannot read downloader commands from"), "{text}");
        assert!(text.contains("commands.txt"), "{text}");
    }

    #[test]
    fn test_reads_commands_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.txt");
        std::fs::write(&path, "N_m3u8DL-RE \"https://x/1.m3u8\"\n").unwrap();
        assert!(CommandInput::File(&path).read().unwrap().starts_with("N_m3u8DL-RE"));
    }

    #[test]
    fn test_stdin_label() {
        assert_eq!(CommandInput::Stdin.to_string(), "standard input");
    }

    #[test]
    fn test_error_macros() {
        let err = crate::usage_error!("bad range '{}'", "x-y");
        assert!(matches!(err, CoreError::InvalidInput(ref m) if m == "bad range 'x-y'"));
        let err = crate::path_error!("Not a directory: {}", "subs");
        assert!(matches!(err, CoreError::PathError(ref m) if m == "Not a directory: subs"));
    }
}
