// ============================================================================
// reelrun-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Error Types for the Job Engine
//
// This module defines the error taxonomy shared by every component of the
// core: the stream reader, the batch orchestrator, the pipelines and the
// job runner.
//
// KEY COMPONENTS:
// - CoreError: The error enum (tool errors, cancellation, runner errors)
// - CoreResult: Result alias used throughout the crate
// - Helper constructors for the tool-related variants
//
// A line of tool output that matches no known format is not an error: parsers
// return `None` for it and the line is dropped.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the reelrun core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The tool binary could not be found. The current item is aborted.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A diagnostic call (probe, capability check) exceeded its hard bound.
    #[error("Tool '{tool}' timed out after {}s", .timeout.as_secs_f64())]
    ToolTimeout { tool: String, timeout: Duration },

    /// Non-zero exit, or zero exit without the expected artifact.
    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecutionFailure {
        tool: String,
        reason: String,
        /// The last few raw lines the tool printed.
        tail: Vec<String>,
    },

    /// The job was cancelled by the user. Distinct from a failure.
    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Another job is already running: {0}")]
    JobAlreadyRunning(String),

    #[error("Job worker panicked: {0}")]
    WorkerPanic(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start '{0}': {1}")]
    CommandStart(String, std::io::Error),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for reelrun core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Returns the raw output tail attached to a tool failure, if any.
    pub fn tail(&self) -> &[String] {
        match self {
            CoreError::ToolExecutionFailure { tail, .. } => tail,
            _ => &[],
        }
    }

    /// True for the cancellation variant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::UserCancelled)
    }
}

pub fn tool_not_found(tool: &str) -> CoreError {
    CoreError::ToolNotFound(tool.to_string())
}

pub fn tool_timeout(tool: &str, timeout: Duration) -> CoreError {
    CoreError::ToolTimeout {
        tool: tool.to_string(),
        timeout,
    }
}

pub fn tool_failed(tool: &str, reason: impl Into<String>, tail: Vec<String>) -> CoreError {
    CoreError::ToolExecutionFailure {
        tool: tool.to_string(),
        reason: reason.into(),
        tail,
    }
}

pub fn missing_artifact(tool: &str, artifact: &Path, tail: Vec<String>) -> CoreError {
    tool_failed(
        tool,
        format!("exited successfully but produced no output at {}", artifact.display()),
        tail,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_only_on_execution_failure() {
        let err = tool_failed("ffmpeg", "exit code 1", vec!["boom".to_string()]);
        assert_eq!(err.tail(), ["boom".to_string()]);
        assert!(tool_not_found("ffmpeg").tail().is_empty());
    }

    #[test]
    fn test_display_messages() {
        let err = tool_timeout("ffprobe", Duration::from_secs(10));
        assert_eq!(err.to_string(), "Tool 'ffprobe' timed out after 10s");

        let err = missing_artifact("gst", Path::new("/tmp/a.srt"), Vec::new());
        assert!(err.to_string().contains("produced no output at /tmp/a.srt"));
        assert!(CoreError::UserCancelled.is_cancelled());
    }
}
