// ============================================================================
// reelrun-core/src/config/mod.rs
// ============================================================================
//
// CONFIGURATION: Settings Shared Across the Core
//
// The configuration shared by the job runner, the
// stream reader and the pipelines: tool program names, timing bounds and
// the batch success policy.

mod builder;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

pub use builder::CoreConfigBuilder;

// Default constants

/// Time a cancelled job gets to stop cooperatively before its child process
/// is killed.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(3);

/// Hard bound for short diagnostic calls such as the duration probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of raw output lines kept for failure reports.
pub const DEFAULT_TAIL_LINES: usize = 5;

pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_FFPROBE: &str = "ffprobe";
pub const DEFAULT_DOWNLOADER: &str = "N_m3u8DL-RE";
pub const DEFAULT_TRANSLATOR: &str = "gst";
pub const DEFAULT_TRANSCRIBER_SCRIPT: &str = "whisper_auto.sh";

/// Decides whether a finished batch counts as successful.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SuccessPolicy {
    /// At least one item succeeded (or was already done).
    #[default]
    AnySucceeded,
    /// No item failed.
    AllSucceeded,
    /// The share of satisfied items is at least the given ratio (0.0-1.0).
    MinRatio(f64),
}

/// Program names (or paths) of the external tools.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// Transcoder, also used for subtitle and audio extraction
    pub ffmpeg: String,
    /// Media probe
    pub ffprobe: String,
    /// Segmented-stream downloader
    pub downloader: String,
    /// Subtitle translator
    pub translator: String,
    /// Speech-to-text wrapper script, run through `bash`
    pub transcriber_script: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: DEFAULT_FFMPEG.to_string(),
            ffprobe: DEFAULT_FFPROBE.to_string(),
            downloader: DEFAULT_DOWNLOADER.to_string(),
            translator: DEFAULT_TRANSLATOR.to_string(),
            transcriber_script: PathBuf::from(DEFAULT_TRANSCRIBER_SCRIPT),
        }
    }
}

/// Main configuration structure for the reelrun-core library.
///
/// All fields have sensible defaults; the builder provides a fluent way to
/// override them.
///
/// # Examples
///
/// ```rust
/// use reelrun_core::config::{CoreConfigBuilder, SuccessPolicy};
/// use std::time::Duration;
///
/// let config = CoreConfigBuilder::new()
///     .grace_window(Duration::from_secs(5))
///     .tail_lines(10)
///     .success_policy(SuccessPolicy::AllSucceeded)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub tools: ToolPaths,

    /// Cooperative-cancellation window before the child is force-killed
    pub grace_window: Duration,

    /// Hard timeout for diagnostic probes
    pub probe_timeout: Duration,

    /// Raw output lines attached to failure reports
    pub tail_lines: usize,

    pub success_policy: SuccessPolicy,

    /// Optional directory for temporary files (defaults to the system temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            grace_window: DEFAULT_GRACE_WINDOW,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            tail_lines: DEFAULT_TAIL_LINES,
            success_policy: SuccessPolicy::default(),
            temp_dir: None,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        let programs = [
            ("ffmpeg", self.tools.ffmpeg.as_str()),
            ("ffprobe", self.tools.ffprobe.as_str()),
            ("downloader", self.tools.downloader.as_str()),
            ("translator", self.tools.translator.as_str()),
        ];
        for (label, program) in programs {
            if program.trim().is_empty() {
                return Err(CoreError::Config(format!("{label} program name is empty")));
            }
        }
        if self.grace_window.is_zero() {
            return Err(CoreError::Config("grace window must be greater than zero".to_string()));
        }
        if self.probe_timeout.is_zero() {
            return Err(CoreError::Config("probe timeout must be greater than zero".to_string()));
        }
        if let SuccessPolicy::MinRatio(ratio) = self.success_policy {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(CoreError::Config(format!(
                    "success ratio must be between 0 and 1, got {ratio}"
                )));
            }
        }
        Ok(())
    }

    /// Base directory for temporary files.
    #[must_use]
    pub fn temp_base(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
