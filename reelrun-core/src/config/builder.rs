// ============================================================================
// reelrun-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// This module implements the builder pattern for the CoreConfig structure,
// providing a fluent API for overriding tool names and timing bounds while
// keeping every other field at its default.

// ---- Standard library imports ----
use std::path::PathBuf;
use std::time::Duration;

// ---- Internal crate imports ----
use super::{CoreConfig, SuccessPolicy};

/// Builder for creating CoreConfig instances.
///
/// # Examples
///
/// ```rust
/// use reelrun_core::config::CoreConfigBuilder;
///
/// let config = CoreConfigBuilder::new()
///     .ffmpeg("/opt/ffmpeg/bin/ffmpeg")
///     .downloader("N_m3u8DL-RE")
///     .build();
/// assert_eq!(config.tools.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Creates a builder seeded with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ffmpeg(mut self, program: impl Into<String>) -> Self {
        self.config.tools.ffmpeg = program.into();
        self
    }

    pub fn ffprobe(mut self, program: impl Into<String>) -> Self {
        self.config.tools.ffprobe = program.into();
        self
    }

    pub fn downloader(mut self, program: impl Into<String>) -> Self {
        self.config.tools.downloader = program.into();
        self
    }

    pub fn translator(mut self, program: impl Into<String>) -> Self {
        self.config.tools.translator = program.into();
        self
    }

    pub fn transcriber_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.config.tools.transcriber_script = script.into();
        self
    }

    /// Sets the cooperative-cancellation window.
    pub fn grace_window(mut self, window: Duration) -> Self {
        self.config.grace_window = window;
        self
    }

    /// Sets the hard timeout applied to diagnostic probes.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn tail_lines(mut self, lines: usize) -> Self {
        self.config.tail_lines = lines;
        self
    }

    pub fn success_policy(mut self, policy: SuccessPolicy) -> Self {
        self.config.success_policy = policy;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Finishes the builder. Call [`CoreConfig::validate`] before use.
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_fields() {
        let config = CoreConfigBuilder::new()
            .ffprobe("/usr/local/bin/ffprobe")
            .translator("python3 -m gemini_srt_translator")
            .grace_window(Duration::from_millis(500))
            .probe_timeout(Duration::from_secs(2))
            .tail_lines(10)
            .success_policy(SuccessPolicy::MinRatio(0.5))
            .temp_dir("/tmp/reelrun")
            .build();

        assert_eq!(config.tools.ffprobe, "/usr/local/bin/ffprobe");
        assert_eq!(config.tools.translator, "python3 -m gemini_srt_translator");
        assert_eq!(config.grace_window, Duration::from_millis(500));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.tail_lines, 10);
        assert_eq!(config.success_policy, SuccessPolicy::MinRatio(0.5));
        assert_eq!(config.temp_base(), PathBuf::from("/tmp/reelrun"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_defaults_match_core_defaults() {
        let built = CoreConfigBuilder::new().build();
        let default = CoreConfig::default();
        assert_eq!(built.tools.ffmpeg, default.tools.ffmpeg);
        assert_eq!(built.grace_window, default.grace_window);
    }
}
