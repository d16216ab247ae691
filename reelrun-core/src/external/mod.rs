// ============================================================================
// reelrun-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Spawning and Reading External CLI Tools
//
// This module encapsulates every interaction with the external media tools
// (transcoder, probe, downloader, translator, speech-to-text wrapper). The
// engine never talks to `std::process` directly: it describes a run as a
// `ToolInvocation` and hands it to a `ToolSpawner`, which returns a
// `LineStream` of the tool's output.
//
// KEY COMPONENTS:
// - ToolInvocation: Immutable description of one tool run
// - ToolKind: Tool identity, used to pick the output parser
// - ToolSpawner / ToolProcess: Traits at the process boundary
// - ProcessSpawner: Real implementation backed by std::process
// - GroupLeader: Spawned child whose kill takes its process group with it
// - Dependency resolution via `which`
//
// The traits allow the batch and runner tests to script tool output through
// `mocks::MockToolSpawner` instead of launching binaries.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::runner::JobControl;

pub mod probe;
pub mod stream;

#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;

pub use probe::{probe_audio_channels, probe_duration};
pub use stream::{LineStream, ProcessSpawner};

/// Identity of the tool behind an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// ffmpeg encoding with `time=`/`speed=` progress
    Transcoder,
    /// ffmpeg stream copy of a subtitle track
    SubtitleExtractor,
    /// ffprobe diagnostic calls
    Probe,
    Downloader,
    Translator,
    /// Speech-to-text wrapper script
    Transcriber,
}

impl ToolKind {
    pub fn label(self) -> &'static str {
        match self {
            ToolKind::Transcoder => "transcoder",
            ToolKind::SubtitleExtractor => "subtitle extractor",
            ToolKind::Probe => "probe",
            ToolKind::Downloader => "downloader",
            ToolKind::Translator => "translator",
            ToolKind::Transcriber => "transcriber",
        }
    }
}

/// One external tool run: program, arguments, working directory,
/// environment overrides and an optional hard timeout.
///
/// Long-running jobs carry no timeout; cancellation is their only early exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Name used in errors and logs, when it differs from the program
    pub display_name: Option<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            timeout: None,
            display_name: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Short name of the tool for messages: the display name if set, else
    /// the file name of the program.
    pub fn tool_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.clone())
    }

    /// The command line as it would be typed, for debug logs. Environment
    /// values are never included.
    pub fn command_line(&self) -> String {
        let mut parts = vec![crate::utils::shell_quote(&self.program)];
        parts.extend(self.args.iter().map(|a| crate::utils::shell_quote(a)));
        parts.join(" ")
    }
}

/// A running child process as seen by the force-kill path.
pub trait ToolProcess: Send {
    /// Non-blocking exit check. Returns the exit code once the process is gone;
    /// a process ended by a signal reports `-1`.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;

    fn kill(&mut self) -> io::Result<()>;
}

/// A spawned tool that leads its own process group.
///
/// Wrapper scripts start the real work in grandchildren (`bash` running a
/// speech-to-text model, `python3` running a translator). Killing only the
/// direct child would leave those running, so on unix the whole group is
/// signalled.
pub struct GroupLeader {
    child: Child,
}

impl GroupLeader {
    /// Wraps a child that was spawned with `process_group(0)`.
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    #[cfg(unix)]
    fn kill_group(&mut self) -> io::Result<()> {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(self.child.id() as i32);
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => Ok(()),
            Err(errno) => {
                log::debug!("killpg({pgid}) failed: {errno}; killing the leader only");
                self.child.kill()
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&mut self) -> io::Result<()> {
        self.child.kill()
    }
}

impl ToolProcess for GroupLeader {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.kill_group()?;
        // Reap so the leader does not linger as a zombie.
        self.child.wait().map(|_| ())
    }
}

/// Launches tool invocations.
///
/// `control` carries the job's cancel token and process slot; the spawner
/// registers the child in the slot so the runner can force-kill it.
pub trait ToolSpawner: Send + Sync {
    fn spawn(&self, invocation: &ToolInvocation, control: &JobControl) -> CoreResult<LineStream>;
}

/// Resolves a program on `PATH` (or checks an explicit path).
///
/// Returns `ToolNotFound` when the program cannot be located.
pub fn resolve_program(program: &str) -> CoreResult<PathBuf> {
    which::which(program).map_err(|e| {
        log::warn!("Dependency '{program}' not found: {e}");
        CoreError::ToolNotFound(program.to_string())
    })
}

/// Checks that every listed program can be resolved, reporting the first
/// missing one.
pub fn check_dependencies(programs: &[&str]) -> CoreResult<()> {
    for program in programs {
        let path = resolve_program(program)?;
        log::debug!("Found dependency {program} at {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = ToolInvocation::new("/usr/bin/ffmpeg")
            .arg("-y")
            .args(["-i", "in put.mkv"])
            .env("GEMINI_API_KEY", "secret")
            .timeout(Duration::from_secs(10));

        assert_eq!(inv.tool_name(), "ffmpeg");
        assert_eq!(inv.args, vec!["-y", "-i", "in put.mkv"]);
        assert_eq!(inv.timeout, Some(Duration::from_secs(10)));
        assert_eq!(inv.command_line(), "/usr/bin/ffmpeg -y -i 'in put.mkv'");
        assert!(!inv.command_line().contains("secret"));
    }

    #[test]
    fn test_display_name_overrides_program() {
        let inv = ToolInvocation::new("sh").display_name("N_m3u8DL-RE");
        assert_eq!(inv.tool_name(), "N_m3u8DL-RE");
    }

    #[test]
    fn test_resolve_missing_program() {
        let err = resolve_program("reelrun-definitely-not-installed").unwrap_err();
        assert!(matches!(err, CoreError::ToolNotFound(_)));
        assert!(resolve_program("sh").is_ok());
    }
}
