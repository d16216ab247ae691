// ============================================================================
// reelrun-core/src/external/mocks.rs
// ============================================================================
//
// TOOL MOCKS: Scripted Spawner for Tests

// --- Mocking Infrastructure (for testing) ---

// Compiled for unit tests and whenever the "test-mocks" feature is enabled.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{LineStream, ToolInvocation, ToolProcess, ToolSpawner};
use crate::config::DEFAULT_TAIL_LINES;
use crate::error::{CoreError, CoreResult};
use crate::runner::JobControl;

/// Exit code reported by a mock process that was killed.
pub const KILLED_EXIT_CODE: i32 = -9;

/// Scripted behaviour of one mock tool run.
#[derive(Debug, Clone, Default)]
pub struct MockRun {
    pub lines: Vec<String>,
    pub exit_code: i32,
    /// File written (non-empty) after the last line, before exit
    pub output: Option<PathBuf>,
    /// Pause before each line
    pub line_delay: Duration,
    pub not_found: bool,
}

impl MockRun {
    /// A run that exits 0 without output.
    pub fn success() -> Self {
        Self::default()
    }

    /// A run that prints `lines` and exits 0.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A spawn that fails with `ToolNotFound`.
    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn writes(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }
}

struct MockProcess {
    exit: Arc<Mutex<Option<i32>>>,
    killed: Arc<AtomicBool>,
}

impl ToolProcess for MockProcess {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(*self.exit.lock().unwrap_or_else(|p| p.into_inner()))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.exit
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get_or_insert(KILLED_EXIT_CODE);
        Ok(())
    }
}

#[derive(Default)]
struct MockState {
    expectations: Vec<(String, MockRun)>,
    fallback: Option<MockRun>,
    calls: Vec<ToolInvocation>,
}

/// Mock implementation of ToolSpawner supporting multiple expectations.
///
/// An invocation matches an expectation when its program or any argument
/// contains the pattern. Each expectation is used once, in insertion order;
/// the fallback (if any) answers everything else.
#[derive(Clone, Default)]
pub struct MockToolSpawner {
    state: Arc<Mutex<MockState>>,
}

impl MockToolSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn expect(&self, pattern: &str, run: MockRun) {
        self.state().expectations.push((pattern.to_string(), run));
    }

    pub fn fallback(&self, run: MockRun) {
        self.state().fallback = Some(run);
    }

    /// Every invocation received so far, in order.
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    fn take_run(&self, invocation: &ToolInvocation) -> Option<MockRun> {
        let mut state = self.state();
        state.calls.push(invocation.clone());

        let matches = |pattern: &str| {
            invocation.program.contains(pattern)
                || invocation.args.iter().any(|arg| arg.contains(pattern))
        };
        match state.expectations.iter().position(|(p, _)| matches(p.as_str())) {
            Some(index) => {
                let (pattern, run) = state.expectations.remove(index);
                log::debug!("MockToolSpawner: matched expectation '{pattern}'");
                Some(run)
            }
            None => state.fallback.clone(),
        }
    }
}

fn feed(
    run: MockRun,
    tx: crossbeam_channel::Sender<String>,
    exit: Arc<Mutex<Option<i32>>>,
    killed: Arc<AtomicBool>,
) {
    for line in run.lines {
        if killed.load(Ordering::SeqCst) {
            break;
        }
        if !run.line_delay.is_zero() {
            thread::sleep(run.line_delay);
        }
        if tx.send(line).is_err() {
            break;
        }
    }

    if !killed.load(Ordering::SeqCst) {
        if let Some(path) = &run.output {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(path, b"mock output\n") {
                log::error!("MockToolSpawner failed to create {}: {e}", path.display());
            }
        }
    }

    exit.lock()
        .unwrap_or_else(|p| p.into_inner())
        .get_or_insert(run.exit_code);
    drop(tx);
}

impl ToolSpawner for MockToolSpawner {
    fn spawn(&self, invocation: &ToolInvocation, control: &JobControl) -> CoreResult<LineStream> {
        control.cancel.check()?;
        let tool = invocation.tool_name();

        let Some(run) = self.take_run(invocation) else {
            log::warn!("MockToolSpawner: unexpected invocation {}", invocation.command_line());
            return Err(CoreError::ToolNotFound(tool));
        };
        if run.not_found {
            return Err(CoreError::ToolNotFound(tool));
        }

        let exit = Arc::new(Mutex::new(None));
        let killed = Arc::new(AtomicBool::new(false));
        control.slot.register(Box::new(MockProcess {
            exit: exit.clone(),
            killed: killed.clone(),
        }));

        let (tx, rx) = crossbeam_channel::unbounded();
        thread::spawn(move || feed(run, tx, exit, killed));

        Ok(LineStream::new(
            tool,
            rx,
            control.clone(),
            invocation.timeout,
            DEFAULT_TAIL_LINES,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_streams_lines_and_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.srt");
        let spawner = MockToolSpawner::new();
        spawner.expect("ffmpeg", MockRun::lines(["a", "b"]).writes(&out));

        let control = JobControl::new();
        let mut stream = spawner
            .spawn(&ToolInvocation::new("ffmpeg").arg("-y"), &control)
            .unwrap();
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(stream.next_line().unwrap(), None);
        stream.finish(Some(&out)).unwrap();
        assert!(!control.slot.is_occupied());
    }

    #[test]
    fn test_unexpected_invocation_is_not_found() {
        let spawner = MockToolSpawner::new();
        let result = spawner.spawn(&ToolInvocation::new("gst"), &JobControl::new());
        assert!(matches!(result, Err(CoreError::ToolNotFound(_))));
        assert_eq!(spawner.call_count(), 1);
    }
}
