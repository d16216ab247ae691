// ============================================================================
// reelrun-core/src/external/stream.rs
// ============================================================================
//
// SUBPROCESS STREAM READER: Line-by-Line Output of a Running Tool
//
// KEY COMPONENTS:
// - ProcessSpawner: Spawns a real child with piped stdout/stderr
// - LineStream: Lazy, finite, non-restartable sequence of output lines
// - pump_lines: Reader-thread loop splitting raw bytes on '\n' or '\r'
//
// Two reader threads per child push decoded lines into a crossbeam channel.
// The consumer polls that channel with a short timeout so the cancel flag
// and the optional hard timeout are honoured while the child is silent.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::{resolve_program, GroupLeader, ToolInvocation, ToolSpawner};
use crate::config::{CoreConfig, DEFAULT_TAIL_LINES};
use crate::error::{missing_artifact, tool_failed, tool_timeout, CoreError, CoreResult};
use crate::runner::JobControl;
use crate::utils::is_nonempty_file;

/// How long a single wait for the next line blocks before flags are rechecked.
const LINE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between exit-status polls after EOF.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Output of one running tool.
///
/// Dropping a stream that was not finished kills its child.
#[derive(Debug)]
pub struct LineStream {
    tool: String,
    lines: Receiver<String>,
    control: JobControl,
    deadline: Option<(Instant, Duration)>,
    tail: VecDeque<String>,
    tail_limit: usize,
    reaped: bool,
}

impl LineStream {
    /// Wraps a line channel whose child is already registered in
    /// `control.slot`. The stream ends when every sender is dropped.
    pub fn new(
        tool: impl Into<String>,
        lines: Receiver<String>,
        control: JobControl,
        timeout: Option<Duration>,
        tail_limit: usize,
    ) -> Self {
        Self {
            tool: tool.into(),
            lines,
            control,
            deadline: timeout.map(|t| (Instant::now() + t, t)),
            tail: VecDeque::with_capacity(tail_limit),
            tail_limit,
            reaped: false,
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// The last raw lines seen, oldest first.
    pub fn tail(&self) -> Vec<String> {
        self.tail.iter().cloned().collect()
    }

    fn push_tail(&mut self, line: &str) {
        if self.tail_limit == 0 {
            return;
        }
        if self.tail.len() == self.tail_limit {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    /// Cancellation and hard-timeout check shared by both wait loops.
    fn check_interrupts(&mut self) -> CoreResult<()> {
        if self.control.cancel.is_cancelled() {
            self.kill();
            return Err(CoreError::UserCancelled);
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                log::warn!("{} exceeded its {}s limit; killing it", self.tool, timeout.as_secs_f64());
                self.kill();
                return Err(tool_timeout(&self.tool, timeout));
            }
        }
        Ok(())
    }

    /// Blocks until the next line arrives. `Ok(None)` marks end of output.
    ///
    /// Fails with `UserCancelled` once the job's cancel flag is set, and with
    /// `ToolTimeout` when the invocation's hard timeout expires; the child is
    /// killed in both cases.
    pub fn next_line(&mut self) -> CoreResult<Option<String>> {
        loop {
            self.check_interrupts()?;
            match self.lines.recv_timeout(LINE_POLL_INTERVAL) {
                Ok(line) => {
                    self.push_tail(&line);
                    return Ok(Some(line));
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }

    /// Kills the child, if it is still registered.
    pub fn kill(&mut self) {
        if self.control.slot.kill() {
            log::debug!("Killed {}", self.tool);
        }
        self.reaped = true;
    }

    fn wait_for_exit(&mut self) -> CoreResult<i32> {
        loop {
            self.check_interrupts()?;
            match self.control.slot.try_wait() {
                Ok(Some(code)) => return Ok(code),
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => return Err(CoreError::Io(e)),
            }
        }
    }

    /// Waits for the child to exit and checks the result.
    ///
    /// Succeeds only when the exit code is 0 and, if `expected` is given, that
    /// file exists and is non-empty.
    pub fn finish(mut self, expected: Option<&Path>) -> CoreResult<()> {
        let code = self.wait_for_exit()?;
        self.reaped = true;
        log::debug!("{} exited with code {code}", self.tool);

        if code != 0 {
            return Err(tool_failed(
                &self.tool,
                format!("exited with code {code}"),
                self.tail(),
            ));
        }
        if let Some(path) = expected {
            if !is_nonempty_file(path) {
                return Err(missing_artifact(&self.tool, path, self.tail()));
            }
        }
        Ok(())
    }

    /// Reads every remaining line, then waits for a zero exit.
    pub fn read_to_end(mut self) -> CoreResult<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line()? {
            lines.push(line);
        }
        self.finish(None)?;
        Ok(lines)
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        if !self.reaped {
            self.control.slot.kill();
        }
    }
}

/// Reads `reader` to EOF, sending every `\n`- or `\r`-terminated segment as
/// its own line. Empty segments are skipped.
fn pump_lines<R: Read>(reader: R, tx: Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let (consumed, line_complete) = {
            let chunk = match reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Output pipe read failed: {e}");
                    break;
                }
            };
            if chunk.is_empty() {
                break;
            }
            match chunk.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    pending.extend_from_slice(&chunk[..pos]);
                    (pos + 1, true)
                }
                None => {
                    pending.extend_from_slice(chunk);
                    (chunk.len(), false)
                }
            }
        };
        reader.consume(consumed);

        if line_complete && !send_pending(&mut pending, &tx) {
            return;
        }
    }
    send_pending(&mut pending, &tx);
}

/// Returns false once the receiving side has gone away.
fn send_pending(pending: &mut Vec<u8>, tx: &Sender<String>) -> bool {
    let line = String::from_utf8_lossy(pending).trim_end().to_string();
    pending.clear();
    if line.is_empty() {
        return true;
    }
    tx.send(line).is_ok()
}

/// Spawns real child processes.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    tail_lines: usize,
}

impl Default for ProcessSpawner {
    fn default() -> Self {
        Self::new(DEFAULT_TAIL_LINES)
    }
}

impl ProcessSpawner {
    pub fn new(tail_lines: usize) -> Self {
        Self { tail_lines }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.tail_lines)
    }

    fn start_reader<R: Read + Send + 'static>(
        tool: &str,
        which: &str,
        reader: R,
        tx: Sender<String>,
    ) -> CoreResult<()> {
        thread::Builder::new()
            .name(format!("{tool}-{which}"))
            .spawn(move || pump_lines(reader, tx))
            .map(|_| ())
            .map_err(CoreError::Io)
    }
}

impl ToolSpawner for ProcessSpawner {
    fn spawn(&self, invocation: &ToolInvocation, control: &JobControl) -> CoreResult<LineStream> {
        control.cancel.check()?;

        let tool = invocation.tool_name();
        let program = resolve_program(&invocation.program)?;

        let mut cmd = Command::new(&program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        log::debug!(target: "reelrun::tool", "Running: {}", invocation.command_line());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                CoreError::ToolNotFound(tool.clone())
            } else {
                CoreError::CommandStart(tool.clone(), e)
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        control.slot.register(Box::new(GroupLeader::new(child)));

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut started = Ok(());
        if let Some(out) = stdout {
            started = Self::start_reader(&tool, "stdout", out, tx.clone());
        }
        if let Some(err) = stderr.filter(|_| started.is_ok()) {
            started = Self::start_reader(&tool, "stderr", err, tx.clone());
        }
        drop(tx);
        if let Err(e) = started {
            control.slot.kill();
            return Err(e);
        }

        Ok(LineStream::new(
            tool,
            rx,
            control.clone(),
            invocation.timeout,
            self.tail_lines,
        ))
    }
}
