// ============================================================================
// reelrun-core/src/runner/mod.rs
// ============================================================================
//
// JOB RUNNER: Single-Slot Background Job Execution with Cancellation
//
// The runner owns at most one active job. A submitted job runs on its own
// worker thread and reports to the observer through the event channel
// returned with its handle. Cancellation is two-phase: the cancel flag is
// set and the job moves to `Cancelling`; if the worker has not finished when
// the grace window elapses, the live child is killed and the job is marked
// `Cancelled` regardless.
//
// KEY COMPONENTS:
// - Job / JobContext: The unit of work and what it sees while running
// - JobRunner: Enforces the single active slot
// - JobHandle: Observer-side status, wait and cancel
// - cancel: CancelToken, ProcessSlot, JobControl
// - grace: The grace timer
// - worker: The worker thread body
//
// The terminal transition happens under the status lock, so exactly one
// `Done` event is emitted per job whichever side (worker or grace timer)
// gets there first.

pub mod cancel;
pub mod grace;
mod worker;

pub use cancel::{CancelToken, JobControl, ProcessSlot};

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{self, DoneEvent, Event, EventSink};
use grace::GraceTimer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Cancelling,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// What a job body reports when it returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobOutcome {
    pub success: bool,
    pub summary: String,
    pub tail: Vec<String>,
}

impl JobOutcome {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            tail: Vec::new(),
        }
    }

    pub fn failure(summary: impl Into<String>, tail: Vec<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            tail,
        }
    }
}

/// What a running job sees.
pub struct JobContext {
    pub sink: EventSink,
    pub control: JobControl,
    pub config: Arc<CoreConfig>,
}

type JobBody = Box<dyn FnOnce(&JobContext) -> CoreResult<JobOutcome> + Send + 'static>;

/// A unit of work for the runner.
pub struct Job {
    name: String,
    body: JobBody,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&JobContext) -> CoreResult<JobOutcome> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

/// State shared by the worker, the grace timer and every handle.
pub(crate) struct JobState {
    name: String,
    status: Mutex<JobStatus>,
    changed: Condvar,
    control: JobControl,
    sink: EventSink,
    grace: Mutex<Option<GraceTimer>>,
    grace_window: Duration,
}

impl JobState {
    fn status(&self) -> JobStatus {
        *lock(&self.status)
    }

    fn mark_running(&self) {
        let mut status = lock(&self.status);
        if *status == JobStatus::Pending {
            *status = JobStatus::Running;
            self.changed.notify_all();
        }
    }

    /// Performs the terminal transition. Returns false when another path
    /// already ended the job.
    fn finish(&self, terminal: JobStatus, outcome: JobOutcome) -> bool {
        let mut status = lock(&self.status);
        if status.is_terminal() {
            return false;
        }
        *status = terminal;
        self.sink.done(DoneEvent {
            success: terminal == JobStatus::Done,
            status: terminal,
            summary: outcome.summary,
            tail: outcome.tail,
        });
        self.changed.notify_all();
        drop(status);

        // Disarm a pending grace timer.
        lock(&self.grace).take();
        true
    }

    fn request_cancel(self: &Arc<Self>) -> bool {
        {
            let mut status = lock(&self.status);
            match *status {
                JobStatus::Pending | JobStatus::Running => *status = JobStatus::Cancelling,
                _ => return false,
            }
            self.changed.notify_all();
        }

        self.control.cancel.cancel();
        self.sink.warning("Cancellation requested; stopping the current tool");
        log::info!(
            "Cancelling job '{}' ({}s grace)",
            self.name,
            self.grace_window.as_secs_f64()
        );

        let state = Arc::clone(self);
        match GraceTimer::arm(self.grace_window, move || state.force_cancel()) {
            Ok(timer) => {
                // The worker may have finished in the meantime.
                if !self.status().is_terminal() {
                    *lock(&self.grace) = Some(timer);
                }
            }
            Err(e) => {
                log::error!("Could not start grace timer: {e}; killing immediately");
                self.force_cancel();
            }
        }
        true
    }

    fn force_cancel(&self) {
        if self.control.slot.kill() {
            log::warn!(
                "Job '{}' did not stop within the grace window; child killed",
                self.name
            );
        }
        self.finish(
            JobStatus::Cancelled,
            JobOutcome::failure("Cancelled by user", Vec::new()),
        );
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Option<JobStatus> {
        let mut status = lock(&self.status);
        loop {
            if status.is_terminal() {
                return Some(*status);
            }
            match deadline {
                None => {
                    status = self
                        .changed
                        .wait(status)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    status = self
                        .changed
                        .wait_timeout(status, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0;
                }
            }
        }
    }
}

/// Observer-side handle of a submitted job.
pub struct JobHandle {
    state: Arc<JobState>,
    events: Receiver<Event>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// The job's events, in the order they were produced.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Requests cancellation. Returns false if the job had already ended or
    /// was already cancelling.
    pub fn request_cancel(&self) -> bool {
        self.state.request_cancel()
    }

    /// Blocks until the job reaches a terminal status.
    pub fn wait(&self) -> JobStatus {
        self.state
            .wait_until(None)
            .unwrap_or(JobStatus::Failed)
    }

    /// Like [`JobHandle::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobStatus> {
        self.state.wait_until(Some(Instant::now() + timeout))
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("name", &self.state.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Runs at most one job at a time.
pub struct JobRunner {
    config: Arc<CoreConfig>,
    active: Arc<Mutex<Option<Arc<JobState>>>>,
}

/// Frees the runner's active slot when the worker thread exits.
struct ActiveGuard {
    active: Arc<Mutex<Option<Arc<JobState>>>>,
    state: Arc<JobState>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|s| Arc::ptr_eq(s, &self.state)) {
            *active = None;
        }
    }
}

impl JobRunner {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Starts `job` on a worker thread.
    ///
    /// Fails with `JobAlreadyRunning` while another job's worker is alive;
    /// the running job is not affected.
    pub fn submit(&self, job: Job) -> CoreResult<JobHandle> {
        let mut active = lock(&self.active);
        if let Some(current) = active.as_ref() {
            log::warn!("Rejected job '{}': '{}' is still running", job.name, current.name);
            return Err(CoreError::JobAlreadyRunning(current.name.clone()));
        }

        let (sink, events) = events::channel();
        let state = Arc::new(JobState {
            name: job.name.clone(),
            status: Mutex::new(JobStatus::Pending),
            changed: Condvar::new(),
            control: JobControl::new(),
            sink,
            grace: Mutex::new(None),
            grace_window: self.config.grace_window,
        });
        *active = Some(Arc::clone(&state));
        drop(active);

        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            state: Arc::clone(&state),
        };
        let worker_state = Arc::clone(&state);
        let config = Arc::clone(&self.config);
        let spawned = thread::Builder::new()
            .name(format!("reelrun-job-{}", job.name))
            .spawn(move || {
                let _guard = guard;
                worker::run_job(job, worker_state, config);
            });

        // On spawn failure the closure (and its guard) is dropped, which
        // frees the slot again.
        spawned.map_err(|e| CoreError::CommandStart("job worker".to_string(), e))?;
        Ok(JobHandle { state, events })
    }

    /// Whether a job's worker is still alive.
    pub fn is_busy(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn current_status(&self) -> Option<JobStatus> {
        lock(&self.active).as_ref().map(|s| s.status())
    }

    /// Cancels the active job, if any.
    pub fn request_cancel(&self) -> bool {
        let current = lock(&self.active).clone();
        current.is_some_and(|state| state.request_cancel())
    }
}
