// ============================================================================
// reelrun-core/src/runner/worker.rs
// ============================================================================
//
// WORKER THREAD: Job Body Under `catch_unwind`
//
// Runs the job closure and maps its result onto the terminal transition.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{Job, JobContext, JobOutcome, JobState, JobStatus};
use crate::config::CoreConfig;
use crate::error::CoreError;

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub(super) fn run_job(job: Job, state: Arc<JobState>, config: Arc<CoreConfig>) {
    state.mark_running();
    log::info!("Job '{}' started", state.name);

    let ctx = JobContext {
        sink: state.sink.clone(),
        control: state.control.clone(),
        config,
    };
    let body = job.body;
    let result = panic::catch_unwind(AssertUnwindSafe(|| body(&ctx)));

    // Nothing may outlive the job.
    if state.control.slot.kill() {
        log::debug!("Killed a child left running by job '{}'", state.name);
    }

    let cancel_requested = state.control.cancel.is_cancelled();
    let (status, outcome) = match result {
        Ok(Ok(outcome)) if cancel_requested => (JobStatus::Cancelled, outcome),
        Ok(Ok(outcome)) if outcome.success => (JobStatus::Done, outcome),
        Ok(Ok(outcome)) => (JobStatus::Failed, outcome),
        Ok(Err(CoreError::UserCancelled)) => {
            (JobStatus::Cancelled, JobOutcome::failure("Cancelled by user", Vec::new()))
        }
        Ok(Err(e)) => {
            ctx.sink.error(format!("Job failed: {e}"));
            let tail = e.tail().to_vec();
            (JobStatus::Failed, JobOutcome::failure(e.to_string(), tail))
        }
        Err(payload) => {
            let err = CoreError::WorkerPanic(panic_message(payload.as_ref()));
            log::error!("Job '{}': {err}", state.name);
            ctx.sink.error(err.to_string());
            (JobStatus::Failed, JobOutcome::failure(err.to_string(), Vec::new()))
        }
    };

    if state.finish(status, outcome) {
        log::info!("Job '{}' finished: {status:?}", state.name);
    } else {
        log::debug!(
            "Job '{}' worker exited after the grace window had already ended it",
            state.name
        );
    }
}
