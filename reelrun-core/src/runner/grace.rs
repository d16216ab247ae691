// ============================================================================
// reelrun-core/src/runner/grace.rs
// ============================================================================
//
// GRACE TIMER: Deadline for Cooperative Cancellation
//
// Armed when a cancel is requested. If the worker has not finished when the
// window elapses, the timer's action runs (kill the child, mark the job
// cancelled). Dropping the timer disarms it.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

pub struct GraceTimer {
    // Dropping the sender wakes the timer thread without firing.
    _disarm: Sender<()>,
}

impl GraceTimer {
    pub fn arm<F>(window: Duration, on_expiry: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        thread::Builder::new()
            .name("reelrun-grace".to_string())
            .spawn(move || match rx.recv_timeout(window) {
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!("Grace window of {}s elapsed", window.as_secs_f64());
                    on_expiry();
                }
                _ => log::trace!("Grace timer disarmed"),
            })?;
        Ok(Self { _disarm: tx })
    }
}
