// ============================================================================
// reelrun-core/src/events/log_handler.rs
// ============================================================================
//
// LOG FORWARDING: Mirrors Job Events Into the `log` Facade
//
// When file logging is enabled the observer registers this handler next to
// its display handler, so every log line, a throttled view of progress and
// the terminal summary end up in the log file.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::{Event, EventHandler, Severity};

/// Minimum progress step (in percent) between two logged progress lines.
const PROGRESS_LOG_STEP: f64 = 10.0;

/// Progress is logged at least this often, even without a full step.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(30);

pub struct LogForwardingHandler {
    last_logged_percent: Mutex<f64>,
    last_log_time: Mutex<Option<Instant>>,
}

impl Default for LogForwardingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LogForwardingHandler {
    pub fn new() -> Self {
        Self {
            last_logged_percent: Mutex::new(-PROGRESS_LOG_STEP),
            last_log_time: Mutex::new(None),
        }
    }

    fn should_log_progress(&self, percent: f64) -> bool {
        let (Ok(mut last_percent), Ok(mut last_time)) =
            (self.last_logged_percent.lock(), self.last_log_time.lock())
        else {
            return false;
        };

        let due = percent >= 100.0
            || percent - *last_percent >= PROGRESS_LOG_STEP
            || last_time.is_none_or(|t| t.elapsed() >= PROGRESS_LOG_INTERVAL);
        if due {
            *last_percent = percent;
            *last_time = Some(Instant::now());
        }
        due
    }
}

impl EventHandler for LogForwardingHandler {
    fn handle(&self, event: &Event) {
        match event {
            Event::Log(line) => match line.severity {
                Severity::Info => info!("{}", line.text),
                Severity::Warning => warn!("{}", line.text),
                Severity::Error => error!("{}", line.text),
            },

            Event::Progress(progress) => match progress.percent {
                Some(percent) if self.should_log_progress(percent) => {
                    info!(
                        target: "reelrun::progress",
                        "[{}/{}] {:.1}% {}",
                        progress.item_index, progress.item_total, percent, progress.label
                    );
                }
                Some(_) => {}
                None => debug!(
                    target: "reelrun::progress",
                    "[{}/{}] {}",
                    progress.item_index, progress.item_total, progress.label
                ),
            },

            Event::Done(done) => {
                if done.success {
                    info!("Job finished ({:?}): {}", done.status, done.summary);
                } else {
                    error!("Job finished ({:?}): {}", done.status, done.summary);
                    for line in &done.tail {
                        error!("  | {line}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_logging_is_throttled() {
        let handler = LogForwardingHandler::new();
        assert!(handler.should_log_progress(0.0));
        assert!(!handler.should_log_progress(4.0));
        assert!(handler.should_log_progress(10.0));
        assert!(!handler.should_log_progress(15.0));
        assert!(handler.should_log_progress(100.0));
    }
}
