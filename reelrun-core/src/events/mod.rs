// ============================================================================
// reelrun-core/src/events/mod.rs
// ============================================================================
//
// EVENTS: From a Running Job to Its Observer
//
// The worker thread owns an `EventSink` and pushes `Event`s into a
// `crossbeam-channel` channel in the exact order they are produced. The
// observer drains the receiving end, usually through an `EventDispatcher`
// that fans every event out to a set of `EventHandler`s.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::runner::JobStatus;

pub mod json_handler;
pub mod log_handler;

pub use json_handler::JsonEventHandler;
pub use log_handler::LogForwardingHandler;

/// Severity attached to a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One human-readable line for the observer's log view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub text: String,
    pub severity: Severity,
}

impl LogEvent {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Info)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Warning)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Error)
    }
}

/// Fractional completion of the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// 1-based index of the active item
    pub item_index: usize,
    pub item_total: usize,
    /// Combined batch percentage (0-100), `None` when indeterminate
    pub percent: Option<f64>,
    /// Percentage of the active item, `None` when indeterminate
    pub item_percent: Option<f64>,
    pub label: String,
}

/// Terminal event, sent exactly once per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoneEvent {
    pub success: bool,
    pub status: JobStatus,
    pub summary: String,
    /// Raw tool output attached to a failure
    pub tail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Log(LogEvent),
    Progress(ProgressEvent),
    Done(DoneEvent),
}

/// Creates the channel between a job and its observer.
pub fn channel() -> (EventSink, Receiver<Event>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        EventSink {
            tx,
            open: Arc::new(Mutex::new(true)),
        },
        rx,
    )
}

/// Sending half of the event channel.
///
/// Sending never fails from the worker's point of view: once the observer
/// has hung up, events are dropped. The first `Done` closes every clone of
/// the sink, so nothing follows the terminal event.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<Event>,
    open: Arc<Mutex<bool>>,
}

impl EventSink {
    pub fn send(&self, event: Event) {
        let mut open = self.open.lock().unwrap_or_else(|p| p.into_inner());
        if !*open {
            log::trace!("event after terminal event dropped");
            return;
        }
        if matches!(event, Event::Done(_)) {
            *open = false;
        }
        if self.tx.send(event).is_err() {
            log::trace!("event observer disconnected; dropping event");
        }
    }

    /// False once the terminal event has been sent.
    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn log(&self, event: LogEvent) {
        self.send(Event::Log(event));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogEvent::info(text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.log(LogEvent::warning(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogEvent::error(text));
    }

    pub fn progress(&self, event: ProgressEvent) {
        self.send(Event::Progress(event));
    }

    pub fn done(&self, event: DoneEvent) {
        self.send(Event::Done(event));
    }
}

/// Observer-side consumer of events.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

/// Fans events out to every registered handler, in registration order.
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: &Event) {
        for handler in &self.handlers {
            handler.handle(event);
        }
    }

    /// Drains `rx` until the terminal event arrives or the channel closes.
    ///
    /// Returns the terminal event, or `None` if the sender went away first.
    pub fn drain(&self, rx: &Receiver<Event>) -> Option<DoneEvent> {
        for event in rx.iter() {
            self.emit(&event);
            if let Event::Done(done) = event {
                return Some(done);
            }
        }
        None
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl EventHandler for Recorder {
        fn handle(&self, event: &Event) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_dispatcher_drains_until_done() {
        let (sink, rx) = channel();
        sink.info("starting");
        sink.error("boom");
        sink.done(DoneEvent {
            success: false,
            status: JobStatus::Failed,
            summary: "failed".to_string(),
            tail: Vec::new(),
        });
        sink.info("after done");

        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(recorder.clone());

        let done = dispatcher.drain(&rx).expect("terminal event");
        assert!(!done.success);

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1], Event::Log(LogEvent::error("boom")));
    }

    #[test]
    fn test_nothing_follows_done() {
        let (sink, rx) = channel();
        let clone = sink.clone();
        sink.done(DoneEvent {
            success: true,
            status: JobStatus::Done,
            summary: "ok".to_string(),
            tail: Vec::new(),
        });
        clone.warning("late");
        clone.done(DoneEvent {
            success: false,
            status: JobStatus::Cancelled,
            summary: "again".to_string(),
            tail: Vec::new(),
        });
        assert!(!clone.is_open());
        drop((sink, clone));
        let events: Vec<Event> = rx.iter().collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_sink_survives_dropped_observer() {
        let (sink, rx) = channel();
        drop(rx);
        sink.info("nobody listens");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::Log(LogEvent::warning("careful"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["text"], "careful");
    }
}
