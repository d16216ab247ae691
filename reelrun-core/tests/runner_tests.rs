// reelrun-core/tests/runner_tests.rs

use reelrun_core::events::{Event, EventDispatcher, EventHandler};
use reelrun_core::*;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn runner() -> JobRunner {
    JobRunner::new(
        CoreConfig::builder()
            .grace_window(Duration::from_millis(200))
            .build(),
    )
}

/// Records every event it sees.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Event>>,
}

impl EventHandler for Recorder {
    fn handle(&self, event: &Event) {
        self.seen.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_second_job_is_rejected_while_first_runs() {
    let runner = runner();
    let first = runner
        .submit(Job::new("first", |ctx| loop {
            ctx.control.cancel.check()?;
            thread::sleep(Duration::from_millis(5));
        }))
        .unwrap();

    let err = runner
        .submit(Job::new("second", |_| Ok(JobOutcome::success("never"))))
        .unwrap_err();
    assert!(matches!(err, CoreError::JobAlreadyRunning(ref name) if name == "first"));
    assert!(!first.status().is_terminal());

    first.request_cancel();
    assert_eq!(first.wait(), JobStatus::Cancelled);
}

#[test]
fn test_slot_frees_after_completion() {
    let runner = runner();
    let handle = runner
        .submit(Job::new("quick", |_| Ok(JobOutcome::success("ok"))))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Done);

    for _ in 0..100 {
        if !runner.is_busy() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let again = runner
        .submit(Job::new("again", |_| Ok(JobOutcome::success("ok"))))
        .unwrap();
    assert_eq!(again.wait(), JobStatus::Done);
}

#[test]
fn test_panicking_job_reports_failure() {
    let runner = runner();
    let handle = runner
        .submit(Job::new("explodes", |_| panic!("unexpected tool output")))
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(recorder.clone());
    let done = dispatcher.drain(handle.events()).unwrap();

    assert!(!done.success);
    assert_eq!(done.status, JobStatus::Failed);
    let seen = recorder.seen.lock().unwrap();
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::Log(l) if l.text.contains("unexpected tool output")
    )));
    assert!(matches!(seen.last(), Some(Event::Done(_))));
}

#[test]
fn test_error_from_job_body_is_failure_with_tail() {
    let runner = runner();
    let handle = runner
        .submit(Job::new("broken", |_| {
            Err(error::tool_failed("ffmpeg", "exited with code 1", vec!["moov atom not found".into()]))
        }))
        .unwrap();

    let done = EventDispatcher::new().drain(handle.events()).unwrap();
    assert!(!done.success);
    assert_eq!(done.tail, vec!["moov atom not found".to_string()]);
}

#[test]
fn test_cancel_without_active_job() {
    let runner = runner();
    assert!(!runner.request_cancel());
    assert_eq!(runner.current_status(), None);
}
