// reelrun-core/tests/batch_tests.rs
//
// End-to-end batches through the job runner, with tool output scripted by
// the mock spawner.

use reelrun_core::events::{DoneEvent, Event, ProgressEvent, Severity};
use reelrun_core::external::mocks::{MockRun, MockToolSpawner};
use reelrun_core::pipelines::{ExtractPipeline, TranslateOptions, TranslatePipeline};
use reelrun_core::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

// --- Test Helper Functions ---

fn runner() -> JobRunner {
    JobRunner::new(
        CoreConfig::builder()
            .grace_window(Duration::from_millis(300))
            .build(),
    )
}

fn collect(handle: &JobHandle) -> Vec<Event> {
    handle.events().try_iter().collect()
}

fn done_of(events: &[Event]) -> Vec<DoneEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Done(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

fn progress_of(events: &[Event]) -> Vec<ProgressEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

fn make_mkvs(dir: &Path, count: usize) {
    for i in 1..=count {
        fs::write(dir.join(format!("{i}.mkv")), b"video").unwrap();
    }
}

// --- Tests ---

#[test]
fn test_rerun_skips_existing_outputs() {
    let downloads = tempdir().unwrap();
    let subs = downloads.path().join("subs");
    make_mkvs(downloads.path(), 3);
    fs::create_dir_all(&subs).unwrap();
    for i in 1..=3 {
        fs::write(subs.join(format!("{i}.srt")), "1\n").unwrap();
    }

    let spawner = Arc::new(MockToolSpawner::new());
    let pipeline = ExtractPipeline::new(downloads.path(), &subs);
    let handle = runner()
        .submit(batch_job(spawner.clone(), Box::new(pipeline)))
        .unwrap();

    assert_eq!(handle.wait(), JobStatus::Done);
    assert_eq!(spawner.call_count(), 0);

    let done = done_of(&collect(&handle));
    assert_eq!(done.len(), 1);
    assert!(done[0].success);
    assert_eq!(done[0].summary, "0 run / 3 skipped / 0 failed of 3");
}

#[test]
fn test_failed_item_does_not_stop_the_batch() {
    let downloads = tempdir().unwrap();
    let subs = downloads.path().join("subs");
    make_mkvs(downloads.path(), 3);

    let spawner = Arc::new(MockToolSpawner::new());
    spawner.expect("1.mkv", MockRun::success().writes(subs.join("1.srt")));
    spawner.expect(
        "2.mkv",
        MockRun::lines(["Stream #0:2: Subtitle: none", "Invalid data found"]).exit_code(1),
    );
    spawner.expect("3.mkv", MockRun::success().writes(subs.join("3.srt")));

    let pipeline = ExtractPipeline::new(downloads.path(), &subs);
    let handle = runner()
        .submit(batch_job(spawner.clone(), Box::new(pipeline)))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Done);
    assert_eq!(spawner.call_count(), 3);

    let events = collect(&handle);
    let done = done_of(&events);
    assert!(done[0].success);
    assert_eq!(done[0].summary, "2 run / 0 skipped / 1 failed of 3");
    assert_eq!(done[0].tail.last().map(String::as_str), Some("Invalid data found"));

    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Log(l) if l.severity == Severity::Error => Some(l.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("✗ 2.mkv"));
    assert!(!subs.join("2.srt").exists());
}

#[test]
fn test_all_failed_batch_is_failed() {
    let downloads = tempdir().unwrap();
    make_mkvs(downloads.path(), 2);

    let spawner = Arc::new(MockToolSpawner::new());
    spawner.fallback(MockRun::lines(["boom"]).exit_code(1));

    let pipeline = ExtractPipeline::new(downloads.path(), downloads.path().join("subs"));
    let handle = runner()
        .submit(batch_job(spawner, Box::new(pipeline)))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Failed);

    let done = done_of(&collect(&handle));
    assert!(!done[0].success);
    assert_eq!(done[0].status, JobStatus::Failed);
    assert_eq!(done[0].tail, vec!["boom".to_string()]);
}

#[test]
fn test_progress_is_monotonic_and_reaches_100() {
    let dir = tempdir().unwrap();
    for name in ["a.srt", "b.srt"] {
        fs::write(dir.path().join(name), "1\n00:00:01,000 --> 00:00:02,000\nhola\n").unwrap();
    }

    let spawner = Arc::new(MockToolSpawner::new());
    for name in ["a", "b"] {
        spawner.expect(
            &format!("{name}_OG.srt"),
            MockRun::lines([
                "Starting translation of 20 lines",
                "Translating: |███░░░| 50% (10/20) gemini-2.5-flash | Thinking",
                // A redraw glitch must not move the bar backwards.
                "Translating: |██░░░░| 40% (8/20) gemini-2.5-flash | Thinking",
                "Translating: |██████| 100% (20/20) gemini-2.5-flash | Processing",
            ])
            .writes(dir.path().join(format!("{name}.srt"))),
        );
    }

    let pipeline = TranslatePipeline::new(TranslateOptions {
        inputs: vec![dir.path().to_path_buf()],
        language: "English".to_string(),
        api_key: Some("secret".to_string()),
        api_key2: None,
        iso_suffix: true,
    });
    let handle = runner()
        .submit(batch_job(spawner.clone(), Box::new(pipeline)))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Done);

    let progress = progress_of(&collect(&handle));
    let percents: Vec<f64> = progress.iter().filter_map(|p| p.percent).collect();
    assert_eq!(percents.len(), progress.len());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last().copied(), Some(100.0));
    assert!(percents.contains(&25.0));
    assert!(percents.contains(&75.0));

    // Translated results renamed with the ISO code, originals kept.
    assert!(dir.path().join("a.eng.srt").exists());
    assert!(dir.path().join("b_OG.srt").exists());

    // The key travels by environment only.
    for call in spawner.calls() {
        assert!(!call.args.iter().any(|a| a.contains("secret")));
        assert!(call.env.contains(&("GEMINI_API_KEY".to_string(), "secret".to_string())));
    }
}

#[test]
fn test_cancel_mid_batch() {
    let downloads = tempdir().unwrap();
    let subs = downloads.path().join("subs");
    make_mkvs(downloads.path(), 5);

    let spawner = Arc::new(MockToolSpawner::new());
    for i in 1..=5 {
        let lines: Vec<String> = (0..20).map(|n| format!("Stream #0:{n}: Subtitle: srt")).collect();
        spawner.expect(
            &format!("{i}.mkv"),
            MockRun::lines(lines)
                .line_delay(Duration::from_millis(25))
                .writes(subs.join(format!("{i}.srt"))),
        );
    }

    let pipeline = ExtractPipeline::new(downloads.path(), &subs);
    let handle = runner()
        .submit(batch_job(spawner.clone(), Box::new(pipeline)))
        .unwrap();
    thread::sleep(Duration::from_millis(150));

    let requested = Instant::now();
    assert!(handle.request_cancel());
    let status = handle.wait_timeout(Duration::from_secs(2));
    assert_eq!(status, Some(JobStatus::Cancelled));
    assert!(requested.elapsed() < Duration::from_millis(1000));

    let done = done_of(&collect(&handle));
    assert_eq!(done.len(), 1);
    assert!(!done[0].success);
    assert_eq!(done[0].status, JobStatus::Cancelled);

    assert!(spawner.call_count() <= 2);
    let finished = (1..=5).filter(|i| subs.join(format!("{i}.srt")).exists()).count();
    assert!(finished <= 1, "{finished} outputs after cancel");
}

#[test]
fn test_batch_without_items_fails() {
    let downloads = tempdir().unwrap();
    let spawner = Arc::new(MockToolSpawner::new());
    let pipeline = ExtractPipeline::new(downloads.path(), downloads.path().join("subs"));
    let handle = runner()
        .submit(batch_job(spawner, Box::new(pipeline)))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Failed);

    let events = collect(&handle);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Log(l) if l.severity == Severity::Warning && l.text.contains("nothing to process")
    )));
}
