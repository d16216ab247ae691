// ============================================================================
// reelrun-core/src/batch/mod.rs
// ============================================================================
//
// BATCH ORCHESTRATOR: Sequential Execution of Batch Items
//
// This module runs the items of one pipeline strictly in input order. Every
// item is checked against its declared output first (skip-if-exists), then
// prepared by the pipeline, executed through the job's tool spawner, and
// finalized. Per-item failures are recorded and the batch moves on.
//
// KEY COMPONENTS:
// - BatchItem / ItemState: One input of the batch
// - ItemPipeline: Strategy trait implemented by each concrete pipeline
// - BatchContext: Spawner, cancellation handles, event sink and config
// - run_batch: The orchestration loop
// - batch_job: Wraps a pipeline into a runner `Job`
//
// Cancellation is observed before each item and on every output line. A
// cancelled item has its child killed and its partial output removed, and
// the batch returns `UserCancelled`.

pub mod progress;
pub mod summary;

pub use progress::CombinedProgress;
pub use summary::{BatchSummary, ItemFailure};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventSink, ProgressEvent};
use crate::external::{ToolInvocation, ToolKind, ToolSpawner};
use crate::parsing::{ItemProgress, LineParser, ParsedLine};
use crate::runner::{Job, JobControl};
use crate::utils::is_nonempty_file;

/// Lifecycle of a batch item. Items are never revisited once final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Running,
    Skipped,
    Succeeded,
    Failed,
}

/// One input of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// 1-based position, assigned when the batch starts
    pub index: usize,
    pub total: usize,
    /// Display name (episode number, file name)
    pub identifier: String,
    /// Input file, for pipelines that work on existing files
    pub source: Option<PathBuf>,
    /// Declared output; its presence marks the item as already done
    pub output_path: PathBuf,
    pub state: ItemState,
}

impl BatchItem {
    pub fn new(identifier: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            index: 0,
            total: 0,
            identifier: identifier.into(),
            source: None,
            output_path: output_path.into(),
            state: ItemState::Pending,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Source path, or an error for items built without one.
    pub fn source_path(&self) -> CoreResult<&Path> {
        self.source.as_deref().ok_or_else(|| {
            CoreError::InvalidInput(format!("item '{}' has no source file", self.identifier))
        })
    }

    fn prefix(&self) -> String {
        format!("[{}/{}]", self.index, self.total)
    }
}

/// A tool run prepared for one item.
#[derive(Debug, Clone)]
pub struct PreparedStep {
    pub invocation: ToolInvocation,
    pub parser: LineParser,
    /// File the tool must leave behind (non-empty) for the step to succeed.
    /// `None` when the pipeline verifies its output in `finalize`.
    pub expected_output: Option<PathBuf>,
}

impl PreparedStep {
    pub fn new(invocation: ToolInvocation, parser: LineParser, expected_output: Option<PathBuf>) -> Self {
        Self {
            invocation,
            parser,
            expected_output,
        }
    }
}

/// Result of preparing an item.
#[derive(Debug, Clone)]
pub enum Preparation {
    Run(PreparedStep),
    /// The item cannot run (for example a missing subtitle); it is skipped.
    Skip(String),
}

/// Strategy implemented by each concrete pipeline.
pub trait ItemPipeline: Send {
    fn name(&self) -> &str;

    fn tool_kind(&self) -> ToolKind;

    /// Builds the batch inputs.
    fn items(&mut self) -> CoreResult<Vec<BatchItem>>;

    /// Whether `item` was already produced by an earlier run.
    fn is_complete(&self, item: &BatchItem) -> bool {
        is_nonempty_file(&item.output_path)
    }

    /// Builds the main tool run for `item`. May run short auxiliary steps
    /// (probes, extraction) through `ctx`.
    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation>;

    /// Post-processing after a successful run (renames, cleanup).
    fn finalize(&mut self, _item: &BatchItem, _ctx: &BatchContext<'_>) -> CoreResult<()> {
        Ok(())
    }
}

/// Everything an item needs while it runs.
pub struct BatchContext<'a> {
    pub spawner: &'a dyn ToolSpawner,
    pub control: &'a JobControl,
    pub sink: &'a EventSink,
    pub config: &'a CoreConfig,
}

impl BatchContext<'_> {
    /// Runs one tool step, forwarding parsed log lines to the sink and
    /// progress to `on_progress`.
    pub fn execute_step(
        &self,
        step: PreparedStep,
        mut on_progress: impl FnMut(ItemProgress),
    ) -> CoreResult<()> {
        let PreparedStep {
            invocation,
            mut parser,
            expected_output,
        } = step;

        let mut stream = self.spawner.spawn(&invocation, self.control)?;
        while let Some(line) = stream.next_line()? {
            log::trace!(target: "reelrun::tool", "{}: {line}", stream.tool());
            match parser.parse(&line) {
                Some(ParsedLine::Log(event)) => self.sink.log(event),
                Some(ParsedLine::Progress(progress)) => on_progress(progress),
                None => {}
            }
        }
        stream.finish(expected_output.as_deref())
    }

    /// Runs an auxiliary step whose progress is not reported.
    pub fn execute_quiet(&self, step: PreparedStep) -> CoreResult<()> {
        self.execute_step(step, |_| {})
    }
}

fn remove_partial(path: &Path, sink: &EventSink) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("Removed partial output {}", path.display()),
            Err(e) => sink.warning(format!(
                "Could not remove partial output {}: {e}",
                path.display()
            )),
        }
    }
}

enum ItemOutcome {
    Succeeded,
    Skipped(String),
}

fn run_item(
    pipeline: &mut dyn ItemPipeline,
    item: &BatchItem,
    ctx: &BatchContext<'_>,
    progress: &mut CombinedProgress,
) -> CoreResult<ItemOutcome> {
    if pipeline.is_complete(item) {
        return Ok(ItemOutcome::Skipped("output already exists".to_string()));
    }

    let step = match pipeline.prepare(item, ctx)? {
        Preparation::Skip(reason) => return Ok(ItemOutcome::Skipped(reason)),
        Preparation::Run(step) => step,
    };
    ctx.control.cancel.check()?;

    let partial = step.expected_output.clone();
    let result = ctx.execute_step(step, |p| {
        let percent = progress.update(item.index, p.fraction.unwrap_or(0.0));
        ctx.sink.progress(ProgressEvent {
            item_index: item.index,
            item_total: item.total,
            percent: Some(percent),
            item_percent: p.fraction.map(|f| f * 100.0),
            label: format!("{}: {}", item.identifier, p.label),
        });
    });

    if let Err(e) = result {
        // A killed or failed run can leave a truncated file behind; it must
        // not be mistaken for a finished output on the next run.
        if let Some(path) = &partial {
            remove_partial(path, ctx.sink);
        }
        return Err(e);
    }

    pipeline.finalize(item, ctx)?;
    Ok(ItemOutcome::Succeeded)
}

fn cancelled(ctx: &BatchContext<'_>, name: &str, summary: &BatchSummary) -> CoreError {
    ctx.sink.warning(format!(
        "{name} cancelled after {} of {} item(s): {summary}",
        summary.processed(),
        summary.total
    ));
    CoreError::UserCancelled
}

/// Runs every item of `items` in order.
///
/// Returns the summary, or `UserCancelled` when the job's cancel flag was
/// observed. Item failures never abort the batch.
pub fn run_batch(
    pipeline: &mut dyn ItemPipeline,
    items: &mut [BatchItem],
    ctx: &BatchContext<'_>,
) -> CoreResult<BatchSummary> {
    let name = pipeline.name().to_string();
    let total = items.len();
    let mut summary = BatchSummary::new(total);
    let mut progress = CombinedProgress::new(total);

    if total == 0 {
        ctx.sink.warning(format!("{name}: nothing to process"));
        return Ok(summary);
    }

    for (i, item) in items.iter_mut().enumerate() {
        item.index = i + 1;
        item.total = total;
        item.state = ItemState::Pending;
    }
    ctx.sink.info(format!("Starting {name} of {total} item(s)"));

    for item in items.iter_mut() {
        if ctx.control.cancel.is_cancelled() {
            return Err(cancelled(ctx, &name, &summary));
        }

        item.state = ItemState::Running;
        let percent = progress.update(item.index, 0.0);
        ctx.sink.progress(ProgressEvent {
            item_index: item.index,
            item_total: total,
            percent: Some(percent),
            item_percent: Some(0.0),
            label: item.identifier.clone(),
        });

        let status = match run_item(pipeline, item, ctx, &mut progress) {
            Ok(ItemOutcome::Succeeded) => {
                item.state = ItemState::Succeeded;
                summary.record_success();
                ctx.sink.info(format!("{} ✓ {}", item.prefix(), item.identifier));
                "done"
            }
            Ok(ItemOutcome::Skipped(reason)) => {
                item.state = ItemState::Skipped;
                summary.record_skip(&item.identifier, &reason);
                ctx.sink.info(format!("{} Skipping {}: {reason}", item.prefix(), item.identifier));
                "skipped"
            }
            Err(CoreError::UserCancelled) => {
                item.state = ItemState::Failed;
                return Err(cancelled(ctx, &name, &summary));
            }
            Err(e) => {
                item.state = ItemState::Failed;
                ctx.sink.error(format!("{} ✗ {}: {e}", item.prefix(), item.identifier));
                if !e.tail().is_empty() {
                    ctx.sink.info("    Last output lines:");
                    for line in e.tail() {
                        ctx.sink.info(format!("      {line}"));
                    }
                }
                summary.record_failure(item.index, &item.identifier, e.to_string(), e.tail().to_vec());
                "failed"
            }
        };

        let percent = progress.complete_item(item.index);
        ctx.sink.progress(ProgressEvent {
            item_index: item.index,
            item_total: total,
            percent: Some(percent),
            item_percent: Some(100.0),
            label: format!("{} {status}", item.identifier),
        });
    }

    ctx.sink.info(format!("{name} complete: {summary}"));
    Ok(summary)
}

/// Wraps a pipeline into a job for the runner.
pub fn batch_job(spawner: Arc<dyn ToolSpawner>, mut pipeline: Box<dyn ItemPipeline>) -> Job {
    let name = pipeline.name().to_string();
    Job::new(name, move |job| {
        let mut items = pipeline.items()?;
        let ctx = BatchContext {
            spawner: spawner.as_ref(),
            control: &job.control,
            sink: &job.sink,
            config: &job.config,
        };
        let summary = run_batch(pipeline.as_mut(), &mut items, &ctx)?;
        Ok(summary.into_outcome(job.config.success_policy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, Event};
    use crate::external::mocks::{MockRun, MockToolSpawner};
    use std::fs;

    /// Pipeline running `ffmpeg <out>` for each output path.
    struct EchoPipeline {
        outputs: Vec<PathBuf>,
        skip: Option<String>,
    }

    impl ItemPipeline for EchoPipeline {
        fn name(&self) -> &str {
            "echo"
        }

        fn tool_kind(&self) -> ToolKind {
            ToolKind::Transcoder
        }

        fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
            Ok(self
                .outputs
                .iter()
                .map(|p| BatchItem::new(p.file_name().unwrap().to_string_lossy(), p))
                .collect())
        }

        fn prepare(&mut self, item: &BatchItem, _ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
            if let Some(id) = &self.skip {
                if *id == item.identifier {
                    return Ok(Preparation::Skip("no subtitle".to_string()));
                }
            }
            Ok(Preparation::Run(PreparedStep::new(
                ToolInvocation::new("ffmpeg").path_arg(&item.output_path),
                LineParser::timecode(Some(10.0)),
                Some(item.output_path.clone()),
            )))
        }
    }

    fn run(spawner: &MockToolSpawner, pipeline: &mut EchoPipeline) -> (CoreResult<BatchSummary>, Vec<Event>) {
        let (sink, rx) = events::channel();
        let control = JobControl::new();
        let config = CoreConfig::default();
        let ctx = BatchContext {
            spawner,
            control: &control,
            sink: &sink,
            config: &config,
        };
        let mut items = pipeline.items().unwrap();
        let result = run_batch(pipeline, &mut items, &ctx);
        drop(sink);
        (result, rx.iter().collect())
    }

    #[test]
    fn test_skip_reason_from_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        let spawner = MockToolSpawner::new();
        spawner.expect("a.mp4", MockRun::success().writes(&a));

        let mut pipeline = EchoPipeline {
            outputs: vec![a, b],
            skip: Some("b.mp4".to_string()),
        };
        let (result, events) = run(&spawner, &mut pipeline);
        let summary = result.unwrap();
        assert_eq!(summary.to_string(), "1 run / 1 skipped / 0 failed of 2");
        assert_eq!(summary.skips[0].1, "no subtitle");
        assert_eq!(spawner.call_count(), 1);
        assert!(events.iter().any(|e| matches!(e, Event::Log(l) if l.text.contains("Skipping b.mp4: no subtitle"))));
    }

    #[test]
    fn test_failed_run_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let spawner = MockToolSpawner::new();
        spawner.expect(
            "a.mp4",
            MockRun::lines(["Conversion failed!"]).writes(&a).exit_code(1),
        );

        let mut pipeline = EchoPipeline {
            outputs: vec![a.clone()],
            skip: None,
        };
        let (result, _) = run(&spawner, &mut pipeline);
        let summary = result.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].tail, vec!["Conversion failed!".to_string()]);
        assert!(!a.exists());
    }

    #[test]
    fn test_empty_batch() {
        let spawner = MockToolSpawner::new();
        let mut pipeline = EchoPipeline {
            outputs: Vec::new(),
            skip: None,
        };
        let (result, _) = run(&spawner, &mut pipeline);
        let summary = result.unwrap();
        assert_eq!(summary.total, 0);
        assert!(!summary.is_success(crate::config::SuccessPolicy::AnySucceeded));
    }

    #[test]
    fn test_progress_events_carry_item_index() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        fs::write(&a, b"done").unwrap();
        let b = dir.path().join("b.mp4");
        let spawner = MockToolSpawner::new();
        spawner.expect(
            "b.mp4",
            MockRun::lines(["time=00:00:05.00 speed=1x"]).writes(&b),
        );

        let mut pipeline = EchoPipeline {
            outputs: vec![a, b],
            skip: None,
        };
        let (_, events) = run(&spawner, &mut pipeline);
        let halfway = events.iter().find_map(|e| match e {
            Event::Progress(p) if p.item_index == 2 && p.item_percent == Some(50.0) => p.percent,
            _ => None,
        });
        assert_eq!(halfway, Some(75.0));
    }
}
