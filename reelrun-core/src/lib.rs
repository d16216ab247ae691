//! Core library for running batches of external media tools.
//!
//! A single [`JobRunner`] executes one [`Job`] at a time on a worker thread.
//! Jobs are usually built from an [`ItemPipeline`](batch::ItemPipeline)
//! through [`batch::batch_job`]: the pipeline lists its items, prepares one
//! tool invocation per item and the batch orchestrator streams the tool's
//! output through a per-tool parser, turning it into [`Event`]s.
//!
//! Cancellation is cooperative first: the job's flag is checked between
//! items and the running tool is killed. A job that does not react within
//! the grace window is force-finished as cancelled.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelrun_core::{batch_job, CoreConfig, JobRunner, ProcessSpawner};
//! use reelrun_core::events::{EventDispatcher, LogForwardingHandler};
//! use reelrun_core::pipelines::ExtractPipeline;
//!
//! let config = CoreConfig::default();
//! let spawner = Arc::new(ProcessSpawner::from_config(&config));
//! let runner = JobRunner::new(config);
//!
//! let pipeline = ExtractPipeline::new("/media/downloads", "/media/downloads/subs");
//! let handle = runner.submit(batch_job(spawner, Box::new(pipeline))).unwrap();
//!
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.add_handler(Arc::new(LogForwardingHandler::new()));
//! let done = dispatcher.drain(handle.events());
//! println!("{:?}", done.map(|d| d.status));
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod events;
pub mod external;
pub mod file_logging;
pub mod har;
pub mod parsing;
pub mod pipelines;
pub mod range;
pub mod runner;
pub mod subtitles;
pub mod utils;

// Re-exports for public API
pub use batch::{batch_job, run_batch, BatchItem, BatchSummary, ItemPipeline};
pub use config::{CoreConfig, CoreConfigBuilder, SuccessPolicy, ToolPaths};
pub use error::{CoreError, CoreResult};
pub use events::{DoneEvent, Event, EventDispatcher, EventHandler, LogEvent, ProgressEvent, Severity};
pub use external::{check_dependencies, ProcessSpawner, ToolInvocation, ToolKind, ToolSpawner};
pub use range::{parse_range, resolve_identifiers};
pub use runner::{Job, JobContext, JobHandle, JobOutcome, JobRunner, JobStatus};
pub use utils::{format_duration, format_eta};
