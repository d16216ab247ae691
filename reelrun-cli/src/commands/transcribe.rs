// ============================================================================
// reelrun-cli/src/commands/transcribe.rs
// ============================================================================
//
// TRANSCRIBE COMMAND: Speech-to-Text, Whole Files or One Excerpt

use std::sync::Arc;

use reelrun_core::pipelines::{TimeRange, TranscribeOptions, TranscribePipeline};
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use crate::cli::TranscribeArgs;
use crate::error::CliResult;

pub fn build_job(args: TranscribeArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    let range = match (args.start, args.end) {
        (Some(start), Some(end)) => Some(TimeRange::new(start, end)?),
        _ => None,
    };
    if range.is_some() {
        check_dependencies(&["bash", config.tools.ffmpeg.as_str()])?;
    } else {
        check_dependencies(&["bash"])?;
    }

    let pipeline = TranscribePipeline::new(TranscribeOptions {
        inputs: args.inputs,
        language: args.language,
        model: args.model,
        format: args.format,
        extra_args: args.extra_args,
        range,
        adjust_timestamps: !args.no_adjust_timestamps,
    });
    Ok(batch_job(spawner, Box::new(pipeline)))
}
