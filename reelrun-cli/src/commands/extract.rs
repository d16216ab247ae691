// ============================================================================
// reelrun-cli/src/commands/extract.rs
// ============================================================================
//
// EXTRACT COMMAND: Subtitle Tracks Out of Downloaded MKVs

use std::sync::Arc;

use reelrun_core::pipelines::ExtractPipeline;
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use crate::cli::ExtractArgs;
use crate::error::CliResult;

pub fn build_job(args: ExtractArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    check_dependencies(&[config.tools.ffmpeg.as_str()])?;

    let subtitles_dir = args
        .subtitles_dir
        .unwrap_or_else(|| args.input_dir.join("subs"));
    let pipeline = ExtractPipeline::new(args.input_dir, subtitles_dir);
    Ok(batch_job(spawner, Box::new(pipeline)))
}
