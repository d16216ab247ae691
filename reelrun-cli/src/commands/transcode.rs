// ============================================================================
// reelrun-cli/src/commands/transcode.rs
// ============================================================================
//
// TRANSCODE COMMAND: Burn-In Batch After a Watermark Check

use std::sync::Arc;

use reelrun_core::pipelines::{TranscodeOptions, TranscodePipeline};
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use crate::cli::TranscodeArgs;
use crate::path_error;
use crate::error::CliResult;

pub fn build_job(args: TranscodeArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    check_dependencies(&[config.tools.ffmpeg.as_str(), config.tools.ffprobe.as_str()])?;

    if let Some(watermark) = &args.watermark {
        if !watermark.is_file() {
            return Err(path_error!("Watermark image not found: {}", watermark.display()));
        }
    }

    let pipeline = TranscodePipeline::new(TranscodeOptions {
        inputs: args.inputs,
        subtitles_dir: args.subtitles_dir,
        output_dir: args.output_dir,
        watermark: args.watermark,
        resolution: args.resolution,
        iso_suffix: args.iso_suffix,
        language: args.language,
    });
    Ok(batch_job(spawner, Box::new(pipeline)))
}
