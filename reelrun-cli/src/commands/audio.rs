// ============================================================================
// reelrun-cli/src/commands/audio.rs
// ============================================================================
//
// AUDIO COMMANDS: Channel Split and Audio-Only Conversion

use std::sync::Arc;

use reelrun_core::pipelines::{ConvertAudioPipeline, SplitChannelsPipeline};
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use crate::cli::{ConvertAudioArgs, SplitAudioArgs};
use crate::error::CliResult;
use crate::usage_error;

pub fn build_split_job(args: SplitAudioArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    if args.channels == Some(0) {
        return Err(usage_error!("--channels must be at least 1"));
    }
    check_dependencies(&[config.tools.ffmpeg.as_str(), config.tools.ffprobe.as_str()])?;
    let pipeline = SplitChannelsPipeline::new(args.inputs, args.channels);
    Ok(batch_job(spawner, Box::new(pipeline)))
}

pub fn build_convert_job(args: ConvertAudioArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    check_dependencies(&[config.tools.ffmpeg.as_str(), config.tools.ffprobe.as_str()])?;
    let pipeline = ConvertAudioPipeline::new(args.inputs, args.format);
    Ok(batch_job(spawner, Box::new(pipeline)))
}
