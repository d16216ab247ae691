// ============================================================================
// reelrun-cli/src/commands/remux.rs
// ============================================================================
//
// REMUX COMMAND: Soft Subtitles for a Folder of Videos

use std::sync::Arc;

use reelrun_core::pipelines::RemuxPipeline;
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use crate::cli::RemuxArgs;
use crate::error::CliResult;
use crate::path_error;

pub fn build_job(args: RemuxArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    if !args.dir.is_dir() {
        return Err(path_error!("Not a directory: {}", args.dir.display()));
    }
    check_dependencies(&[config.tools.ffmpeg.as_str(), config.tools.ffprobe.as_str()])?;
    Ok(batch_job(spawner, Box::new(RemuxPipeline::new(args.dir, args.format))))
}
