// ============================================================================
// reelrun-cli/src/commands/clean.rs
// ============================================================================
//
// CLEAN COMMAND: Color-Tag Cleanup of a Subtitle Directory

use reelrun_core::subtitles::clean_job;
use reelrun_core::Job;

use crate::cli::CleanArgs;
use crate::path_error;
use crate::error::CliResult;

pub fn build_job(args: CleanArgs) -> CliResult<Job> {
    if !args.dir.is_dir() {
        return Err(path_error!("Not a directory: {}", args.dir.display()));
    }
    Ok(clean_job(args.dir))
}
