// ============================================================================
// reelrun-cli/src/commands/download.rs
// ============================================================================
//
// DOWNLOAD COMMAND: Pasted Downloader Command Lines, One per Episode

use std::io::IsTerminal;
use std::sync::Arc;

use reelrun_core::pipelines::{DownloadOptions, DownloadPipeline};
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use crate::cli::DownloadArgs;
use crate::error::{CliResult, CommandInput};
use crate::usage_error;

pub fn build_job(args: DownloadArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    check_dependencies(&[config.tools.downloader.as_str()])?;

    let input = match &args.commands_file {
        Some(path) => CommandInput::File(path),
        None => {
            if std::io::stdin().is_terminal() {
                eprintln!("Paste the downloader commands, one per line, then press Ctrl-D:");
            }
            CommandInput::Stdin
        }
    };
    let commands = input.read()?;
    if commands.trim().is_empty() {
        return Err(usage_error!("No downloader commands given"));
    }

    let pipeline = DownloadPipeline::new(DownloadOptions {
        commands,
        episodes: args.episodes,
        output_dir: args.output_dir,
    });
    Ok(batch_job(spawner, Box::new(pipeline)))
}
