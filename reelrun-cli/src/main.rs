// ============================================================================
// reelrun-cli/src/main.rs
// ============================================================================
//
// ENTRY POINT: The `reelrun` Binary
//
// Parses arguments, sets up logging, runs the chosen command as one job and maps its final status to the exit
// code (0 done, 1 failed or error, 130 cancelled).

use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use reelrun_cli::output::colors_enabled;
use reelrun_cli::{config, logging, run_command, Cli, CliResult, RunContext};
use reelrun_core::JobStatus;

const EXIT_FAILURE: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

fn exit_code(status: JobStatus) -> i32 {
    match status {
        JobStatus::Done => 0,
        JobStatus::Cancelled => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    }
}

fn run(cli: Cli) -> CliResult<JobStatus> {
    let log_file = logging::init_logging(&cli.global, cli.command.name())?;
    if let Some(path) = &log_file {
        if !cli.global.json {
            eprintln!("Log file: {}", path.display());
        }
    }

    let config = config::build_core_config(&cli.global)?;
    let to_file = log_file.is_some();
    let ctx = RunContext {
        global: cli.global,
        config,
        log_file,
    };
    run_command(cli.command, &ctx).inspect_err(|e| {
        if to_file {
            log::error!("{e}");
        }
    })
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(status) => exit_code(status),
        Err(e) => {
            if colors_enabled() {
                eprintln!("{} {e}", "Error:".red().bold());
            } else {
                eprintln!("Error: {e}");
            }
            EXIT_FAILURE
        }
    };
    process::exit(code);
}
