// ============================================================================
// reelrun-cli/src/commands/mod.rs
// ============================================================================
//
// COMMANDS: One job per subcommand
//
// Every subcommand module turns its arguments into a core `Job`; `execute`
// submits it, renders its events until the terminal one and returns the
// final status. Ctrl-C cancels; on an interactive terminal, typing `q` +
// Enter does too.

pub mod audio;
pub mod clean;
pub mod download;
pub mod extract;
pub mod har;
pub mod remux;
pub mod transcode;
pub mod transcribe;
pub mod translate;

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use reelrun_core::events::{JsonEventHandler, LogForwardingHandler};
use reelrun_core::{
    CoreConfig, EventDispatcher, Job, JobRunner, JobStatus, ProcessSpawner, ToolSpawner,
};

use crate::cli::{Commands, GlobalArgs};
use crate::error::CliResult;
use crate::output::TerminalEventHandler;

/// Everything a command needs besides its own arguments.
pub struct RunContext {
    pub global: GlobalArgs,
    pub config: CoreConfig,
    /// Set when events are mirrored into a log file
    pub log_file: Option<PathBuf>,
}

/// Builds the job for `command`, runs it and returns its terminal status.
pub fn run_command(command: Commands, ctx: &RunContext) -> CliResult<JobStatus> {
    let spawner: Arc<dyn ToolSpawner> = Arc::new(ProcessSpawner::from_config(&ctx.config));

    // Reading commands from stdin leaves nothing to listen on.
    let watch_stdin = !matches!(&command, Commands::Download(args) if args.commands_file.is_none());

    let job = match command {
        Commands::Download(args) => download::build_job(args, &ctx.config, spawner)?,
        Commands::Extract(args) => extract::build_job(args, &ctx.config, spawner)?,
        Commands::Translate(args) => translate::build_job(args, &ctx.config, spawner)?,
        Commands::Transcode(args) => transcode::build_job(args, &ctx.config, spawner)?,
        Commands::Transcribe(args) => transcribe::build_job(args, &ctx.config, spawner)?,
        Commands::Clean(args) => clean::build_job(args)?,
        Commands::Remux(args) => remux::build_job(args, &ctx.config, spawner)?,
        Commands::SplitAudio(args) => audio::build_split_job(args, &ctx.config, spawner)?,
        Commands::ConvertAudio(args) => audio::build_convert_job(args, &ctx.config, spawner)?,
        // Reads a capture file only; no tool runs.
        Commands::Har(args) => return har::run(args, ctx.global.json),
    };
    execute(job, ctx, watch_stdin)
}

fn execute(job: Job, ctx: &RunContext, watch_stdin: bool) -> CliResult<JobStatus> {
    let runner = Arc::new(JobRunner::new(ctx.config.clone()));
    let handle = runner.submit(job)?;
    log::debug!("Submitted job '{}'", handle.name());

    let mut dispatcher = EventDispatcher::new();
    if ctx.global.json {
        dispatcher.add_handler(Arc::new(JsonEventHandler::new()));
    } else {
        dispatcher.add_handler(Arc::new(TerminalEventHandler::new()));
    }
    if ctx.log_file.is_some() {
        dispatcher.add_handler(Arc::new(LogForwardingHandler::new()));
    }

    crate::interrupt::spawn_interrupt_watcher(Arc::clone(&runner));
    if watch_stdin && std::io::stdin().is_terminal() {
        if !ctx.global.json {
            eprintln!("Type q and press Enter to cancel.");
        }
        spawn_cancel_listener(Arc::clone(&runner));
    }

    if dispatcher.drain(handle.events()).is_none() {
        log::warn!("Job '{}' ended without a final event", handle.name());
    }
    let status = handle.wait();
    log::debug!("Job '{}' finished as {status:?}", handle.name());
    Ok(status)
}

/// `q`, `quit` or `cancel`, in any case.
pub fn is_cancel_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "quit" | "cancel")
}

fn spawn_cancel_listener(runner: Arc<JobRunner>) {
    let spawned = thread::Builder::new()
        .name("reelrun-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if is_cancel_command(&line) {
                    if !runner.request_cancel() {
                        log::debug!("Cancel requested with no job running");
                    }
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Cancellation from the terminal is unavailable: {e}");
    }
}

/// Program part of a command string such as `python3 -m translator`.
pub(crate) fn program_of(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_commands() {
        assert!(is_cancel_command("q"));
        assert!(is_cancel_command(" Q \n"));
        assert!(is_cancel_command("cancel"));
        assert!(!is_cancel_command("quiet"));
        assert!(!is_cancel_command(""));
    }

    #[test]
    fn test_program_of() {
        assert_eq!(program_of("python3 -m gemini_srt_translator"), "python3");
        assert_eq!(program_of("gst"), "gst");
    }
}
