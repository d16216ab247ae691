// ============================================================================
// reelrun-cli/src/commands/har.rs
// ============================================================================
//
// HAR COMMAND: Stream URLs From a Browser Capture
//
// Runs no tools, so no job is submitted. The text output is a commands file
// for `reelrun download -f`: one quoted playlist URL per episode, each
// preceded by a `#` comment naming the video id and title.

use std::io::{self, Write};

use reelrun_core::har::{Har, HarEpisode};
use reelrun_core::JobStatus;

use crate::cli::HarArgs;
use crate::error::CliResult;
use crate::usage_error;

/// Commands-file text for `episodes`.
pub fn commands_text(episodes: &[HarEpisode]) -> String {
    let mut text = String::new();
    for episode in episodes {
        let title = episode.title.as_deref().unwrap_or("Unknown");
        match &episode.url {
            Some(url) => {
                text.push_str(&format!("# {} {title}\n", episode.video_id));
                text.push_str(&format!("\"{url}\"\n"));
            }
            None => text.push_str(&format!("# {} {title} (no playlist URL captured)\n", episode.video_id)),
        }
    }
    text
}

pub fn run(args: HarArgs, json: bool) -> CliResult<JobStatus> {
    let har = Har::read(&args.file)?;
    let mut out = io::stdout().lock();

    if args.cookies {
        let header = har
            .cookie_header()
            .ok_or_else(|| usage_error!("No cookies in {}", args.file.display()))?;
        writeln!(out, "{header}")?;
        return Ok(JobStatus::Done);
    }

    let episodes = har.episodes();
    if json {
        for episode in &episodes {
            let line = serde_json::to_string(episode)
                .map_err(|e| usage_error!("Cannot encode episode {}: {e}", episode.video_id))?;
            writeln!(out, "{line}")?;
        }
    } else {
        eprintln!("Found {} episode(s) in {}", episodes.len(), args.file.display());
        out.write_all(commands_text(&episodes).as_bytes())?;
    }
    log::info!("Listed {} episode(s) from {}", episodes.len(), args.file.display());
    Ok(JobStatus::Done)
}
