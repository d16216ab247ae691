// ============================================================================
// reelrun-core/src/external/probe.rs
// ============================================================================
//
// MEDIA PROBES: Duration and Audio Channel Count via ffprobe
//
// Probes are short diagnostic calls and always carry a hard timeout. A
// timed-out probe surfaces as `ToolTimeout`; callers fall back to
// indeterminate progress or skip the dependent feature.

use std::path::Path;
use std::time::Duration;

use super::{ToolInvocation, ToolSpawner};
use crate::error::{tool_failed, CoreResult};
use crate::runner::JobControl;

fn probe_invocation(ffprobe: &str, timeout: Duration) -> ToolInvocation {
    ToolInvocation::new(ffprobe).args(["-v", "error"]).timeout(timeout)
}

/// First output line that parses as `T`.
fn first_parsed<T: std::str::FromStr>(lines: &[String]) -> Option<T> {
    lines.iter().find_map(|line| line.trim().parse::<T>().ok())
}

/// Container duration in seconds.
pub fn probe_duration(
    spawner: &dyn ToolSpawner,
    control: &JobControl,
    ffprobe: &str,
    input: &Path,
    timeout: Duration,
) -> CoreResult<f64> {
    let invocation = probe_invocation(ffprobe, timeout)
        .args([
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .path_arg(input);

    let lines = spawner.spawn(&invocation, control)?.read_to_end()?;
    match first_parsed::<f64>(&lines) {
        Some(duration) if duration.is_finite() && duration > 0.0 => Ok(duration),
        _ => Err(tool_failed(
            &invocation.tool_name(),
            format!("no duration reported for {}", input.display()),
            lines,
        )),
    }
}

/// Channel count of the first audio stream. `Ok(None)` when the file has no
/// audio stream.
pub fn probe_audio_channels(
    spawner: &dyn ToolSpawner,
    control: &JobControl,
    ffprobe: &str,
    input: &Path,
    timeout: Duration,
) -> CoreResult<Option<u32>> {
    let invocation = probe_invocation(ffprobe, timeout)
        .args([
            "-select_streams",
            "a:0",
            "-show_entries",
            "stream=channels",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .path_arg(input);

    let lines = spawner.spawn(&invocation, control)?.read_to_end()?;
    Ok(first_parsed::<u32>(&lines))
}
