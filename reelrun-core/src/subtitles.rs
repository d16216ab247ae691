// ============================================================================
// reelrun-core/src/subtitles.rs
// ============================================================================
//
// SUBTITLE FILES: Color-Tag Cleanup and Timestamp Shifting
//
// Cleanup backs the `clean` job; shifting is used by ranged transcription to
// move a transcript of an excerpt back onto the full video's timeline.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{CoreError, CoreResult};
use crate::events::ProgressEvent;
use crate::batch::{BatchSummary, CombinedProgress};
use crate::runner::{Job, JobContext, JobOutcome};
use crate::utils::{get_filename_safe, has_extension};

static COLOR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?c\.[a-zA-Z]+>").expect("Invalid color tag regex"));

static SRT_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2}):(\d{2}):(\d{2}),(\d{3})")
        .expect("Invalid SRT timestamp regex")
});

/// Removes `<c.color>` / `</c.color>` tags. Returns the cleaned text and the
/// number of tags removed.
pub fn clean_color_tags(content: &str) -> (String, usize) {
    let count = COLOR_TAG.find_iter(content).count();
    if count == 0 {
        return (content.to_string(), 0);
    }
    (COLOR_TAG.replace_all(content, "").into_owned(), count)
}

/// Cleans one file in place. Returns the number of tags removed; the file is
/// only rewritten when something changed.
pub fn clean_file(path: &Path) -> CoreResult<usize> {
    let content = fs::read_to_string(path)?;
    let (cleaned, removed) = clean_color_tags(&content);
    if removed > 0 {
        fs::write(path, cleaned)?;
    }
    Ok(removed)
}

fn to_millis(caps: &Captures<'_>, first: usize) -> u64 {
    let field = |i: usize| caps[first + i].parse::<u64>().unwrap_or(0);
    ((field(0) * 60 + field(1)) * 60 + field(2)) * 1000 + field(3)
}

fn format_srt_time(total_ms: u64) -> String {
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Adds `offset_secs` to every `start --> end` timestamp pair.
pub fn shift_srt_timestamps(content: &str, offset_secs: u64) -> String {
    let offset_ms = offset_secs * 1000;
    SRT_TIMESTAMP
        .replace_all(content, |caps: &Captures<'_>| {
            format!(
                "{} --> {}",
                format_srt_time(to_millis(caps, 1) + offset_ms),
                format_srt_time(to_millis(caps, 5) + offset_ms)
            )
        })
        .into_owned()
}

pub fn shift_srt_file(path: &Path, offset_secs: u64) -> CoreResult<()> {
    let content = fs::read_to_string(path)?;
    fs::write(path, shift_srt_timestamps(&content, offset_secs))?;
    Ok(())
}

/// Every `.srt` directly inside `dir`, sorted by name.
pub fn list_srt_files(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CoreError::PathError(format!(
            "Subtitles directory not found: {}",
            dir.display()
        )));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, &["srt"]))
        .collect();
    files.sort();
    Ok(files)
}

/// Job that strips color tags from every subtitle in `dir`.
///
/// Files without tags count as skipped, unreadable files as failed.
pub fn clean_job(dir: PathBuf) -> Job {
    Job::new("clean", move |ctx| clean_directory(&dir, ctx))
}

fn clean_directory(dir: &Path, ctx: &JobContext) -> CoreResult<JobOutcome> {
    let files = list_srt_files(dir)?;
    let total = files.len();
    let mut summary = BatchSummary::new(total);
    let mut progress = CombinedProgress::new(total);

    if files.is_empty() {
        ctx.sink.warning(format!("No SRT files found in {}", dir.display()));
    } else {
        ctx.sink.info(format!("Starting subtitle cleaning for {total} file(s)..."));
    }

    for (i, path) in files.iter().enumerate() {
        ctx.control.cancel.check()?;
        let index = i + 1;
        let name = get_filename_safe(path)?;
        let size_kb = fs::metadata(path).map(|m| m.len() as f64 / 1024.0).unwrap_or(0.0);

        match clean_file(path) {
            Ok(0) => {
                summary.record_skip(&name, "no color tags found");
                ctx.sink.info(format!("  ○ Skipped: {name} ({size_kb:.1} KB, no color tags found)"));
            }
            Ok(removed) => {
                summary.record_success();
                ctx.sink.info(format!(
                    "  ✓ Cleaned: {name} ({size_kb:.1} KB, removed {removed} color tag(s))"
                ));
            }
            Err(e) => {
                summary.record_failure(index, &name, e.to_string(), Vec::new());
                ctx.sink.error(format!("  ✗ Error cleaning {name}: {e}"));
            }
        }

        ctx.sink.progress(ProgressEvent {
            item_index: index,
            item_total: total,
            percent: Some(progress.complete_item(index)),
            item_percent: Some(100.0),
            label: name,
        });
    }

    ctx.sink.info(format!("Cleaning complete: {summary}"));
    Ok(summary.into_outcome(ctx.config.success_policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_color_tags() {
        let (cleaned, removed) = clean_color_tags("1\n00:00:01,000 --> 00:00:02,000\n<c.yellow>Hi</c.yellow> there\n");
        assert_eq!(removed, 2);
        assert_eq!(cleaned, "1\n00:00:01,000 --> 00:00:02,000\nHi there\n");

        let (unchanged, removed) = clean_color_tags("<i>plain</i>");
        assert_eq!(removed, 0);
        assert_eq!(unchanged, "<i>plain</i>");
    }

    #[test]
    fn test_shift_timestamps() {
        let srt = "1\n00:00:01,234 --> 00:00:05,678\nHello\n\n2\n00:59:59,500 --> 01:00:00,999\nBye\n";
        let shifted = shift_srt_timestamps(srt, 90);
        assert!(shifted.contains("00:01:31,234 --> 00:01:35,678"));
        assert!(shifted.contains("01:01:29,500 --> 01:01:30,999"));
        assert!(shifted.contains("Hello"));
    }

    #[test]
    fn test_shift_by_zero_is_identity() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nx\n";
        assert_eq!(shift_srt_timestamps(srt, 0), srt);
    }

    #[test]
    fn test_clean_file_only_rewrites_tagged_files() {
        let dir = tempfile::tempdir().unwrap();
        let tagged = dir.path().join("a.srt");
        fs::write(&tagged, "<c.red>x</c.red>").unwrap();
        let plain = dir.path().join("b.srt");
        fs::write(&plain, "y").unwrap();

        assert_eq!(clean_file(&tagged).unwrap(), 2);
        assert_eq!(fs::read_to_string(&tagged).unwrap(), "x");
        assert_eq!(clean_file(&plain).unwrap(), 0);

        let listed = list_srt_files(dir.path()).unwrap();
        assert_eq!(listed, vec![tagged, plain]);
    }
}
