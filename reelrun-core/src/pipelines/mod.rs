// ============================================================================
// reelrun-core/src/pipelines/mod.rs
// ============================================================================
//
// PIPELINES: The Concrete Batch Workflows
//
// Each pipeline implements `batch::ItemPipeline`: it builds its batch items
// from user input and turns every item into one tool invocation.
//
// KEY COMPONENTS:
// - download: Segmented-stream downloads from pasted command lines
// - extract: First subtitle track of every MKV to SRT
// - translate: Subtitle translation with backup of the original
// - transcode: Subtitle burn-in, scaling, watermark and downmix
// - transcribe: Speech-to-text, optionally on a time range
// - remux: Subtitle added as a soft track, streams copied
// - audio: Per-channel WAV split and audio-only conversion
//
// Shared helpers for input discovery and language codes live here.

pub mod audio;
pub mod download;
pub mod extract;
pub mod remux;
pub mod transcode;
pub mod transcribe;
pub mod translate;

pub use audio::{AudioFormat, ConvertAudioPipeline, SplitChannelsPipeline};
pub use download::{DownloadOptions, DownloadPipeline};
pub use extract::ExtractPipeline;
pub use remux::{Container, RemuxPipeline};
pub use transcode::{Resolution, TranscodeOptions, TranscodePipeline};
pub use transcribe::{TimeRange, TranscribeOptions, TranscribePipeline};
pub use translate::{TranslateOptions, TranslatePipeline};

use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::BatchContext;
use crate::error::{CoreError, CoreResult};
use crate::external::probe_duration;
use crate::utils::{format_duration, has_extension};

/// Video containers accepted by the transcode and transcription pipelines.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "mov"];

/// Target languages offered to the translator, with their ISO 639-2 codes.
pub const ISO_639_CODES: &[(&str, &str)] = &[
    ("English", "eng"),
    ("French", "fra"),
    ("Spanish", "spa"),
    ("Catalan", "cat"),
    ("German", "deu"),
    ("Italian", "ita"),
    ("Portuguese", "por"),
    ("Dutch", "nld"),
    ("Chinese", "zho"),
    ("Japanese", "jpn"),
    ("Korean", "kor"),
    ("Arabic", "ara"),
    ("Thai", "tha"),
    ("Greek", "ell"),
];

/// ISO 639-2 code for a language name (case-insensitive). A known code is
/// returned as is; anything else maps to `eng`.
pub fn iso_639_code(language: &str) -> &'static str {
    let language = language.trim();
    ISO_639_CODES
        .iter()
        .find(|(name, code)| {
            name.eq_ignore_ascii_case(language) || code.eq_ignore_ascii_case(language)
        })
        .map_or("eng", |(_, code)| code)
}

/// Expands files and directories into the files with one of `extensions`.
///
/// Directory entries are sorted by name; explicit files keep their order.
pub(crate) fn collect_files(inputs: &[PathBuf], extensions: &[&str]) -> CoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(input)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && has_extension(path, extensions))
                .collect();
            entries.sort();
            files.extend(entries);
        } else if input.is_file() {
            if has_extension(input, extensions) {
                files.push(input.clone());
            } else {
                log::debug!("Ignoring {}: unsupported extension", input.display());
            }
        } else {
            return Err(CoreError::PathError(format!(
                "Input not found: {}",
                input.display()
            )));
        }
    }
    Ok(files)
}

/// Duration of `media` for timecode progress. A failed lookup is reported
/// and yields `None` (indeterminate progress); only a cancel is an error.
pub(crate) fn duration_for_progress(media: &Path, ctx: &BatchContext<'_>) -> CoreResult<Option<f64>> {
    let ffprobe = &ctx.config.tools.ffprobe;
    match probe_duration(ctx.spawner, ctx.control, ffprobe, media, ctx.config.probe_timeout) {
        Ok(seconds) => {
            log::debug!("{} duration {}", media.display(), format_duration(seconds));
            Ok(Some(seconds))
        }
        Err(CoreError::UserCancelled) => Err(CoreError::UserCancelled),
        Err(e) => {
            ctx.sink.warning(format!("  Duration unknown ({e}); progress will be indeterminate"));
            Ok(None)
        }
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> CoreResult<()> {
    fs::create_dir_all(dir).map_err(|e| {
        CoreError::PathError(format!("Failed to create directory {}: {e}", dir.display()))
    })
}
