// ============================================================================
// reelrun-core/src/pipelines/transcribe.rs
// ============================================================================
//
// TRANSCRIBE: Speech-to-text through the wrapper script
//
// The script is run as `bash <script> <media> <language> <model> <format>`
// and writes `<stem>.<format>` next to its input (or `<stem>_N.<format>`
// when that name is taken). Extra engine arguments go through
// `WHISPER_EXTRA_ARGS`.
//
// Any non-empty `<stem>.<ext>` or `<stem>_N.<ext>` counts as an existing
// transcript, so such items are skipped. After a run only a transcript
// that is new or was rewritten during the run is accepted.
//
// With a time range, the excerpt is first extracted to a 16 kHz mono WAV
// in a scratch directory; the resulting SRT is shifted back onto the
// video's timeline and saved as `<stem>_range_<start>_<end>.srt`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{missing_artifact, CoreError, CoreResult};
use crate::external::{ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::subtitles::shift_srt_file;
use crate::utils::{format_duration, get_filename_safe, get_stem_safe, is_nonempty_file};

use super::{collect_files, VIDEO_EXTENSIONS};

/// Highest `<stem>_N` variant looked for after a run.
const MAX_NUMBERED_VARIANT: u32 = 10;

/// Excerpt bounds in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

impl TimeRange {
    pub fn new(start: u64, end: u64) -> CoreResult<Self> {
        if end <= start {
            return Err(CoreError::InvalidInput(format!(
                "time range end ({end}s) must be after its start ({start}s)"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> u64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Video files or directories holding them
    pub inputs: Vec<PathBuf>,
    pub language: String,
    pub model: String,
    /// srt, vtt, txt, tsv, json or all
    pub format: String,
    /// Value for `WHISPER_EXTRA_ARGS`
    pub extra_args: Option<String>,
    pub range: Option<TimeRange>,
    /// Shift ranged transcripts back onto the full video's timeline
    pub adjust_timestamps: bool,
}

/// Extension of the file checked after a run; `all` writes an SRT among
/// others.
fn artifact_extension(format: &str) -> &str {
    if format == "all" {
        "srt"
    } else {
        format
    }
}

/// Names the script may write for `media`: `<stem>.<ext>`, then
/// `<stem>_1.<ext>` up to `<stem>_10.<ext>`.
fn transcript_candidates(media: &Path, extension: &str) -> Vec<PathBuf> {
    let dir = media.parent().unwrap_or_else(|| Path::new("."));
    let Some(stem) = media.file_stem().map(|s| s.to_string_lossy().to_string()) else {
        return Vec::new();
    };
    std::iter::once(dir.join(format!("{stem}.{extension}")))
        .chain((1..=MAX_NUMBERED_VARIANT).map(|n| dir.join(format!("{stem}_{n}.{extension}"))))
        .collect()
}

/// The first non-empty transcript of `media`, plain name first.
pub fn find_transcript(media: &Path, extension: &str) -> Option<PathBuf> {
    transcript_candidates(media, extension)
        .into_iter()
        .find(|p| is_nonempty_file(p))
}

/// Size and modification time of a transcript candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// The candidates of `media` that exist right now.
#[derive(Debug, Default)]
pub struct TranscriptSnapshot {
    files: Vec<(PathBuf, FileStamp)>,
}

impl TranscriptSnapshot {
    pub fn take(media: &Path, extension: &str) -> Self {
        let files = transcript_candidates(media, extension)
            .into_iter()
            .filter_map(|p| FileStamp::of(&p).map(|stamp| (p, stamp)))
            .collect();
        Self { files }
    }

    fn unchanged(&self, path: &Path) -> bool {
        self.files
            .iter()
            .any(|(p, stamp)| p == path && FileStamp::of(path).as_ref() == Some(stamp))
    }

    /// The first non-empty transcript that did not exist when the snapshot
    /// was taken, or has been rewritten since.
    pub fn fresh_transcript(&self, media: &Path, extension: &str) -> Option<PathBuf> {
        transcript_candidates(media, extension)
            .into_iter()
            .find(|p| is_nonempty_file(p) && !self.unchanged(p))
    }
}

/// Whether the speech model's weights are already in the engine's cache
/// (`~/.cache/whisper`). Unknown model names report false.
pub fn model_is_cached(model: &str) -> bool {
    let file = match model.to_ascii_lowercase().as_str() {
        "tiny" => "tiny.pt",
        "base" => "base.pt",
        "small" => "small.pt",
        "medium" => "medium.pt",
        "large" => "large-v2.pt",
        "turbo" => "turbo.pt",
        _ => return false,
    };
    std::env::var_os("HOME")
        .map(|home| Path::new(&home).join(".cache/whisper").join(file).is_file())
        .unwrap_or(false)
}

/// Moves `from` to `to`, copying when they are on different filesystems.
fn move_file(from: &Path, to: &Path) -> CoreResult<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

pub struct TranscribePipeline {
    options: TranscribeOptions,
    /// Scratch directory of the ranged item in flight
    scratch: Option<TempDir>,
    /// Transcripts present before the item in flight started
    before: TranscriptSnapshot,
}

impl TranscribePipeline {
    pub fn new(options: TranscribeOptions) -> Self {
        Self {
            options,
            scratch: None,
            before: TranscriptSnapshot::default(),
        }
    }

    fn script_invocation(&self, script: &Path, media: &Path, format: &str) -> ToolInvocation {
        let mut invocation = ToolInvocation::new("bash")
            .path_arg(script)
            .path_arg(media)
            .args([self.options.language.as_str(), self.options.model.as_str(), format])
            .display_name("transcriber");
        if let Some(extra) = self.options.extra_args.as_deref().filter(|e| !e.trim().is_empty()) {
            // One argument per line is accepted; the script expects a single line.
            let extra = extra.split_whitespace().collect::<Vec<_>>().join(" ");
            invocation = invocation.env("WHISPER_EXTRA_ARGS", extra);
        }
        invocation
    }

    fn prepare_range(
        &mut self,
        item: &BatchItem,
        range: TimeRange,
        script: &Path,
        ctx: &BatchContext<'_>,
    ) -> CoreResult<Preparation> {
        let video = item.source_path()?;
        ctx.sink.info(format!(
            "Extracting time range: {}s to {}s ({}s duration)",
            range.start,
            range.end,
            range.length()
        ));

        let scratch = tempfile::Builder::new()
            .prefix("reelrun-range-")
            .tempdir_in(ctx.config.temp_base())?;
        let wav = scratch.path().join(format!("{}_range.wav", get_stem_safe(video)?));

        let extract = ToolInvocation::new(&ctx.config.tools.ffmpeg)
            .args(["-ss", &format_duration(range.start as f64), "-to", &format_duration(range.end as f64), "-i"])
            .path_arg(video)
            .args(["-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le", "-af", "dynaudnorm"])
            .path_arg(&wav)
            .args(["-loglevel", "warning", "-hide_banner", "-y"]);
        ctx.execute_quiet(PreparedStep::new(extract, LineParser::Passthrough, Some(wav.clone())))?;

        ctx.sink.info("Transcribing audio segment...");
        let transcript = wav.with_extension("srt");
        let invocation = self.script_invocation(script, &wav, "srt");
        self.scratch = Some(scratch);

        Ok(Preparation::Run(PreparedStep::new(
            invocation,
            LineParser::for_kind(ToolKind::Transcriber),
            Some(transcript),
        )))
    }
}

impl ItemPipeline for TranscribePipeline {
    fn name(&self) -> &str {
        "transcription"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Transcriber
    }

    fn is_complete(&self, item: &BatchItem) -> bool {
        match (self.options.range, item.source.as_deref()) {
            (None, Some(video)) => {
                find_transcript(video, artifact_extension(&self.options.format)).is_some()
            }
            _ => is_nonempty_file(&item.output_path),
        }
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        if self.options.range.is_some() && self.options.format != "srt" {
            log::warn!(
                "Ranged transcription always produces SRT; ignoring format '{}'",
                self.options.format
            );
        }
        if !model_is_cached(&self.options.model) {
            log::info!(
                "Model '{}' is not cached yet; the first transcription downloads it",
                self.options.model
            );
        }
        let extension = artifact_extension(&self.options.format).to_string();
        collect_files(&self.options.inputs, VIDEO_EXTENSIONS)?
            .into_iter()
            .map(|video| {
                let stem = get_stem_safe(&video)?;
                let name = match self.options.range {
                    Some(r) => format!("{stem}_range_{}_{}.srt", r.start, r.end),
                    None => format!("{stem}.{extension}"),
                };
                let output = video.with_file_name(name);
                Ok(BatchItem::new(get_filename_safe(&video)?, output).with_source(video))
            })
            .collect()
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let script = ctx.config.tools.transcriber_script.clone();
        if !script.is_file() {
            return Err(CoreError::PathError(format!(
                "Transcription script not found: {}",
                script.display()
            )));
        }
        self.scratch = None;

        if let Some(range) = self.options.range {
            return self.prepare_range(item, range, &script, ctx);
        }

        let video = item.source_path()?;
        self.before = TranscriptSnapshot::take(video, artifact_extension(&self.options.format));
        ctx.sink.info(format!("Starting transcription of: {}", item.identifier));
        ctx.sink.info(format!(
            "Language: {}, Model: {}, Format: {}",
            self.options.language, self.options.model, self.options.format
        ));
        Ok(Preparation::Run(PreparedStep::new(
            self.script_invocation(&script, video, &self.options.format),
            LineParser::for_kind(ToolKind::Transcriber),
            None,
        )))
    }

    fn finalize(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<()> {
        let video = item.source_path()?;

        let Some(range) = self.options.range else {
            let extension = artifact_extension(&self.options.format);
            return match self.before.fresh_transcript(video, extension) {
                Some(path) => {
                    ctx.sink.info(format!("✓ Transcription complete: {}", get_filename_safe(&path)?));
                    Ok(())
                }
                None => Err(missing_artifact("transcriber", &item.output_path, Vec::new())),
            };
        };

        let scratch = self.scratch.take().ok_or_else(|| {
            CoreError::OperationFailed("ranged transcription lost its scratch directory".to_string())
        })?;
        let transcript = scratch
            .path()
            .join(format!("{}_range.srt", get_stem_safe(video)?));
        if self.options.adjust_timestamps {
            ctx.sink.info(format!("Adjusting timestamps by +{}s...", range.start));
            shift_srt_file(&transcript, range.start)?;
        }
        move_file(&transcript, &item.output_path)?;
        ctx.sink.info(format!(
            "✓ Time range transcription complete: {}",
            get_filename_safe(&item.output_path)?
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(range: Option<TimeRange>) -> TranscribeOptions {
        TranscribeOptions {
            inputs: Vec::new(),
            language: "es".to_string(),
            model: "turbo".to_string(),
            format: "srt".to_string(),
            extra_args: Some("--beam_size 5".to_string()),
            range,
            adjust_timestamps: true,
        }
    }

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(10, 5).is_err());
        assert!(TimeRange::new(5, 5).is_err());
        assert_eq!(TimeRange::new(60, 90).unwrap().length(), 30);
    }

    #[test]
    fn test_find_numbered_variant() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep.mkv");
        assert_eq!(find_transcript(&video, "srt"), None);
        fs::write(dir.path().join("ep_2.srt"), "x").unwrap();
        assert_eq!(find_transcript(&video, "srt"), Some(dir.path().join("ep_2.srt")));
        fs::write(dir.path().join("ep.srt"), "x").unwrap();
        assert_eq!(find_transcript(&video, "srt"), Some(dir.path().join("ep.srt")));
    }

    #[test]
    fn test_empty_candidate_is_not_a_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep.mkv");
        fs::write(dir.path().join("ep.srt"), "").unwrap();
        assert_eq!(find_transcript(&video, "srt"), None);
    }

    #[test]
    fn test_stale_variant_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep.mkv");
        let stale = dir.path().join("ep_1.srt");
        fs::write(&stale, "from an earlier run").unwrap();

        let before = TranscriptSnapshot::take(&video, "srt");
        assert_eq!(before.fresh_transcript(&video, "srt"), None);

        fs::write(dir.path().join("ep_2.srt"), "new").unwrap();
        assert_eq!(before.fresh_transcript(&video, "srt"), Some(dir.path().join("ep_2.srt")));
    }

    #[test]
    fn test_rewritten_variant_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep.mkv");
        let variant = dir.path().join("ep_1.srt");
        fs::write(&variant, "old").unwrap();

        let before = TranscriptSnapshot::take(&video, "srt");
        fs::write(&variant, "rewritten by this run").unwrap();
        assert_eq!(before.fresh_transcript(&video, "srt"), Some(variant));
    }

    #[test]
    fn test_numbered_variant_marks_item_complete() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep.mkv");
        fs::write(&video, b"x").unwrap();
        let mut opts = options(None);
        opts.inputs = vec![video];
        let mut pipeline = TranscribePipeline::new(opts);
        let items = pipeline.items().unwrap();
        assert!(!pipeline.is_complete(&items[0]));

        fs::write(dir.path().join("ep_1.srt"), "x").unwrap();
        assert!(pipeline.is_complete(&items[0]));
    }

    #[test]
    fn test_script_invocation_passes_extra_args_by_env() {
        let pipeline = TranscribePipeline::new(options(None));
        let inv = pipeline.script_invocation(Path::new("/opt/whisper_auto.sh"), Path::new("/v/ep.mkv"), "srt");
        assert_eq!(inv.program, "bash");
        assert_eq!(inv.args, vec!["/opt/whisper_auto.sh", "/v/ep.mkv", "es", "turbo", "srt"]);
        assert_eq!(inv.env, vec![("WHISPER_EXTRA_ARGS".to_string(), "--beam_size 5".to_string())]);
    }

    #[test]
    fn test_multiline_extra_args_joined() {
        let mut opts = options(None);
        opts.extra_args = Some("--beam_size 5\n--temperature 0".to_string());
        let inv = TranscribePipeline::new(opts).script_invocation(Path::new("s.sh"), Path::new("v.mkv"), "srt");
        assert_eq!(inv.env[0].1, "--beam_size 5 --temperature 0");
    }

    #[test]
    fn test_unknown_model_is_not_cached() {
        assert!(!model_is_cached("not-a-model"));
    }

    #[test]
    fn test_ranged_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("film.mp4");
        fs::write(&video, b"x").unwrap();
        let mut opts = options(Some(TimeRange::new(120, 180).unwrap()));
        opts.inputs = vec![video];
        let mut pipeline = TranscribePipeline::new(opts);
        let items = pipeline.items().unwrap();
        assert_eq!(items[0].output_path, dir.path().join("film_range_120_180.srt"));
    }
}
