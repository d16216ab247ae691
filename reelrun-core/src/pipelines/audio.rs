// ============================================================================
// reelrun-core/src/pipelines/audio.rs
// ============================================================================
//
// AUDIO: Per-Channel WAV Split and Audio-Only Conversion
//
// Splitting writes every channel of a video's first audio stream as a mono
// 48 kHz PCM file `<stem>_channel_<N>.wav` next to the video, in a single
// transcoder run. The channel count is given or read per file with
// ffprobe. An item counts as done once `<stem>_channel_1.wav` exists; a run
// that leaves any channel file missing is failed and its channel files are
// removed.
//
// Conversion drops the video and re-encodes the audio to MP3 (192k, 44.1 kHz)
// or AAC (192k, 48 kHz, in an .m4a container).

use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{missing_artifact, CoreError, CoreResult};
use crate::external::{probe_audio_channels, ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::utils::{get_filename_safe, get_stem_safe, is_nonempty_file};

use super::{collect_files, duration_for_progress, VIDEO_EXTENSIONS};

/// `<stem>_channel_<n>.wav` next to `video`; channels count from 1.
pub fn channel_path(video: &Path, n: u32) -> CoreResult<PathBuf> {
    Ok(video.with_file_name(format!("{}_channel_{n}.wav", get_stem_safe(video)?)))
}

/// `-filter_complex` graph splitting the first audio stream into `channels`
/// mono outputs labelled `[ch1]`, `[ch2]`, ...
pub fn split_filter(channels: u32) -> String {
    let taps: String = (1..=channels).map(|n| format!("[s{n}]")).collect();
    let mut graph = format!("[0:a:0]asplit={channels}{taps}");
    for n in 1..=channels {
        graph.push_str(&format!(";[s{n}]pan=mono|c0=c{}[ch{n}]", n - 1));
    }
    graph
}

pub struct SplitChannelsPipeline {
    inputs: Vec<PathBuf>,
    /// Fixed channel count; read per file when unset
    channels: Option<u32>,
    /// Channel count of the item in flight
    pending: u32,
}

impl SplitChannelsPipeline {
    pub fn new(inputs: Vec<PathBuf>, channels: Option<u32>) -> Self {
        Self {
            inputs,
            channels,
            pending: 0,
        }
    }

    fn channel_count(&self, video: &Path, ctx: &BatchContext<'_>) -> CoreResult<Option<u32>> {
        if let Some(fixed) = self.channels {
            return Ok(Some(fixed));
        }
        probe_audio_channels(
            ctx.spawner,
            ctx.control,
            &ctx.config.tools.ffprobe,
            video,
            ctx.config.probe_timeout,
        )
    }

    fn split_args(video: &Path, channels: u32) -> CoreResult<Vec<String>> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            split_filter(channels),
        ];
        for n in 1..=channels {
            args.extend([
                "-map".to_string(),
                format!("[ch{n}]"),
                "-acodec".to_string(),
                "pcm_s16le".to_string(),
                "-ar".to_string(),
                "48000".to_string(),
                channel_path(video, n)?.to_string_lossy().to_string(),
            ]);
        }
        Ok(args)
    }

    fn remove_channels(video: &Path, channels: u32) {
        for n in 1..=channels {
            if let Ok(path) = channel_path(video, n) {
                if path.exists() {
                    if let Err(e) = fs::remove_file(&path) {
                        log::warn!("Could not remove {}: {e}", path.display());
                    }
                }
            }
        }
    }
}

impl ItemPipeline for SplitChannelsPipeline {
    fn name(&self) -> &str {
        "audio channel split"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Transcoder
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        if self.channels == Some(0) {
            return Err(CoreError::InvalidInput("channel count must be at least 1".to_string()));
        }
        collect_files(&self.inputs, VIDEO_EXTENSIONS)?
            .into_iter()
            .map(|video| {
                let first = channel_path(&video, 1)?;
                Ok(BatchItem::new(get_filename_safe(&video)?, first).with_source(video))
            })
            .collect()
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let video = item.source_path()?;
        let channels = match self.channel_count(video, ctx)? {
            Some(n) if n > 0 => n,
            _ => return Ok(Preparation::Skip("no audio stream".to_string())),
        };
        self.pending = channels;

        ctx.sink.info(format!("Splitting audio channels ({channels} channels): {}", item.identifier));
        let duration = duration_for_progress(video, ctx)?;
        Ok(Preparation::Run(PreparedStep::new(
            ToolInvocation::new(&ctx.config.tools.ffmpeg).args(Self::split_args(video, channels)?),
            LineParser::timecode(duration),
            Some(item.output_path.clone()),
        )))
    }

    fn finalize(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<()> {
        let video = item.source_path()?;
        for n in 1..=self.pending {
            let path = channel_path(video, n)?;
            if !is_nonempty_file(&path) {
                Self::remove_channels(video, self.pending);
                return Err(missing_artifact("transcoder", &path, Vec::new()));
            }
            ctx.sink.info(format!("  ✓ Extracted channel {n}: {}", get_filename_safe(&path)?));
        }
        Ok(())
    }
}

/// Target of an audio-only conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Aac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "m4a",
        }
    }

    fn encoder_args(self) -> [&'static str; 6] {
        match self {
            AudioFormat::Mp3 => ["-acodec", "libmp3lame", "-b:a", "192k", "-ar", "44100"],
            AudioFormat::Aac => ["-acodec", "aac", "-b:a", "192k", "-ar", "48000"],
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" | "m4a" => Ok(AudioFormat::Aac),
            other => Err(CoreError::InvalidInput(format!(
                "unsupported audio format '{other}' (expected mp3 or aac)"
            ))),
        }
    }
}

pub struct ConvertAudioPipeline {
    inputs: Vec<PathBuf>,
    format: AudioFormat,
}

impl ConvertAudioPipeline {
    pub fn new(inputs: Vec<PathBuf>, format: AudioFormat) -> Self {
        Self { inputs, format }
    }
}

impl ItemPipeline for ConvertAudioPipeline {
    fn name(&self) -> &str {
        "audio conversion"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Transcoder
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        collect_files(&self.inputs, VIDEO_EXTENSIONS)?
            .into_iter()
            .map(|video| {
                let output = video.with_extension(self.format.extension());
                Ok(BatchItem::new(get_filename_safe(&video)?, output).with_source(video))
            })
            .collect()
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let video = item.source_path()?;
        ctx.sink.info(format!(
            "Converting audio of {} to {}",
            item.identifier,
            get_filename_safe(&item.output_path)?
        ));
        let duration = duration_for_progress(video, ctx)?;
        let invocation = ToolInvocation::new(&ctx.config.tools.ffmpeg)
            .args(["-y", "-i"])
            .path_arg(video)
            .arg("-vn")
            .args(self.format.encoder_args())
            .path_arg(&item.output_path);
        Ok(Preparation::Run(PreparedStep::new(
            invocation,
            LineParser::timecode(duration),
            Some(item.output_path.clone()),
        )))
    }
}
