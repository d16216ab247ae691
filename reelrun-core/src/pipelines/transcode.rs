// ============================================================================
// reelrun-core/src/pipelines/transcode.rs
// ============================================================================
//
// TRANSCODE: Subtitle Burn-In, Scaling, Watermark and Downmix
//
// For every input video a matching subtitle is looked up; videos without
// one are skipped. Duration and audio channels are probed first (bounded by
// the probe timeout). A failed probe only degrades the item: progress becomes
// indeterminate, or the audio is left as is.
//
// Output is `<output_dir>/<stem>.mp4`, H.264 CRF 20 with AAC 128k audio.

use std::path::{Path, PathBuf};

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{CoreError, CoreResult};
use crate::external::{probe_audio_channels, ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::utils::{get_filename_safe, get_stem_safe};

use super::{collect_files, duration_for_progress, ensure_dir, iso_639_code, VIDEO_EXTENSIONS};

/// Subtitle style forced onto burned-in subtitles.
const SUBTITLE_STYLE: &str = "FontName=Arial,Bold=1";

/// Output height and matching encoder preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    P720,
    P1080,
}

impl Resolution {
    pub fn height(self) -> u32 {
        match self {
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }

    pub fn preset(self) -> &'static str {
        match self {
            Resolution::P720 => "medium",
            Resolution::P1080 => "slow",
        }
    }

    /// 720p keeps the width even (`-2`); 1080p keeps the aspect as is.
    fn scale(self) -> String {
        match self {
            Resolution::P720 => format!("scale=-2:{}", self.height()),
            Resolution::P1080 => format!("scale=-1:{}", self.height()),
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('p') {
            "720" => Ok(Resolution::P720),
            "1080" => Ok(Resolution::P1080),
            other => Err(CoreError::InvalidInput(format!(
                "unsupported resolution '{other}' (expected 720 or 1080)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Video files or directories holding them
    pub inputs: Vec<PathBuf>,
    pub subtitles_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Image overlaid at 80% opacity
    pub watermark: Option<PathBuf>,
    pub resolution: Resolution,
    /// Also look for `<stem>.<iso code>.srt`
    pub iso_suffix: bool,
    /// Language whose ISO code is looked for
    pub language: String,
}

/// `pan` filter folding more than two channels into stereo.
pub fn downmix_filter(channels: u32) -> Option<&'static str> {
    match channels {
        0..=2 => None,
        // FL FR FC LFE BL BR: centre and rears folded into each side
        6 => Some("pan=stereo|c0=0.5*c2+0.5*c0+0.3*c4|c1=0.5*c2+0.5*c1+0.3*c5"),
        4.. => Some("pan=stereo|c0=0.5*c0+0.5*c2|c1=0.5*c1+0.5*c3"),
        3 => Some("pan=stereo|c0=0.5*c0+0.5*c2|c1=0.5*c1+0.5*c2"),
    }
}

/// Quotes a path for use inside a filter-graph option value.
fn filter_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// The video filter graph: burn-in, scale and, with a watermark as second
/// input, the overlay.
pub fn video_filter(subtitle: &Path, resolution: Resolution, watermark: bool) -> String {
    let burn_in = format!(
        "subtitles={}:force_style='{SUBTITLE_STYLE}'",
        filter_quote(subtitle)
    );
    if !watermark {
        return format!("{burn_in},{}", resolution.scale());
    }
    let position = match resolution {
        Resolution::P720 => "W-w-10:H-h-10",
        Resolution::P1080 => "0:0",
    };
    format!(
        "[0:v]{burn_in},{}[scaled];[1:v]format=rgba,colorchannelmixer=aa=0.8[wm];[scaled][wm]overlay={position}",
        resolution.scale()
    )
}

/// Full transcoder argument list.
pub fn transcode_args(
    video: &Path,
    subtitle: &Path,
    watermark: Option<&Path>,
    resolution: Resolution,
    audio_filter: Option<&str>,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-err_detect",
        "ignore_err",
        "-fflags",
        "+discardcorrupt+genpts",
        "-max_error_rate",
        "1.0",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(video.to_string_lossy().to_string());

    let filter = video_filter(subtitle, resolution, watermark.is_some());
    match watermark {
        Some(image) => {
            args.push("-i".into());
            args.push(image.to_string_lossy().to_string());
            args.push("-filter_complex".into());
        }
        None => args.push("-vf".into()),
    }
    args.push(filter);

    args.extend(
        ["-c:v", "libx264", "-preset", resolution.preset(), "-crf", "20"]
            .iter()
            .map(|s| s.to_string()),
    );
    if let Some(af) = audio_filter {
        args.push("-af".into());
        args.push(af.to_string());
    }
    args.extend(["-c:a", "aac", "-b:a", "128k"].iter().map(|s| s.to_string()));
    args.push(output.to_string_lossy().to_string());
    args
}

pub struct TranscodePipeline {
    options: TranscodeOptions,
}

impl TranscodePipeline {
    pub fn new(options: TranscodeOptions) -> Self {
        Self { options }
    }

    fn subtitle_names(&self, stem: &str) -> Vec<String> {
        let mut names = vec![format!("{stem}.srt")];
        if self.options.iso_suffix {
            names.push(format!("{stem}.{}.srt", iso_639_code(&self.options.language)));
        }
        names
    }

    /// Candidate subtitle paths in lookup order: each name next to the
    /// video, then in the subtitles directory.
    pub fn subtitle_candidates(&self, video: &Path) -> CoreResult<Vec<PathBuf>> {
        let stem = get_stem_safe(video)?;
        let video_dir = video.parent().unwrap_or_else(|| Path::new("."));
        Ok(self
            .subtitle_names(&stem)
            .into_iter()
            .flat_map(|name| [video_dir.join(&name), self.options.subtitles_dir.join(&name)])
            .collect())
    }
}

impl ItemPipeline for TranscodePipeline {
    fn name(&self) -> &str {
        "transcode"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Transcoder
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        if let Some(watermark) = &self.options.watermark {
            if !watermark.is_file() {
                return Err(CoreError::PathError(format!(
                    "Watermark file not found: {}",
                    watermark.display()
                )));
            }
        }
        collect_files(&self.options.inputs, VIDEO_EXTENSIONS)?
            .into_iter()
            .map(|video| {
                let output = self.options.output_dir.join(format!("{}.mp4", get_stem_safe(&video)?));
                Ok(BatchItem::new(get_filename_safe(&video)?, output).with_source(video))
            })
            .collect()
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let video = item.source_path()?;
        let candidates = self.subtitle_candidates(video)?;
        let Some(subtitle) = candidates.iter().find(|c| c.is_file()).cloned() else {
            for candidate in &candidates {
                ctx.sink.info(format!("  Checked: {}", candidate.display()));
            }
            return Ok(Preparation::Skip("subtitle file not found".to_string()));
        };
        ensure_dir(&self.options.output_dir)?;

        let resolution = self.options.resolution;
        ctx.sink.info(format!("Processing: {} ({}p)", item.identifier, resolution.height()));
        ctx.sink.info(format!("  Subtitle: {}", subtitle.display()));
        ctx.sink.info(format!("  Output: {}", get_filename_safe(&item.output_path)?));
        if let Some(watermark) = &self.options.watermark {
            ctx.sink.info(format!("  Watermark: {}", get_filename_safe(watermark)?));
        }

        let tools = &ctx.config.tools;
        let duration = duration_for_progress(video, ctx)?;

        let audio_filter = match probe_audio_channels(ctx.spawner, ctx.control, &tools.ffprobe, video, ctx.config.probe_timeout) {
            Ok(Some(channels)) => {
                let filter = downmix_filter(channels);
                if filter.is_some() {
                    ctx.sink.info(format!(
                        "  Audio: {channels} channels detected, converting to stereo (2.0)"
                    ));
                }
                filter
            }
            Ok(None) => None,
            Err(CoreError::UserCancelled) => return Err(CoreError::UserCancelled),
            Err(e) => {
                ctx.sink.warning(format!("  Audio channel probe failed ({e}); keeping source layout"));
                None
            }
        };

        let args = transcode_args(
            video,
            &subtitle,
            self.options.watermark.as_deref(),
            resolution,
            audio_filter,
            &item.output_path,
        );
        Ok(Preparation::Run(PreparedStep::new(
            ToolInvocation::new(&tools.ffmpeg).args(args),
            LineParser::timecode(duration),
            Some(item.output_path.clone()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_mapping() {
        assert_eq!(downmix_filter(2), None);
        assert_eq!(
            downmix_filter(6),
            Some("pan=stereo|c0=0.5*c2+0.5*c0+0.3*c4|c1=0.5*c2+0.5*c1+0.3*c5")
        );
        assert_eq!(downmix_filter(8), downmix_filter(4));
        assert_eq!(
            downmix_filter(3),
            Some("pan=stereo|c0=0.5*c0+0.5*c2|c1=0.5*c1+0.5*c2")
        );
    }

    #[test]
    fn test_filter_without_watermark() {
        let filter = video_filter(Path::new("/subs/ep 1.srt"), Resolution::P720, false);
        assert_eq!(
            filter,
            "subtitles='/subs/ep 1.srt':force_style='FontName=Arial,Bold=1',scale=-2:720"
        );
    }

    #[test]
    fn test_filter_with_watermark() {
        let filter = video_filter(Path::new("/s/a.srt"), Resolution::P1080, true);
        assert!(filter.starts_with("[0:v]subtitles='/s/a.srt'"));
        assert!(filter.contains("scale=-1:1080[scaled]"));
        assert!(filter.contains("colorchannelmixer=aa=0.8[wm]"));
        assert!(filter.ends_with("overlay=0:0"));
    }

    #[test]
    fn test_args_layout() {
        let args = transcode_args(
            Path::new("in.mkv"),
            Path::new("in.srt"),
            Some(Path::new("logo.png")),
            Resolution::P720,
            downmix_filter(6),
            Path::new("out/in.mp4"),
        );
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-filter_complex") - 1], "logo.png");
        assert_eq!(args[pos("-preset") + 1], "medium");
        assert_eq!(args[pos("-crf") + 1], "20");
        assert!(args[pos("-af") + 1].starts_with("pan=stereo"));
        assert_eq!(args.last().unwrap(), "out/in.mp4");
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::P1080);
        assert_eq!("720".parse::<Resolution>().unwrap(), Resolution::P720);
        assert!("480".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_subtitle_lookup_order() {
        let pipeline = TranscodePipeline::new(TranscodeOptions {
            inputs: Vec::new(),
            subtitles_dir: PathBuf::from("/subs"),
            output_dir: PathBuf::from("/out"),
            watermark: None,
            resolution: Resolution::P720,
            iso_suffix: true,
            language: "Spanish".to_string(),
        });
        let candidates = pipeline.subtitle_candidates(Path::new("/videos/ep1.mkv")).unwrap();
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/videos/ep1.srt"),
                PathBuf::from("/subs/ep1.srt"),
                PathBuf::from("/videos/ep1.spa.srt"),
                PathBuf::from("/subs/ep1.spa.srt"),
            ]
        );
    }
}
