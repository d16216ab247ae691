// ============================================================================
// reelrun-core/src/pipelines/remux.rs
// ============================================================================
//
// REMUX: Subtitle Added as a Soft Track, Streams Copied
//
// Every .mkv and .mp4 in a folder is rewritten as
// `<stem>_remuxed.<container>` with its subtitle muxed in. The subtitle is
// `<stem>.srt` or `<stem>.vtt` next to the video; a video stem ending in
// `_<digits>` (a numbered download) also matches the subtitle without that
// suffix. Audio and video are stream-copied; only the subtitle is converted
// to a codec the target container accepts.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{CoreError, CoreResult};
use crate::external::{ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::utils::{get_filename_safe, get_stem_safe, has_extension};

use super::{collect_files, duration_for_progress};

/// Appended to the stem of every remuxed file.
pub const REMUX_SUFFIX: &str = "_remuxed";

const REMUX_INPUTS: &[&str] = &["mkv", "mp4"];

static NUMBERED_STEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_\d+$").expect("Invalid numbered stem regex"));

/// Output container of a remux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Container {
    #[default]
    Mkv,
    Mp4,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mkv => "mkv",
            Container::Mp4 => "mp4",
        }
    }

    /// Subtitle codec for `subtitle` in this container. MP4 only carries
    /// `mov_text`; Matroska keeps the subtitle's own format.
    pub fn subtitle_codec(self, subtitle: &Path) -> &'static str {
        match self {
            Container::Mp4 => "mov_text",
            Container::Mkv if has_extension(subtitle, &["vtt"]) => "webvtt",
            Container::Mkv => "srt",
        }
    }
}

impl std::str::FromStr for Container {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mkv" => Ok(Container::Mkv),
            "mp4" => Ok(Container::Mp4),
            other => Err(CoreError::InvalidInput(format!(
                "unsupported container '{other}' (expected mkv or mp4)"
            ))),
        }
    }
}

/// Subtitle files looked for, in order, for `video`.
pub fn subtitle_candidates(video: &Path) -> Vec<PathBuf> {
    let dir = video.parent().unwrap_or_else(|| Path::new("."));
    let Some(stem) = video.file_stem().map(|s| s.to_string_lossy().to_string()) else {
        return Vec::new();
    };
    let mut stems = vec![stem.clone()];
    if let Some(caps) = NUMBERED_STEM.captures(&stem) {
        stems.push(caps[1].to_string());
    }
    stems
        .iter()
        .flat_map(|s| ["srt", "vtt"].map(|ext| dir.join(format!("{s}.{ext}"))))
        .collect()
}

fn is_remux_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|s| s.to_string_lossy().ends_with(REMUX_SUFFIX))
}

pub struct RemuxPipeline {
    folder: PathBuf,
    container: Container,
}

impl RemuxPipeline {
    pub fn new(folder: impl Into<PathBuf>, container: Container) -> Self {
        Self {
            folder: folder.into(),
            container,
        }
    }
}

/// Stream-copy arguments muxing `subtitle` into `video`.
pub fn remux_args(video: &Path, subtitle: &Path, container: Container, output: &Path) -> Vec<String> {
    let path = |p: &Path| p.to_string_lossy().to_string();
    vec![
        "-y".to_string(),
        "-i".to_string(),
        path(video),
        "-i".to_string(),
        path(subtitle),
        "-c".to_string(),
        "copy".to_string(),
        "-c:s".to_string(),
        container.subtitle_codec(subtitle).to_string(),
        path(output),
    ]
}

impl ItemPipeline for RemuxPipeline {
    fn name(&self) -> &str {
        "subtitle remux"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Transcoder
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        if !self.folder.is_dir() {
            return Err(CoreError::PathError(format!(
                "Not a directory: {}",
                self.folder.display()
            )));
        }
        collect_files(std::slice::from_ref(&self.folder), REMUX_INPUTS)?
            .into_iter()
            .filter(|video| !is_remux_output(video))
            .map(|video| {
                let name = format!(
                    "{}{REMUX_SUFFIX}.{}",
                    get_stem_safe(&video)?,
                    self.container.extension()
                );
                let output = video.with_file_name(name);
                Ok(BatchItem::new(get_filename_safe(&video)?, output).with_source(video))
            })
            .collect()
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let video = item.source_path()?;
        let Some(subtitle) = subtitle_candidates(video).into_iter().find(|c| c.is_file()) else {
            return Ok(Preparation::Skip("no matching SRT/VTT subtitle".to_string()));
        };

        ctx.sink.info(format!("Remuxing: {}", item.identifier));
        ctx.sink.info(format!("  Subtitle: {}", get_filename_safe(&subtitle)?));
        ctx.sink.info(format!("  Output: {}", get_filename_safe(&item.output_path)?));

        let duration = duration_for_progress(video, ctx)?;
        let args = remux_args(video, &subtitle, self.container, &item.output_path);
        Ok(Preparation::Run(PreparedStep::new(
            ToolInvocation::new(&ctx.config.tools.ffmpeg).args(args),
            LineParser::timecode(duration),
            Some(item.output_path.clone()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_subtitle_codec_per_container() {
        assert_eq!(Container::Mkv.subtitle_codec(Path::new("a.srt")), "srt");
        assert_eq!(Container::Mkv.subtitle_codec(Path::new("a.vtt")), "webvtt");
        assert_eq!(Container::Mp4.subtitle_codec(Path::new("a.vtt")), "mov_text");
        assert_eq!("MP4".parse::<Container>().unwrap(), Container::Mp4);
        assert!("avi".parse::<Container>().is_err());
    }

    #[test]
    fn test_numbered_stem_falls_back_to_base_subtitle() {
        let candidates = subtitle_candidates(Path::new("/v/show_3.mkv"));
        let names: Vec<_> = candidates
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["show_3.srt", "show_3.vtt", "show.srt", "show.vtt"]);
        assert_eq!(subtitle_candidates(Path::new("/v/ep.mp4")).len(), 2);
    }

    #[test]
    fn test_items_skip_earlier_outputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.mkv", "a_remuxed.mkv", "notes.srt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let mut pipeline = RemuxPipeline::new(dir.path(), Container::Mp4);
        let items = pipeline.items().unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a.mkv", "b.mp4"]);
        assert_eq!(items[0].output_path, dir.path().join("a_remuxed.mp4"));
    }

    #[test]
    fn test_remux_args_copy_streams() {
        let args = remux_args(
            Path::new("ep.mkv"),
            Path::new("ep.vtt"),
            Container::Mkv,
            Path::new("ep_remuxed.mkv"),
        );
        assert_eq!(
            args,
            vec!["-y", "-i", "ep.mkv", "-i", "ep.vtt", "-c", "copy", "-c:s", "webvtt", "ep_remuxed.mkv"]
        );
    }
}
