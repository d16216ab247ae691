// ============================================================================
// reelrun-core/src/pipelines/extract.rs
// ============================================================================
//
// EXTRACT: First Subtitle Track of Every MKV
//
// Each track is written as `<subtitles>/<stem>.srt`.

use std::path::PathBuf;

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{CoreError, CoreResult};
use crate::external::{ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::utils::{get_filename_safe, get_stem_safe};

use super::{collect_files, ensure_dir};

pub struct ExtractPipeline {
    input_dir: PathBuf,
    subtitles_dir: PathBuf,
}

impl ExtractPipeline {
    pub fn new(input_dir: impl Into<PathBuf>, subtitles_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            subtitles_dir: subtitles_dir.into(),
        }
    }
}

impl ItemPipeline for ExtractPipeline {
    fn name(&self) -> &str {
        "subtitle extraction"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::SubtitleExtractor
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        if !self.input_dir.is_dir() {
            return Err(CoreError::PathError(format!(
                "Downloads directory not found: {}",
                self.input_dir.display()
            )));
        }
        collect_files(std::slice::from_ref(&self.input_dir), &["mkv"])?
            .into_iter()
            .map(|mkv| {
                let srt = self.subtitles_dir.join(format!("{}.srt", get_stem_safe(&mkv)?));
                Ok(BatchItem::new(get_filename_safe(&mkv)?, srt).with_source(mkv))
            })
            .collect()
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let mkv = item.source_path()?;
        ensure_dir(&self.subtitles_dir)?;
        ctx.sink.info(format!("Extracting subtitles from: {}", item.identifier));

        let invocation = ToolInvocation::new(&ctx.config.tools.ffmpeg)
            .args(["-y", "-i"])
            .path_arg(mkv)
            .args(["-map", "0:s:0"])
            .path_arg(&item.output_path);

        Ok(Preparation::Run(PreparedStep::new(
            invocation,
            LineParser::for_kind(ToolKind::SubtitleExtractor),
            Some(item.output_path.clone()),
        )))
    }
}
