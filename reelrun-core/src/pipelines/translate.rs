// ============================================================================
// reelrun-core/src/pipelines/translate.rs
// ============================================================================
//
// TRANSLATE: Subtitle Translation With Backups
//
// Before translating `<base>.srt` the original is moved aside as
// `<base>_OG.srt` (an existing backup is kept), and the translator writes
// its result under the original name. With ISO suffixing the result is then
// renamed to `<base>.<code>.srt`. A language suffix already present on the
// input (`movie.spa.srt`) is not part of `<base>`.
//
// The API key only ever travels through the child's environment.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{CoreError, CoreResult};
use crate::external::{ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::utils::{get_filename_safe, get_stem_safe, has_extension, is_nonempty_file};

use super::iso_639_code;

/// Suffix of the untranslated backup.
pub const BACKUP_SUFFIX: &str = "_OG";

static LANGUAGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)\.([a-z]{3})$").expect("Invalid language suffix regex"));

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Subtitle files or directories holding them
    pub inputs: Vec<PathBuf>,
    /// Target language name, e.g. "English"
    pub language: String,
    pub api_key: Option<String>,
    /// Optional second key, passed to the translator with `-k2`
    pub api_key2: Option<String>,
    /// Rename results to `<base>.<iso code>.srt`
    pub iso_suffix: bool,
}

/// `<base>` of a subtitle path: the stem without a three-letter language
/// suffix.
fn base_name(srt: &Path) -> CoreResult<String> {
    let stem = get_stem_safe(srt)?;
    Ok(match LANGUAGE_SUFFIX.captures(&stem) {
        Some(caps) => caps[1].to_string(),
        None => stem,
    })
}

pub fn backup_path(srt: &Path) -> CoreResult<PathBuf> {
    Ok(srt.with_file_name(format!("{}{BACKUP_SUFFIX}.srt", base_name(srt)?)))
}

fn is_backup(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(&format!("{BACKUP_SUFFIX}.srt")))
        .unwrap_or(false)
}

pub struct TranslatePipeline {
    options: TranslateOptions,
    code: &'static str,
}

impl TranslatePipeline {
    pub fn new(options: TranslateOptions) -> Self {
        let code = iso_639_code(&options.language);
        Self { options, code }
    }

    fn output_for(&self, srt: &Path) -> CoreResult<PathBuf> {
        if self.options.iso_suffix {
            Ok(srt.with_file_name(format!("{}.{}.srt", base_name(srt)?, self.code)))
        } else {
            Ok(srt.to_path_buf())
        }
    }

    /// Translation sources among `inputs`. Directories also yield backups
    /// whose translation never finished (the backup exists but no subtitle
    /// refers to it), so an interrupted run resumes.
    fn sources(&self) -> CoreResult<Vec<PathBuf>> {
        let mut sources = Vec::new();
        for input in &self.options.inputs {
            if input.is_dir() {
                let mut files: Vec<PathBuf> = fs::read_dir(input)?
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.is_file() && has_extension(p, &["srt"]))
                    .collect();
                files.sort();

                let (backups, subtitles): (Vec<PathBuf>, Vec<PathBuf>) =
                    files.into_iter().partition(|p| is_backup(p));
                let claimed: HashSet<PathBuf> = subtitles
                    .iter()
                    .filter_map(|s| backup_path(s).ok())
                    .collect();
                sources.extend(subtitles);
                for backup in backups.into_iter().filter(|b| !claimed.contains(b)) {
                    let stem = get_stem_safe(&backup)?;
                    let base = stem.strip_suffix(BACKUP_SUFFIX).unwrap_or(&stem);
                    sources.push(backup.with_file_name(format!("{base}.srt")));
                }
            } else if input.is_file() {
                if has_extension(input, &["srt"]) && !is_backup(input) {
                    sources.push(input.clone());
                }
            } else {
                return Err(CoreError::PathError(format!("Input not found: {}", input.display())));
            }
        }
        Ok(sources)
    }
}

impl ItemPipeline for TranslatePipeline {
    fn name(&self) -> &str {
        "translation"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Translator
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        if self.options.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(CoreError::InvalidInput(
                "API key not set. Set GEMINI_API_KEY or GST_API_KEY, or pass --api-key".to_string(),
            ));
        }
        self.sources()?
            .into_iter()
            .map(|srt| {
                let output = self.output_for(&srt)?;
                Ok(BatchItem::new(get_filename_safe(&srt)?, output).with_source(srt))
            })
            .collect()
    }

    /// Done when the result exists and, if it sits under the source's own
    /// name, the original has been backed up (otherwise it is the
    /// untranslated input).
    fn is_complete(&self, item: &BatchItem) -> bool {
        let Some(source) = item.source.as_deref() else {
            return false;
        };
        if !is_nonempty_file(&item.output_path) {
            return false;
        }
        item.output_path != source || backup_path(source).is_ok_and(|b| b.exists())
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let srt = item.source_path()?;
        let backup = backup_path(srt)?;

        if !backup.exists() {
            if !srt.exists() {
                return Err(CoreError::PathError(format!("Subtitle not found: {}", srt.display())));
            }
            fs::rename(srt, &backup)?;
            ctx.sink.info(format!("  Original saved as {}", get_filename_safe(&backup)?));
        }
        ctx.sink.info(format!("Translating: {}", item.identifier));

        // The translator may be configured as e.g. "python3 -m gemini_srt_translator".
        let mut command = ctx.config.tools.translator.split_whitespace();
        let program = command.next().unwrap_or("gst");
        let mut invocation = ToolInvocation::new(program)
            .args(command)
            .args(["translate", "-i"])
            .path_arg(&backup)
            .args(["-l", self.options.language.as_str(), "-o"])
            .path_arg(srt)
            .arg("--skip-upgrade");
        if let Some(key2) = self.options.api_key2.as_deref().filter(|k| !k.is_empty()) {
            invocation = invocation.args(["-k2", key2]);
        }
        if let Some(key) = &self.options.api_key {
            invocation = invocation.env("GEMINI_API_KEY", key.as_str());
        }

        Ok(Preparation::Run(PreparedStep::new(
            invocation,
            LineParser::for_kind(ToolKind::Translator),
            Some(srt.to_path_buf()),
        )))
    }

    fn finalize(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<()> {
        let srt = item.source_path()?;

        if let Some(dir) = srt.parent() {
            for entry in fs::read_dir(dir)?.filter_map(Result::ok) {
                let path = entry.path();
                if has_extension(&path, &["progress"]) {
                    match fs::remove_file(&path) {
                        Ok(()) => log::debug!("Removed {}", path.display()),
                        Err(e) => ctx.sink.warning(format!(
                            "    Could not remove {}: {e}",
                            path.display()
                        )),
                    }
                }
            }
        }

        if item.output_path != srt {
            fs::rename(srt, &item.output_path)?;
            ctx.sink.info(format!("    Renamed to: {}", get_filename_safe(&item.output_path)?));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(inputs: Vec<PathBuf>, iso_suffix: bool) -> TranslateOptions {
        TranslateOptions {
            inputs,
            language: "English".to_string(),
            api_key: Some("key".to_string()),
            api_key2: None,
            iso_suffix,
        }
    }

    #[test]
    fn test_backup_path_drops_language_suffix() {
        assert_eq!(
            backup_path(Path::new("/s/movie.spa.srt")).unwrap(),
            PathBuf::from("/s/movie_OG.srt")
        );
        assert_eq!(
            backup_path(Path::new("/s/ep1.srt")).unwrap(),
            PathBuf::from("/s/ep1_OG.srt")
        );
    }

    #[test]
    fn test_iso_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("movie.spa.srt");
        fs::write(&srt, "1").unwrap();
        let mut pipeline = TranslatePipeline::new(options(vec![dir.path().to_path_buf()], true));
        let items = pipeline.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].output_path, dir.path().join("movie.eng.srt"));
    }

    #[test]
    fn test_directory_scan_resumes_orphaned_backup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.srt"), "1").unwrap();
        fs::write(dir.path().join("a_OG.srt"), "1").unwrap();
        fs::write(dir.path().join("b_OG.srt"), "1").unwrap();

        let mut pipeline = TranslatePipeline::new(options(vec![dir.path().to_path_buf()], false));
        let items = pipeline.items().unwrap();
        let names: Vec<_> = items.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(names, vec!["a.srt", "b.srt"]);

        // a.srt sits next to its backup: already translated.
        assert!(pipeline.is_complete(&items[0]));
        assert!(!pipeline.is_complete(&items[1]));
    }

    #[test]
    fn test_untranslated_file_is_not_complete() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("c.srt");
        fs::write(&srt, "1").unwrap();
        let mut pipeline = TranslatePipeline::new(options(vec![srt], false));
        let items = pipeline.items().unwrap();
        assert!(!pipeline.is_complete(&items[0]));
    }

    #[test]
    fn test_missing_api_key() {
        let mut opts = options(Vec::new(), false);
        opts.api_key = Some("  ".to_string());
        let mut pipeline = TranslatePipeline::new(opts);
        assert!(matches!(pipeline.items(), Err(CoreError::InvalidInput(_))));
    }
}
