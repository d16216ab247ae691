// ============================================================================
// reelrun-core/src/pipelines/download.rs
// ============================================================================
//
// DOWNLOAD: Segmented-Stream Downloads
//
// The input is pasted downloader command lines, one per episode. Each line
// is kept as the user wrote it (headers, keys, quoting) and run through
// `sh -c`; only the save options are appended.

use std::path::PathBuf;

use crate::batch::{BatchContext, BatchItem, ItemPipeline, Preparation, PreparedStep};
use crate::error::{CoreError, CoreResult};
use crate::external::{resolve_program, ToolInvocation, ToolKind};
use crate::parsing::LineParser;
use crate::range::resolve_identifiers;
use crate::utils::shell_quote;

use super::ensure_dir;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Pasted command lines
    pub commands: String,
    /// Episode range assigned to the lines, e.g. "1-3,5"
    pub episodes: String,
    pub output_dir: PathBuf,
}

/// File names under which the downloader may appear at the start of a
/// pasted command.
const DOWNLOADER_NAMES: &[&str] = &["n_m3u8dl-re", "n_m3u8dl-re.exe"];

fn strip_program(line: &str) -> &str {
    match line.split_once(char::is_whitespace) {
        Some((first, rest)) if DOWNLOADER_NAMES.contains(&first.to_ascii_lowercase().as_str()) => {
            rest.trim()
        }
        _ => line,
    }
}

/// Non-empty lines that are neither comments (`#`) nor HAR references
/// (`@`), with a leading downloader program name removed.
pub fn command_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('@'))
        .map(strip_program)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scheme and host of `url`, e.g. `https://cdn.example.com`.
fn url_origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next().filter(|h| !h.is_empty())?;
    Some(format!("{scheme}://{host}"))
}

/// A line that is only a URL gets the browser headers most CDNs require.
/// Returns `None` for anything else.
pub fn headers_for_bare_url(line: &str) -> Option<String> {
    if line.contains(" -H ") || line.contains(" --key ") {
        return None;
    }
    let url = line.trim().trim_matches('"');
    if !url.starts_with("http") || url.contains(char::is_whitespace) {
        return None;
    }
    let origin = url_origin(url)?;
    let headers = [
        format!("User-Agent: {BROWSER_USER_AGENT}"),
        format!("Referer: {origin}/"),
        "Accept: */*".to_string(),
        format!("Origin: {origin}"),
    ];
    let mut command: Vec<String> = headers
        .iter()
        .map(|h| format!("-H {}", shell_quote(h)))
        .collect();
    command.push(shell_quote(url));
    Some(command.join(" "))
}

pub struct DownloadPipeline {
    options: DownloadOptions,
    lines: Vec<String>,
}

impl DownloadPipeline {
    pub fn new(options: DownloadOptions) -> Self {
        Self {
            options,
            lines: Vec::new(),
        }
    }

    fn shell_command(&self, downloader: &str, line: &str, item: &BatchItem, tmp_dir: &str) -> String {
        let save_dir = self.options.output_dir.to_string_lossy();
        format!(
            "exec {} {line} --tmp-dir {} --del-after-done --check-segments-count False \
             --save-name {} --save-dir {} --select-video best --select-audio all \
             --select-subtitle all -M mkv",
            shell_quote(downloader),
            shell_quote(tmp_dir),
            shell_quote(&item.identifier),
            shell_quote(&save_dir),
        )
    }
}

impl ItemPipeline for DownloadPipeline {
    fn name(&self) -> &str {
        "download"
    }

    fn tool_kind(&self) -> ToolKind {
        ToolKind::Downloader
    }

    fn items(&mut self) -> CoreResult<Vec<BatchItem>> {
        self.lines = command_lines(&self.options.commands);
        if self.lines.is_empty() {
            return Err(CoreError::InvalidInput("No download commands provided".to_string()));
        }

        let ids = resolve_identifiers(&self.options.episodes, self.lines.len());
        let preview: Vec<String> = ids.iter().take(10).map(u32::to_string).collect();
        log::info!(
            "Episode numbers: {}{}",
            preview.join(", "),
            if ids.len() > 10 { " ..." } else { "" }
        );

        Ok(ids
            .into_iter()
            .map(|id| {
                let output = self.options.output_dir.join(format!("{id}.mkv"));
                BatchItem::new(id.to_string(), output)
            })
            .collect())
    }

    fn prepare(&mut self, item: &BatchItem, ctx: &BatchContext<'_>) -> CoreResult<Preparation> {
        let line = self
            .lines
            .get(item.index.saturating_sub(1))
            .cloned()
            .ok_or_else(|| CoreError::InvalidInput(format!("no command for episode {}", item.identifier)))?;

        let downloader = resolve_program(&ctx.config.tools.downloader)?;
        ensure_dir(&self.options.output_dir)?;

        let line = match headers_for_bare_url(&line) {
            Some(with_headers) => {
                ctx.sink.info("  (Bare URL detected, added Referer/Origin headers)");
                with_headers
            }
            None => line,
        };

        let preview: String = line.chars().take(80).collect();
        ctx.sink.info(format!("--- Episode {} ---", item.identifier));
        ctx.sink.info(format!("Running: {preview}..."));

        let tmp_dir = ctx.config.temp_base();
        let command = self.shell_command(
            &downloader.to_string_lossy(),
            &line,
            item,
            &tmp_dir.to_string_lossy(),
        );
        let invocation = ToolInvocation::new("sh")
            .args(["-c", command.as_str()])
            .display_name(&ctx.config.tools.downloader);

        Ok(Preparation::Run(PreparedStep::new(
            invocation,
            LineParser::for_kind(ToolKind::Downloader),
            Some(item.output_path.clone()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines_filtering() {
        let text = "\n# comment\n@cookies.har\nN_m3u8DL-RE \"https://a/b.m3u8\" -H 'X: y'\nhttps://c/d.mpd\n";
        let lines = command_lines(text);
        assert_eq!(lines, vec!["\"https://a/b.m3u8\" -H 'X: y'", "https://c/d.mpd"]);
    }

    #[test]
    fn test_bare_url_gets_headers() {
        let command = headers_for_bare_url("\"https://cdn.example.com/path/master.m3u8?x=1&y=2\"").unwrap();
        assert!(command.contains("-H 'Referer: https://cdn.example.com/'"));
        assert!(command.contains("-H 'Origin: https://cdn.example.com'"));
        assert!(command.contains("-H 'Accept: */*'"));
        assert!(command.ends_with("'https://cdn.example.com/path/master.m3u8?x=1&y=2'"));
    }

    #[test]
    fn test_lines_with_headers_left_alone() {
        assert_eq!(headers_for_bare_url("https://a/b.m3u8 -H 'Cookie: c'"), None);
        assert_eq!(headers_for_bare_url("https://a/b.mpd --key 1:2"), None);
        assert_eq!(headers_for_bare_url("--help"), None);
    }

    #[test]
    fn test_items_assign_episode_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = DownloadPipeline::new(DownloadOptions {
            commands: "https://a/1.m3u8\nhttps://a/2.m3u8\nhttps://a/3.m3u8".to_string(),
            episodes: "5".to_string(),
            output_dir: dir.path().to_path_buf(),
        });
        let items = pipeline.items().unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["5", "6", "7"]);
        assert_eq!(items[0].output_path, dir.path().join("5.mkv"));
    }

    #[test]
    fn test_empty_commands_rejected() {
        let mut pipeline = DownloadPipeline::new(DownloadOptions {
            commands: "# nothing\n\n".to_string(),
            episodes: "1".to_string(),
            output_dir: PathBuf::from("/tmp"),
        });
        assert!(matches!(pipeline.items(), Err(CoreError::InvalidInput(_))));
    }
}
