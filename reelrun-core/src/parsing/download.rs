// ============================================================================
// reelrun-core/src/parsing/download.rs
// ============================================================================
//
// DOWNLOADER OUTPUT: Log Filter for the Segmented-Stream Downloader
//
// The downloader redraws one progress bar per selected stream and mixes
// them on a single output, so its percentages are not used for progress.
// Only status lines and milestones are kept.

use super::ParsedLine;
use crate::events::LogEvent;

/// Progress-bar glyph; bar redraws are dropped.
const PROGRESS_BAR_GLYPH: char = '━';

const MILESTONES: &[&str] = &[
    "INFO",
    "WARN",
    "ERROR",
    "Selected streams",
    "Start downloading",
    "Downloaded",
    "Muxing",
    "Done",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadFilter;

impl DownloadFilter {
    pub fn parse(&mut self, line: &str) -> Option<ParsedLine> {
        if line.contains(PROGRESS_BAR_GLYPH) {
            return None;
        }
        if MILESTONES.iter().any(|m| line.contains(m)) {
            return Some(ParsedLine::Log(LogEvent::info(line)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_milestones_only() {
        let mut filter = DownloadFilter;
        assert!(filter.parse("12:00:01.123 INFO : Loading URL").is_some());
        assert!(filter.parse("Selected streams:").is_some());
        assert!(filter.parse("Muxing to 3.mkv").is_some());
        assert_eq!(filter.parse("Vid 1920x1080 ━━━━━━━━ 45/120 37.50%"), None);
        assert_eq!(filter.parse("random chatter"), None);
    }
}
