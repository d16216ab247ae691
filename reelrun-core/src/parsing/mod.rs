// ============================================================================
// reelrun-core/src/parsing/mod.rs
// ============================================================================
//
// PROGRESS PARSERS: Raw Tool Output -> Progress and Log Events
//
// Every external tool has its own output convention. `LineParser` is a
// tagged enum with one variant per convention, selected by `ToolKind`.
// Each raw line goes through the shared pre-pass in `noise` first:
// control sequences are stripped, empty lines dropped, and lines that
// mention a failure are surfaced before any family-specific suppression.
//
// KEY COMPONENTS:
// - LineParser: The per-tool strategy
// - ParsedLine: Progress(ItemProgress) or Log(LogEvent)
// - timecode / fraction / download: The family-specific parsers
//
// A line that matches nothing is dropped (`None`); it is never an error.

pub mod download;
pub mod fraction;
pub mod noise;
pub mod timecode;

pub use download::DownloadFilter;
pub use fraction::FractionParser;
pub use timecode::TimecodeParser;

use crate::events::LogEvent;
use crate::external::ToolKind;

/// Progress of the active item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProgress {
    /// Completion in [0, 1]; `None` when indeterminate
    pub fraction: Option<f64>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Progress(ItemProgress),
    Log(LogEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineParser {
    /// Transcoder `time=`/`speed=` status lines
    Timecode(TimecodeParser),
    /// Translator "P% (current/total)" status bar
    Fraction(FractionParser),
    /// Downloader milestone filter
    Download(DownloadFilter),
    /// Subtitle extraction: stream listing only
    StreamInfo,
    /// Every line is an info log
    Passthrough,
}

impl LineParser {
    /// Default parser for a tool. Transcoder progress starts indeterminate;
    /// use [`LineParser::timecode`] when the duration is known.
    pub fn for_kind(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Transcoder => LineParser::Timecode(TimecodeParser::new(None)),
            ToolKind::SubtitleExtractor => LineParser::StreamInfo,
            ToolKind::Translator => LineParser::Fraction(FractionParser::new()),
            ToolKind::Downloader => LineParser::Download(DownloadFilter),
            ToolKind::Probe | ToolKind::Transcriber => LineParser::Passthrough,
        }
    }

    pub fn timecode(duration: Option<f64>) -> Self {
        LineParser::Timecode(TimecodeParser::new(duration))
    }

    pub fn parse(&mut self, raw: &str) -> Option<ParsedLine> {
        let line = noise::strip_control_sequences(raw)?;

        if let Some(severity) = noise::priority_severity(&line) {
            return Some(ParsedLine::Log(LogEvent::new(line, severity)));
        }

        match self {
            LineParser::Timecode(parser) => parser.parse(&line),
            LineParser::Fraction(parser) => parser.parse(&line),
            LineParser::Download(filter) => filter.parse(&line),
            LineParser::StreamInfo => {
                if line.contains("Stream #") || line.contains("Subtitle:") {
                    Some(ParsedLine::Log(LogEvent::info(line)))
                } else {
                    None
                }
            }
            LineParser::Passthrough => Some(ParsedLine::Log(LogEvent::info(line))),
        }
    }
}
