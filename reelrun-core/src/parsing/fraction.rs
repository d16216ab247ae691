// ============================================================================
// reelrun-core/src/parsing/fraction.rs
// ============================================================================
//
// FRACTION PROGRESS: Translator Percent Status Bar
//
// The translator redraws a status bar of the form
// `Translating: |████░░░░| 50% (10/20) gemini-2.5-flash | Thinking` and
// prints a handful of chatter lines around it. Progress lines are condensed
// to `Progress: 50% (10/20 lines) - Thinking...`, chatter is dropped, and an
// identical consecutive rendering is not emitted twice.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ItemProgress, ParsedLine};
use crate::events::LogEvent;

static PROGRESS_BAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Translating:.*?(\d+)% \((\d+)/(\d+)\)").expect("Invalid progress regex")
});
static MODEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"gemini-\S+").expect("Invalid model regex"));
static STARTING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Starting translation of (\d+) lines").expect("Invalid start regex")
});

/// Lines that carry no information for the user.
fn is_chatter(line: &str) -> bool {
    line.contains("Validating token size...")
        || line.contains("Token size validated. Translating...")
        || (line.contains("Starting with") && line.contains("API Key"))
}

/// Free-text status after the last `|`, with the model name removed and
/// spinner words normalized.
fn clean_status(line: &str) -> Option<String> {
    let last = line.rsplit('|').next()?.trim();
    let last = MODEL_NAME.replace_all(last, "");
    let last = last.trim();

    for spinner in ["Thinking", "Processing"] {
        if last.starts_with(spinner) {
            return Some(format!("{spinner}..."));
        }
    }
    if last.is_empty() || last == "Sending batch" {
        return None;
    }
    Some(last.to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FractionParser {
    last_rendered: Option<String>,
}

impl FractionParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(line: &str) -> Option<ParsedLine> {
        if is_chatter(line) {
            return None;
        }

        if let Some(caps) = STARTING.captures(line) {
            return Some(ParsedLine::Log(LogEvent::info(format!(
                "Starting translation of {} lines...",
                &caps[1]
            ))));
        }

        if line.contains('|') {
            if let Some(caps) = PROGRESS_BAR.captures(line) {
                let percent: f64 = caps[1].parse().ok()?;
                let label = match clean_status(line) {
                    Some(status) => {
                        format!("Progress: {}% ({}/{} lines) - {status}", &caps[1], &caps[2], &caps[3])
                    }
                    None => format!("Progress: {}% ({}/{} lines)", &caps[1], &caps[2], &caps[3]),
                };
                return Some(ParsedLine::Progress(ItemProgress {
                    fraction: Some((percent / 100.0).clamp(0.0, 1.0)),
                    label,
                }));
            }
        }

        if line.contains('✅') || line.contains("Translation completed successfully") {
            return Some(ParsedLine::Log(LogEvent::info(
                "✓ Translation completed successfully!",
            )));
        }

        Some(ParsedLine::Log(LogEvent::info(line)))
    }

    pub fn parse(&mut self, line: &str) -> Option<ParsedLine> {
        let parsed = Self::render(line)?;
        let rendered = match &parsed {
            ParsedLine::Progress(p) => p.label.as_str(),
            ParsedLine::Log(l) => l.text.as_str(),
        };
        if self.last_rendered.as_deref() == Some(rendered) {
            return None;
        }
        self.last_rendered = Some(rendered.to_string());
        Some(parsed)
    }
}
