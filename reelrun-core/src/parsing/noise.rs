// ============================================================================
// reelrun-core/src/parsing/noise.rs
// ============================================================================
//
// NOISE FILTER: Shared Pre-Pass for Every Output Parser
//
// Strips control sequences and applies the error-priority override.
//
// A line that mentions a failure is always surfaced, whatever family the
// tool belongs to and whatever suppression rule would otherwise drop it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::events::Severity;

/// Cursor movement and SGR sequences that survive a partial strip.
static BARE_CSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("Invalid CSI regex"));

/// Keywords and glyphs that mark a line as a warning.
const WARNING_MARKERS: &[&str] = &["warning", "warn", "⚠"];

/// Keywords and glyphs that mark a line as an error.
const ERROR_MARKERS: &[&str] = &[
    "error",
    "failed",
    "fail",
    "exception",
    "timeout",
    "denied",
    "missing",
    "invalid",
    "cannot",
    "unable",
    "not found",
    "critical",
    "fatal",
    "✗",
    "❌",
];

/// Known tool messages that contain an error keyword but are harmless.
/// They are still surfaced, as warnings.
const BENIGN_MESSAGES: &[&str] = &[
    "deprecated pixel format",
    "No accelerated colorspace conversion",
    "Stream map",
    "automatically inserted filter",
    "Timestamps are unset",
    "does not match the corresponding codec",
    "Queue input is backward",
    "first frame is no keyframe",
    "The process cannot access the file",
];

/// Removes ANSI/VT control sequences and surrounding whitespace.
///
/// Returns `None` when nothing printable is left.
pub fn strip_control_sequences(line: &str) -> Option<String> {
    let mut cleaned = strip_ansi_escapes::strip_str(line);
    if cleaned.contains('\x1b') {
        cleaned = cleaned.replace("\x1b[F", "").replace("\x1b[K", "");
        cleaned = BARE_CSI.replace_all(&cleaned, "").into_owned();
    }

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_benign(line: &str) -> bool {
    if BENIGN_MESSAGES.iter().any(|m| line.contains(m)) {
        return true;
    }
    // Packet errors from the (e)ac3 decoder are recovered by the encoder.
    line.contains("Error submitting packet to decoder")
        && (line.contains("/eac3 @") || line.contains("/ac3 @"))
}

/// Severity forced by the error-priority rule, or `None` for ordinary lines.
pub fn priority_severity(line: &str) -> Option<Severity> {
    let lower = line.to_lowercase();
    if ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(if is_benign(line) {
            Severity::Warning
        } else {
            Severity::Error
        });
    }
    if WARNING_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(Severity::Warning);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_control_sequences() {
        assert_eq!(
            strip_control_sequences("\x1b[32mDone\x1b[0m  ").as_deref(),
            Some("Done")
        );
        assert_eq!(
            strip_control_sequences("\x1b[F\x1b[KTranslating").as_deref(),
            Some("Translating")
        );
        assert_eq!(strip_control_sequences("\x1b[F\x1b[K"), None);
        assert_eq!(strip_control_sequences("   "), None);
    }

    #[test]
    fn test_error_keywords_win() {
        assert_eq!(priority_severity("Conversion failed!"), Some(Severity::Error));
        assert_eq!(priority_severity("❌ quota exhausted"), Some(Severity::Error));
        assert_eq!(
            priority_severity("Validating token size... FAILED"),
            Some(Severity::Error)
        );
        assert_eq!(priority_severity("file not found"), Some(Severity::Error));
    }

    #[test]
    fn test_warning_keywords() {
        assert_eq!(priority_severity("WARN: slow segment"), Some(Severity::Warning));
        assert_eq!(priority_severity("⚠ retrying"), Some(Severity::Warning));
        assert_eq!(priority_severity("frame= 10 fps=25 time=00:00:01.00"), None);
    }

    #[test]
    fn test_benign_messages_downgraded() {
        let line = "[aac @ 0x55] Error submitting packet to decoder: /eac3 @ 0x1";
        assert_eq!(priority_severity(line), Some(Severity::Warning));
        let line = "[swscaler @ 0x1] deprecated pixel format used, make sure you did set range correctly (error)";
        assert_eq!(priority_severity(line), Some(Severity::Warning));
        let line = "[h264 @ 0x1] Error submitting packet to decoder";
        assert_eq!(priority_severity(line), Some(Severity::Error));
    }
}
