// ============================================================================
// reelrun-core/src/parsing/timecode.rs
// ============================================================================
//
// TIMECODE PROGRESS: Transcoder `time=` / `speed=` Status Lines
//
// Status lines look like
//   frame= 1234 fps= 48 q=28.0 size=  10240kB time=00:00:51.20 bitrate=... speed=2.01x
// Progress is elapsed media time over the probed duration; the ETA divides
// the remaining media time by the reported speed multiplier.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ItemProgress, ParsedLine};
use crate::utils::{format_duration, format_eta, parse_timecode, ETA_INDETERMINATE};

static TIME_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btime=\s*(\S+)").expect("Invalid time regex"));
static SPEED_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bspeed=\s*([0-9.]+)x").expect("Invalid speed regex"));

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)?.get(1).map(|m| m.as_str())
}

/// Parser for the transcoder's periodic status line.
#[derive(Debug, Clone, PartialEq)]
pub struct TimecodeParser {
    /// Total media duration in seconds, from the out-of-band probe
    duration: Option<f64>,
}

impl TimecodeParser {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration: duration.filter(|d| d.is_finite() && *d > 0.0),
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn parse(&mut self, line: &str) -> Option<ParsedLine> {
        let elapsed = parse_timecode(capture(&TIME_FIELD, line)?)?;
        let speed = capture(&SPEED_FIELD, line).and_then(|s| s.parse::<f64>().ok());

        let speed_label = match speed {
            Some(s) => format!("{s:.2}x"),
            None => "?x".to_string(),
        };

        let progress = match self.duration {
            Some(total) => {
                let fraction = (elapsed / total).clamp(0.0, 1.0);
                let eta = eta_label(total, elapsed, speed);
                ItemProgress {
                    fraction: Some(fraction),
                    label: format!(
                        "{:.1}% | {} / {} | speed {speed_label} | ETA {eta}",
                        fraction * 100.0,
                        format_duration(elapsed),
                        format_duration(total),
                    ),
                }
            }
            None => ItemProgress {
                fraction: None,
                label: format!("{} | speed {speed_label}", format_duration(elapsed)),
            },
        };
        Some(ParsedLine::Progress(progress))
    }
}

/// Remaining wall-clock time, or the indeterminate label when the speed is
/// missing or not positive.
pub fn eta_label(total: f64, elapsed: f64, speed: Option<f64>) -> String {
    match speed {
        Some(s) if s > 0.0 && s.is_finite() => format_eta(((total - elapsed).max(0.0)) / s),
        _ => ETA_INDETERMINATE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(parsed: Option<ParsedLine>) -> ItemProgress {
        match parsed {
            Some(ParsedLine::Progress(p)) => p,
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[test]
    fn test_fraction_and_eta() {
        let mut parser = TimecodeParser::new(Some(600.0));
        let p = progress(parser.parse(
            "frame= 2250 fps= 50 q=28.0 size=   10240kB time=00:01:30.00 bitrate=932.1kbits/s speed=2.00x",
        ));
        assert_eq!(p.fraction, Some(0.15));
        assert!(p.label.contains("15.0%"), "{}", p.label);
        assert!(p.label.contains("ETA 4m 15s"), "{}", p.label);
    }

    #[test]
    fn test_fraction_clamped() {
        let mut parser = TimecodeParser::new(Some(60.0));
        let p = progress(parser.parse("time=00:01:05.00 speed=1.0x"));
        assert_eq!(p.fraction, Some(1.0));
    }

    #[test]
    fn test_zero_or_missing_speed_is_indeterminate_eta() {
        let mut parser = TimecodeParser::new(Some(100.0));
        let p = progress(parser.parse("time=00:00:10.00 speed=0x"));
        assert!(p.label.ends_with(ETA_INDETERMINATE));
        let p = progress(parser.parse("time=00:00:10.00 speed=N/A"));
        assert!(p.label.ends_with(ETA_INDETERMINATE));
    }

    #[test]
    fn test_unknown_duration_is_indeterminate() {
        let mut parser = TimecodeParser::new(None);
        let p = progress(parser.parse("time=00:00:10.00 speed=1.5x"));
        assert_eq!(p.fraction, None);
        assert_eq!(p.label, "00:00:10 | speed 1.50x");
    }

    #[test]
    fn test_non_status_lines_are_dropped() {
        let mut parser = TimecodeParser::new(Some(100.0));
        assert_eq!(parser.parse("Input #0, matroska,webm, from 'a.mkv':"), None);
        assert_eq!(parser.parse("time=N/A bitrate=N/A speed=N/A"), None);
    }

    #[test]
    fn test_eta_label() {
        assert_eq!(eta_label(3700.0, 100.0, Some(1.0)), "1h 0m 0s");
        assert_eq!(eta_label(100.0, 40.0, Some(-1.0)), ETA_INDETERMINATE);
        assert_eq!(eta_label(100.0, 40.0, None), ETA_INDETERMINATE);
    }
}
