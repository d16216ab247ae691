// ============================================================================
// reelrun-core/src/utils.rs
// ============================================================================
//
// UTILITIES: Time Formatting, Timecodes and Paths
//
// These helpers are shared by the progress parsers, the pipelines and the
// CLI. They never panic on malformed input.

use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// Label used when an ETA cannot be computed (unknown duration or zero speed).
pub const ETA_INDETERMINATE: &str = "Calculating...";

/// Formats seconds as HH:MM:SS (e.g., 3725.0 -> "01:02:05"). Returns "??:??:??" for invalid inputs.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "??:??:??".to_string();
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Formats a remaining time as "Nh Nm Ns", "Nm Ns" or "Ns" depending on magnitude.
///
/// Negative or non-finite input yields [`ETA_INDETERMINATE`].
#[must_use]
pub fn format_eta(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return ETA_INDETERMINATE.to_string();
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Parses a tool timecode to seconds.
///
/// Accepts `HH:MM:SS.ss`, `MM:SS.ss` and bare seconds. Returns `None` for
/// anything else, including negative or non-finite components.
#[must_use]
pub fn parse_timecode(time: &str) -> Option<f64> {
    let time = time.trim();
    if time.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    for part in &parts {
        if part.starts_with('-') {
            return None;
        }
        let value = part.parse::<f64>().ok()?;
        if !value.is_finite() {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// Safely extracts filename from a path with consistent error handling.
pub fn get_filename_safe(path: &Path) -> CoreResult<String> {
    Ok(path
        .file_name()
        .ok_or_else(|| CoreError::PathError(format!("Failed to get filename for {}", path.display())))?
        .to_string_lossy()
        .to_string())
}

/// Extracts the file stem, failing for paths without one.
pub fn get_stem_safe(path: &Path) -> CoreResult<String> {
    Ok(path
        .file_stem()
        .ok_or_else(|| {
            CoreError::PathError(format!("Failed to get filename stem for {}", path.display()))
        })?
        .to_string_lossy()
        .to_string())
}

/// Case-insensitive extension check against a list of accepted extensions.
#[must_use]
pub fn has_extension(path: &Path, accepted: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| accepted.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// True when `path` is an existing regular file with at least one byte.
#[must_use]
pub fn is_nonempty_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Quotes a value for inclusion in a POSIX shell command line.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(59.9), "00:00:59");
        assert_eq!(format_duration(3661.0), "01:01:01");
        assert_eq!(format_duration(90061.0), "25:01:01");
        assert_eq!(format_duration(-1.0), "??:??:??");
        assert_eq!(format_duration(f64::NAN), "??:??:??");
    }

    #[test]
    fn test_format_eta_by_magnitude() {
        assert_eq!(format_eta(0.0), "0s");
        assert_eq!(format_eta(42.7), "42s");
        assert_eq!(format_eta(90.0), "1m 30s");
        assert_eq!(format_eta(3600.0), "1h 0m 0s");
        assert_eq!(format_eta(3723.0), "1h 2m 3s");
        assert_eq!(format_eta(-5.0), ETA_INDETERMINATE);
        assert_eq!(format_eta(f64::INFINITY), ETA_INDETERMINATE);
    }

    #[test]
    fn test_parse_timecode() {
        assert_eq!(parse_timecode("00:01:30.50"), Some(90.5));
        assert_eq!(parse_timecode("01:00:00.00"), Some(3600.0));
        assert_eq!(parse_timecode("01:30:45.75"), Some(5445.75));
        assert_eq!(parse_timecode("02:05.5"), Some(125.5));
        assert_eq!(parse_timecode("12.25"), Some(12.25));
        assert_eq!(parse_timecode(" 00:00:01 "), Some(1.0));

        assert_eq!(parse_timecode(""), None);
        assert_eq!(parse_timecode("N/A"), None);
        assert_eq!(parse_timecode("aa:bb:cc"), None);
        assert_eq!(parse_timecode("00:00:00:00"), None);
        assert_eq!(parse_timecode("00::01"), None);
        assert_eq!(parse_timecode("-00:00:01"), None);
    }

    #[test]
    fn test_get_filename_and_stem() {
        assert_eq!(get_filename_safe(Path::new("/path/to/file.mkv")).unwrap(), "file.mkv");
        assert_eq!(get_stem_safe(Path::new("/path/to/file.mkv")).unwrap(), "file");
        assert!(get_filename_safe(Path::new("/")).is_err());
        assert!(get_stem_safe(Path::new("")).is_err());
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a.MKV"), &["mkv"]));
        assert!(has_extension(Path::new("a.mov"), &["mkv", "mp4", "mov"]));
        assert!(!has_extension(Path::new("a.srt"), &["mkv"]));
        assert!(!has_extension(Path::new("noext"), &["mkv"]));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/out"), "/tmp/out");
        assert_eq!(shell_quote("my dir"), "'my dir'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
