// ============================================================================
// reelrun-cli/src/output.rs
// ============================================================================
//
// TERMINAL OUTPUT: Renders job events for a person at a terminal
//
// Log lines go to stderr with a timestamp and severity colors, progress
// drives the batch bar, and the terminal event prints the summary plus the
// tool output tail of a failure. Colors are dropped when NO_COLOR is set or
// stderr cannot show them.

use std::io::Write;

use console::style;
use owo_colors::OwoColorize;
use reelrun_core::{DoneEvent, Event, EventHandler, JobStatus, LogEvent, Severity};

use crate::progress::BatchProgressBar;

/// Whether stderr output should be colored.
pub fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none() && console::Term::stderr().features().colors_supported()
}

pub struct TerminalEventHandler {
    progress: BatchProgressBar,
    color: bool,
}

impl TerminalEventHandler {
    pub fn new() -> Self {
        Self {
            progress: BatchProgressBar::new(),
            color: colors_enabled(),
        }
    }

    fn print(&self, line: String) {
        self.progress.suspend(|| {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{line}");
        });
    }
}

impl Default for TerminalEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for TerminalEventHandler {
    fn handle(&self, event: &Event) {
        match event {
            Event::Log(line) => {
                let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
                self.print(format_log_line(&timestamp, line, self.color));
            }
            Event::Progress(progress) => self.progress.update(progress),
            Event::Done(done) => {
                self.progress.finish();
                for line in format_done(done, self.color) {
                    self.print(line);
                }
            }
        }
    }
}

pub fn format_log_line(timestamp: &str, line: &LogEvent, color: bool) -> String {
    if !color {
        return match line.severity {
            Severity::Info => format!("[{timestamp}] {}", line.text),
            Severity::Warning => format!("[{timestamp}] WARNING: {}", line.text),
            Severity::Error => format!("[{timestamp}] ERROR: {}", line.text),
        };
    }
    let stamp = style(format!("[{timestamp}]")).dim();
    match line.severity {
        Severity::Info => format!("{stamp} {}", line.text),
        Severity::Warning => format!("{stamp} {}", line.text.yellow()),
        Severity::Error => format!("{stamp} {}", line.text.red().bold()),
    }
}

/// Summary line followed by the indented tool output tail.
pub fn format_done(done: &DoneEvent, color: bool) -> Vec<String> {
    let label = match done.status {
        JobStatus::Done if done.success => "Finished",
        JobStatus::Cancelled => "Cancelled",
        _ => "Failed",
    };
    let headline = format!("{label}: {}", done.summary);
    let mut lines = Vec::with_capacity(done.tail.len() + 2);
    lines.push(if !color {
        headline
    } else if done.success {
        headline.green().bold().to_string()
    } else if done.status == JobStatus::Cancelled {
        headline.yellow().bold().to_string()
    } else {
        headline.red().bold().to_string()
    });

    if !done.tail.is_empty() {
        lines.push("Last tool output:".to_string());
        for raw in &done.tail {
            let raw = format!("  {raw}");
            lines.push(if color { style(raw).dim().to_string() } else { raw });
        }
    }
    lines
}
