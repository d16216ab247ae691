// ============================================================================
// reelrun-cli/src/progress.rs
// ============================================================================
//
// PROGRESS BAR: Batch progress bar on stderr

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reelrun_core::ProgressEvent;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// One bar for the whole batch, hidden when stderr is not a terminal.
pub struct BatchProgressBar {
    bar: ProgressBar,
}

impl BatchProgressBar {
    pub fn new() -> Self {
        if !std::io::stderr().is_terminal() {
            return Self::hidden();
        }
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, event: &ProgressEvent) {
        if let Some(percent) = event.percent {
            self.bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
        }
        self.bar.set_message(bar_message(event));
        self.bar.tick();
    }

    /// Runs `f` with the bar cleared, so printed lines do not tear it.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for BatchProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

/// `[2/5] label`, with the item's own percentage when known.
pub fn bar_message(event: &ProgressEvent) -> String {
    match event.item_percent {
        Some(item) => format!(
            "[{}/{}] {} ({item:.0}%)",
            event.item_index, event.item_total, event.label
        ),
        None => format!("[{}/{}] {}", event.item_index, event.item_total, event.label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(percent: Option<f64>, item_percent: Option<f64>) -> ProgressEvent {
        ProgressEvent {
            item_index: 2,
            item_total: 4,
            percent,
            item_percent,
            label: "ep2.mkv".to_string(),
        }
    }

    #[test]
    fn test_bar_message() {
        assert_eq!(bar_message(&event(Some(30.0), Some(20.4))), "[2/4] ep2.mkv (20%)");
        assert_eq!(bar_message(&event(Some(25.0), None)), "[2/4] ep2.mkv");
    }

    #[test]
    fn test_hidden_bar_tracks_position() {
        let bar = BatchProgressBar::hidden();
        bar.update(&event(Some(62.6), None));
        assert_eq!(bar.position(), 63);
        bar.update(&event(None, None));
        assert_eq!(bar.position(), 63);
        bar.update(&event(Some(140.0), None));
        assert_eq!(bar.position(), 100);
    }
}
