// ============================================================================
// reelrun-core/src/batch/progress.rs
// ============================================================================
//
// COMBINED PROGRESS: One Percentage for the Whole Batch
//
// Folds the active item's fraction into a whole-batch percentage:
// `100 * ((item_index - 1) / N + fraction / N)`. The tracker never reports
// a value below one it already reported, so a glitching sub-percent from a
// tool cannot make the batch bar move backwards.

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedProgress {
    total: usize,
    max_seen: f64,
}

impl CombinedProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            max_seen: 0.0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Highest percentage reported so far.
    pub fn percent(&self) -> f64 {
        self.max_seen
    }

    /// Records `fraction` (clamped to [0, 1]; NaN counts as 0) for the
    /// 1-based `item_index` and returns the combined percentage.
    pub fn update(&mut self, item_index: usize, fraction: f64) -> f64 {
        if self.total == 0 {
            return self.max_seen;
        }
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let index = item_index.clamp(1, self.total);

        let raw = if index == self.total && fraction >= 1.0 {
            100.0
        } else {
            (100.0 * ((index - 1) as f64 + fraction) / self.total as f64).min(100.0)
        };
        if raw > self.max_seen {
            self.max_seen = raw;
        }
        self.max_seen
    }

    /// Marks an item finished (run, skipped or failed).
    pub fn complete_item(&mut self, item_index: usize) -> f64 {
        self.update(item_index, 1.0)
    }
}
