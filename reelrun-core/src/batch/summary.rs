// ============================================================================
// reelrun-core/src/batch/summary.rs
// ============================================================================
//
// BATCH SUMMARY: Outcome Counts and Success Policy
//
// Counts per-item outcomes, keeps failure reasons with the tool's last
// output lines, and decides batch success under a `SuccessPolicy`.

use std::fmt;

use serde::Serialize;

use crate::config::SuccessPolicy;
use crate::runner::JobOutcome;

/// One failed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    pub identifier: String,
    pub reason: String,
    pub tail: Vec<String>,
}

/// Outcome counts of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    /// Identifier and reason of every skipped item
    pub skips: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self, identifier: &str, reason: &str) {
        self.skipped += 1;
        self.skips.push((identifier.to_string(), reason.to_string()));
    }

    pub fn record_failure(&mut self, index: usize, identifier: &str, reason: String, tail: Vec<String>) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            index,
            identifier: identifier.to_string(),
            reason,
            tail,
        });
    }

    /// Items that have reached a final state.
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// Items whose output is in place: freshly produced or already present.
    pub fn satisfied(&self) -> usize {
        self.succeeded + self.skipped
    }

    /// Whether the batch counts as successful. An empty batch never does.
    pub fn is_success(&self, policy: SuccessPolicy) -> bool {
        if self.total == 0 {
            return false;
        }
        match policy {
            SuccessPolicy::AnySucceeded => self.satisfied() > 0,
            SuccessPolicy::AllSucceeded => self.failed == 0 && self.satisfied() == self.total,
            SuccessPolicy::MinRatio(ratio) => {
                self.satisfied() as f64 / self.total as f64 >= ratio
            }
        }
    }

    /// Converts the summary into the job's terminal outcome. The tail of the
    /// last failure is attached.
    pub fn into_outcome(self, policy: SuccessPolicy) -> JobOutcome {
        let success = self.is_success(policy);
        let summary = self.to_string();
        let tail = self
            .failures
            .last()
            .map(|f| f.tail.clone())
            .unwrap_or_default();
        JobOutcome {
            success,
            summary,
            tail,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run / {} skipped / {} failed of {}",
            self.succeeded, self.skipped, self.failed, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(succeeded: usize, skipped: usize, failed: usize, total: usize) -> BatchSummary {
        BatchSummary {
            total,
            succeeded,
            skipped,
            failed,
            ..BatchSummary::default()
        }
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(summary(2, 3, 0, 5).to_string(), "2 run / 3 skipped / 0 failed of 5");
    }

    #[test]
    fn test_success_policies() {
        let all_skipped = summary(0, 4, 0, 4);
        assert!(all_skipped.is_success(SuccessPolicy::AnySucceeded));
        assert!(all_skipped.is_success(SuccessPolicy::AllSucceeded));

        let mixed = summary(1, 0, 3, 4);
        assert!(mixed.is_success(SuccessPolicy::AnySucceeded));
        assert!(!mixed.is_success(SuccessPolicy::AllSucceeded));
        assert!(!mixed.is_success(SuccessPolicy::MinRatio(0.5)));
        assert!(mixed.is_success(SuccessPolicy::MinRatio(0.25)));

        let all_failed = summary(0, 0, 2, 2);
        assert!(!all_failed.is_success(SuccessPolicy::AnySucceeded));
    }

    #[test]
    fn test_empty_batch_fails() {
        let empty = BatchSummary::new(0);
        assert!(!empty.is_success(SuccessPolicy::AnySucceeded));
        assert!(!empty.is_success(SuccessPolicy::MinRatio(0.0)));
    }

    #[test]
    fn test_outcome_carries_last_failure_tail() {
        let mut s = BatchSummary::new(2);
        s.record_success();
        s.record_failure(2, "ep2", "exit code 1".into(), vec!["boom".into()]);
        let outcome = s.into_outcome(SuccessPolicy::AnySucceeded);
        assert!(outcome.success);
        assert_eq!(outcome.summary, "1 run / 0 skipped / 1 failed of 2");
        assert_eq!(outcome.tail, vec!["boom".to_string()]);
    }
}
