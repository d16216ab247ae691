// ============================================================================
// reelrun-core/src/runner/cancel.rs
// ============================================================================
//
// CANCELLATION PRIMITIVES: Stop Flag and Live-Process Slot
//
// KEY COMPONENTS:
// - CancelToken: Shared stop flag checked by pipelines at safe points
// - ProcessSlot: Holds the job's single live child so the runner can kill it
// - JobControl: The pair, handed to spawners and pipelines
//
// At most one child is registered per job at any instant; items run strictly
// one after another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CoreError, CoreResult};
use crate::external::ToolProcess;

/// Cooperative stop flag shared between the runner and the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `UserCancelled` once the flag is set.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::UserCancelled)
        } else {
            Ok(())
        }
    }
}

/// The job's currently running child process, if any.
#[derive(Clone, Default)]
pub struct ProcessSlot {
    inner: Arc<Mutex<Option<Box<dyn ToolProcess>>>>,
}

impl std::fmt::Debug for ProcessSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

impl ProcessSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn ToolProcess>>> {
        // A panic while holding the lock leaves the slot usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a freshly spawned child. A child still registered from an
    /// earlier step is killed first.
    pub fn register(&self, process: Box<dyn ToolProcess>) {
        let mut slot = self.lock();
        if let Some(mut previous) = slot.take() {
            log::warn!("Replacing a still-registered child process");
            let _ = previous.kill();
        }
        *slot = Some(process);
    }

    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    /// Polls the registered child. Once it has exited it is deregistered
    /// and its exit code returned.
    ///
    /// An empty slot reports `Some(-1)`: the child was already reaped by the
    /// force-kill path.
    pub fn try_wait(&self) -> std::io::Result<Option<i32>> {
        let mut slot = self.lock();
        let Some(process) = slot.as_mut() else {
            return Ok(Some(-1));
        };
        let status = process.try_wait()?;
        if status.is_some() {
            *slot = None;
        }
        Ok(status)
    }

    /// Kills and deregisters the child. Returns whether one was registered.
    pub fn kill(&self) -> bool {
        let mut slot = self.lock();
        match slot.take() {
            Some(mut process) => {
                if let Err(e) = process.kill() {
                    log::debug!("Kill of child process returned: {e}");
                }
                true
            }
            None => false,
        }
    }
}

/// Cancellation handles of one job.
#[derive(Debug, Clone, Default)]
pub struct JobControl {
    pub cancel: CancelToken,
    pub slot: ProcessSlot,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicUsize;

    struct FakeProcess {
        exit: Option<i32>,
        kills: Arc<AtomicUsize>,
    }

    impl ToolProcess for FakeProcess {
        fn try_wait(&mut self) -> io::Result<Option<i32>> {
            Ok(self.exit)
        }

        fn kill(&mut self) -> io::Result<()> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(CoreError::UserCancelled)));
    }

    #[test]
    fn test_slot_kill_deregisters() {
        let kills = Arc::new(AtomicUsize::new(0));
        let slot = ProcessSlot::new();
        slot.register(Box::new(FakeProcess {
            exit: None,
            kills: kills.clone(),
        }));
        assert!(slot.is_occupied());
        assert_eq!(slot.try_wait().unwrap(), None);

        assert!(slot.kill());
        assert!(!slot.kill());
        assert_eq!(kills.load(Ordering::SeqCst), 1);
        assert_eq!(slot.try_wait().unwrap(), Some(-1));
    }

    #[test]
    fn test_slot_reaps_exited_child() {
        let slot = ProcessSlot::new();
        slot.register(Box::new(FakeProcess {
            exit: Some(0),
            kills: Arc::new(AtomicUsize::new(0)),
        }));
        assert_eq!(slot.try_wait().unwrap(), Some(0));
        assert!(!slot.is_occupied());
    }
}
