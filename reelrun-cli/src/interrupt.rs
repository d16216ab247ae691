// ============================================================================
// reelrun-cli/src/interrupt.rs
// ============================================================================
//
// CTRL-C HANDLING: Terminal interrupts become job cancels
//
// Tools run in their own process groups, so a Ctrl-C from the terminal
// reaches only reelrun. The first SIGINT sets a flag that a watcher thread
// turns into `JobRunner::request_cancel`, which kills the running tool's
// group. The handler is installed with SA_RESETHAND: a second Ctrl-C
// terminates reelrun at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use reelrun_core::JobRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_interrupt(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Installs the one-shot SIGINT handler.
#[cfg(unix)]
pub fn install_handler() -> nix::Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESETHAND,
        SigSet::empty(),
    );
    // SAFETY: the handler only stores into an atomic.
    unsafe { sigaction(Signal::SIGINT, &action) }.map(|_| ())
}

#[cfg(not(unix))]
pub fn install_handler() -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no SIGINT handler on this platform",
    ))
}

/// Returns whether an interrupt arrived since the last call.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// Cancels the runner's job when Ctrl-C is pressed.
///
/// When the handler cannot be installed the default SIGINT behaviour stays
/// in place.
pub fn spawn_interrupt_watcher(runner: Arc<JobRunner>) {
    if let Err(e) = install_handler() {
        log::warn!("Ctrl-C will not cancel the job cleanly: {e}");
        return;
    }

    let spawned = thread::Builder::new()
        .name("reelrun-interrupt".to_string())
        .spawn(move || loop {
            thread::sleep(POLL_INTERVAL);
            if take_interrupt() {
                log::debug!("SIGINT received");
                if !runner.request_cancel() {
                    log::debug!("Interrupt with no job running");
                }
                break;
            }
        });
    if let Err(e) = spawned {
        log::warn!("Ctrl-C will not cancel the job cleanly: {e}");
    }
}
