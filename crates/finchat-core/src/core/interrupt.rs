//! Signal handling for graceful interruption.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Initializes the Ctrl+C handler.
///
/// The handler sets an interrupt flag only; it does not print anything.
/// The caller that owns stdout is responsible for the interruption message.
///
/// # Panics
/// Panics if registering the Ctrl+C handler fails.
pub fn init() {
    ctrlc::set_handler(move || {
        trigger_ctrl_c();
    })
    .expect("Error setting Ctrl+C handler");
}

fn notify_waiters() {
    INTERRUPT_NOTIFY.get_or_init(Notify::new).notify_waiters();
}

/// Triggers an interrupt, force-exiting on a second Ctrl+C.
pub fn trigger_ctrl_c() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // Second interrupt - force exit.
        std::process::exit(130);
    }
    notify_waiters();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        if is_interrupted() {
            return;
        }
        INTERRUPT_NOTIFY.get_or_init(Notify::new).notified().await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
