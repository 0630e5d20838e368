// ABOUTME: Shared interrupt flag set by the Ctrl-C listener
// Polled between walk iterations and relay polls so cancellation is observed promptly

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// What the signal listener should do with a Ctrl-C press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// The running phase polls the token and will wind down on its own
    Cancel,
    /// Nothing will observe the token in time; leave the process now
    Exit,
}

/// Cloneable handle to a single cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    presses: Arc<AtomicUsize>,
    watched: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session as interrupted. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Declare whether the current phase checks the token.
    pub fn set_watched(&self, watched: bool) {
        self.watched.store(watched, Ordering::SeqCst);
    }

    /// Record one Ctrl-C press. The first press during a watched phase only
    /// cancels; a repeated press or an unwatched phase asks for an exit.
    pub fn interrupt(&self) -> InterruptAction {
        self.cancel();
        let presses = self.presses.fetch_add(1, Ordering::SeqCst) + 1;
        if presses > 1 || !self.watched.load(Ordering::SeqCst) {
            InterruptAction::Exit
        } else {
            InterruptAction::Cancel
        }
    }
}
