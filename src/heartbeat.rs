//! Keep-alive beat for a logged-in session.
//!
//! The beat thread only reads the liveness flag. It never sees the transcript.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared "still logged in" flag
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new(alive: bool) -> Self {
        Self(Arc::new(AtomicBool::new(alive)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, alive: bool) {
        self.0.store(alive, Ordering::Release);
    }
}

pub struct Heartbeat {
    handle: JoinHandle<u64>,
}

impl Heartbeat {
    /// Beat every `interval` until the flag goes false
    pub fn spawn(liveness: Liveness, interval: Duration) -> Self {
        let handle = thread::spawn(move || {
            let mut beats = 0;
            while liveness.is_alive() {
                beats += 1;
                tracing::debug!(beats, "session alive");
                thread::park_timeout(interval);
            }
            beats
        });
        Self { handle }
    }

    /// Wake the thread so it notices a cleared flag, then wait for it.
    /// Returns the number of beats.
    pub fn join(self) -> u64 {
        self.handle.thread().unpark();
        self.handle.join().unwrap_or_default()
    }
}
