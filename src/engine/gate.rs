// src/engine/gate.rs

//! Counting completion gate.
//!
//! A gate starts at `n`, is decremented once by every finishing unit of work,
//! and releases whoever waits on it when the count reaches zero. A rejection
//! can drain it to zero early with [`CompletionGate::force_release`].

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub struct CompletionGate {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionGate {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Decrement the count by one. Signalling an open gate is a no-op.
    pub fn signal(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.released.notify_all();
        }
    }

    /// Drain the count to zero regardless of outstanding signals.
    pub fn force_release(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining != 0 {
            *remaining = 0;
            self.released.notify_all();
        }
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the gate opened. A timeout too large to represent
    /// waits without a deadline.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self
                .released
                .wait_until(&mut remaining, deadline)
                .timed_out()
            {
                return *remaining == 0;
            }
        }
        true
    }

    pub fn count(&self) -> usize {
        *self.remaining.lock()
    }

    pub fn is_open(&self) -> bool {
        self.count() == 0
    }
}
