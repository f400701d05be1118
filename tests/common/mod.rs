#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

pub use stagechain_test_utils::{init_tracing, wait_for};

/// Shared, ordered record of what happened during a test run.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}
