use std::sync::atomic::{AtomicUsize, Ordering};

use stagechain::errors::{Result, StagechainError};
use stagechain::exec::{Job, Spawner, ThreadSpawner};

/// A spawner that:
/// - counts every launch request
/// - runs jobs on real threads through [`ThreadSpawner`]
/// - optionally refuses launches after a given number of successes
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    inner: ThreadSpawner,
    launched: AtomicUsize,
    refused: AtomicUsize,
    fail_after: Option<usize>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the first `n` launches, refuse every later one.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Number of jobs handed to a thread.
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Number of launches refused.
    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, job: Job) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.launched.load(Ordering::SeqCst) >= limit {
                self.refused.fetch_add(1, Ordering::SeqCst);
                return Err(StagechainError::SpawnFailed(
                    "launch refused by test spawner".to_string(),
                ));
            }
        }
        self.launched.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(job)
    }
}
