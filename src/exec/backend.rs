// src/exec/backend.rs

//! Pluggable execution substrate.
//!
//! The engine never starts threads itself: every task is wrapped into a
//! [`Job`] and handed to a [`Spawner`]. This keeps scheduling out of the
//! engine and lets tests substitute a recording spawner.
//!
//! - [`ThreadSpawner`] runs every job on its own OS thread (the default).
//! - [`TokioSpawner`] runs jobs on the blocking pool of a tokio runtime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tokio::runtime::Handle;
use tracing::trace;

use crate::errors::{Result, StagechainError};

/// A wrapped task ready to run on some thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Trait abstracting how launched tasks get a thread to run on.
///
/// Implementations must run the job concurrently with the caller; running it
/// inline would block the initiating thread on detached stages. If `spawn`
/// fails, the job is dropped without running; the engine treats that as a
/// task failure.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job) -> Result<()>;
}

/// One OS thread per job.
#[derive(Debug, Default)]
pub struct ThreadSpawner {
    spawned: AtomicU64,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) -> Result<()> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let name = format!("stagechain-task-{n}");
        trace!(thread = %name, "spawning task thread");

        thread::Builder::new()
            .name(name)
            .spawn(job)
            .map(|_| ())
            .map_err(|e| StagechainError::SpawnFailed(e.to_string()))
    }
}

/// Jobs run on the blocking thread pool of a tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running inside.
    ///
    /// Fails when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| StagechainError::SpawnFailed(e.to_string()))
    }
}

impl fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioSpawner").finish_non_exhaustive()
    }
}

impl Spawner for TokioSpawner {
    fn spawn(&self, job: Job) -> Result<()> {
        // The JoinHandle is dropped on purpose: completion is reported
        // through the engine's gates, not through the handle.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
