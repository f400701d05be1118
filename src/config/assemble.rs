// src/config/assemble.rs

//! Turn a validated [`ChainFile`] into an [`Invoker`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::model::ChainFile;
use crate::engine::Invoker;
use crate::errors::{Result, TaskError};
use crate::exec::{Spawner, ThreadSpawner, TokioSpawner, shell_failure_handler, shell_success_handler, shell_task};
use crate::types::ExecutorKind;

/// Spawner for the configured executor.
///
/// `Tokio` needs to be called from inside a tokio runtime.
pub fn spawner_for(kind: ExecutorKind) -> Result<Arc<dyn Spawner>> {
    let spawner: Arc<dyn Spawner> = match kind {
        ExecutorKind::Thread => Arc::new(ThreadSpawner::new()),
        ExecutorKind::Tokio => Arc::new(TokioSpawner::current()?),
    };
    Ok(spawner)
}

/// Remembers the message of the rejection that failed a run, if any.
#[derive(Debug, Clone, Default)]
pub struct FailureRecord {
    message: Arc<Mutex<Option<String>>>,
}

impl FailureRecord {
    fn record(&self, err: &TaskError) {
        *self.message.lock() = Some(format!("{err:#}"));
    }

    pub fn get(&self) -> Option<String> {
        self.message.lock().clone()
    }
}

/// Build an engine with one shell task per configured command.
///
/// The returned [`FailureRecord`] is filled in by the failure handler before
/// the configured `on_failure` command runs.
pub fn build_invoker(chain: &ChainFile, spawner: Arc<dyn Spawner>) -> (Invoker, FailureRecord) {
    let invoker = Invoker::with_spawner(spawner);

    for (index, stage) in chain.stage.iter().enumerate() {
        for (pos, cmd) in stage.tasks.iter().enumerate() {
            let task = shell_task(cmd.clone());
            match (index, pos) {
                (0, 0) => invoker.call(task),
                (_, 0) => invoker.then(task),
                _ => invoker.join(task),
            };
        }
        if stage.detach {
            invoker.detach();
        }
        debug!(stage = index, tasks = stage.tasks.len(), detach = stage.detach, "stage added");
    }

    let record = FailureRecord::default();
    let on_failure = chain.handlers.on_failure.clone().map(shell_failure_handler);
    {
        let record = record.clone();
        invoker.on_failure(move |err| {
            record.record(&err);
            if let Some(handler) = &on_failure {
                handler(err);
            }
        });
    }

    if let Some(cmd) = &chain.handlers.on_success {
        invoker.on_success(shell_success_handler(cmd.clone()));
    }

    (invoker, record)
}
