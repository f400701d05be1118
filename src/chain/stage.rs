// src/chain/stage.rs

//! A single stage of a chain.

use std::fmt;

use crate::engine::Rejector;
use crate::errors::TaskError;

/// Result returned by a task body.
pub type TaskResult = std::result::Result<(), TaskError>;

/// A unit of work owned by a stage.
///
/// The task receives the [`Rejector`] of the run it belongs to so it can
/// report a failure explicitly instead of returning an error.
pub type Task = Box<dyn FnOnce(&Rejector) -> TaskResult + Send + 'static>;

/// Tasks that run concurrently with each other, plus the wait policy the
/// initiating thread applies once they are launched.
pub struct Stage {
    tasks: Vec<Task>,
    wait: bool,
}

impl Stage {
    /// A new blocking stage holding `task`.
    pub fn new(task: Task) -> Self {
        Self {
            tasks: vec![task],
            wait: true,
        }
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Whether the initiating thread blocks until this stage completes.
    pub fn waits(&self) -> bool {
        self.wait
    }

    pub fn set_wait(&mut self, wait: bool) {
        self.wait = wait;
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Consume the stage, handing out its tasks for launching.
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("tasks", &self.tasks.len())
            .field("wait", &self.wait)
            .finish()
    }
}
