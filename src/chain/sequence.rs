// src/chain/sequence.rs

//! Ordered sequence of stages.

use crate::chain::stage::{Stage, Task};

/// The stages of one run, in construction order.
///
/// Only the last stage is "current": `join` and `detach` always act on it, so
/// a stage's task set is frozen as soon as the next stage is pushed.
#[derive(Debug, Default)]
pub struct Chain {
    stages: Vec<Stage>,
}

impl Chain {
    /// A chain whose first stage holds `task`.
    pub fn starting_with(task: Task) -> Self {
        Self {
            stages: vec![Stage::new(task)],
        }
    }

    /// Open a new stage holding `task`; it becomes the current stage.
    pub fn push_stage(&mut self, task: Task) {
        self.stages.push(Stage::new(task));
    }

    pub fn current_mut(&mut self) -> Option<&mut Stage> {
        self.stages.last_mut()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Total number of tasks across all stages.
    pub fn task_count(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }
}
