// src/engine/mod.rs

//! Fork-join execution engine.
//!
//! This module ties together:
//! - the completion gates the initiating thread blocks on
//! - the lifecycle state machine (`Idle → Running → Catching |
//!   NormalEndPreparing → Ended`) guarding rejection and completion
//! - the [`Invoker`], which owns the builder surface, walks the chain, and
//!   launches every task through a [`Spawner`](crate::exec::Spawner)
//!
//! The lifecycle in [`state`] is pure bookkeeping with no threads; the
//! thread-facing side lives in [`invoker`].

use std::fmt;
use std::sync::Arc;

use crate::errors::TaskError;

/// Lifecycle state of an engine.
///
/// `Ended` behaves like `Idle`: a new chain may be built and started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Catching,
    NormalEndPreparing,
    Ended,
}

impl EngineState {
    /// Whether a run is in progress (builder calls and `start` are ignored).
    pub fn is_in_run(self) -> bool {
        matches!(
            self,
            EngineState::Running | EngineState::Catching | EngineState::NormalEndPreparing
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Catching => "catching",
            EngineState::NormalEndPreparing => "normal-end-preparing",
            EngineState::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Called once with the error of the rejection that failed the run.
pub type FailureHandler = Arc<dyn Fn(TaskError) + Send + Sync + 'static>;

/// Called once when a run finishes without a rejection.
pub type SuccessHandler = Arc<dyn Fn() + Send + Sync + 'static>;

pub mod gate;
pub mod invoker;
pub mod state;

pub use gate::CompletionGate;
pub use invoker::{Invoker, Rejector};
pub use state::Lifecycle;
