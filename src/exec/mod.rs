// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] provides the `Spawner` trait the engine launches tasks
//!   through, with a thread-per-task and a tokio blocking-pool
//!   implementation.
//! - [`task_runner`] runs one task body and turns its failure (error or
//!   panic) into a rejection.
//! - [`command`] provides shell-command tasks and handlers for chain files.

pub mod backend;
pub mod command;
pub mod task_runner;

pub use backend::{Job, Spawner, ThreadSpawner, TokioSpawner};
pub use command::{shell_failure_handler, shell_success_handler, shell_task};
