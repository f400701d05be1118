// src/chain/mod.rs

//! Chain model: the ordered stages an [`Invoker`](crate::engine::Invoker)
//! runs.
//!
//! - [`stage`] holds one set of sibling tasks plus its wait policy.
//! - [`sequence`] holds the ordered stages and the "current stage" cursor the
//!   builder appends to.

pub mod sequence;
pub mod stage;

pub use sequence::Chain;
pub use stage::{Stage, Task, TaskResult};
