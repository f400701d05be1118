// src/exec/task_runner.rs

//! Runs a single task body and routes its failure into the engine.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::chain::Task;
use crate::engine::Rejector;
use crate::errors::StagechainError;

/// Run `task`, turning an `Err` return or a panic into a rejection.
///
/// Gate bookkeeping is not done here; the caller holds a guard that signals
/// on drop, so it happens whatever this function does.
pub fn run_task(task: Task, rejector: &Rejector) {
    let run_id = rejector.run_id();

    match panic::catch_unwind(AssertUnwindSafe(|| task(rejector))) {
        Ok(Ok(())) => {
            debug!(run_id, "task finished");
        }
        Ok(Err(err)) => {
            warn!(run_id, error = %err, "task failed; rejecting run");
            rejector.reject(err);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(run_id, panic = %message, "task panicked; rejecting run");
            rejector.reject(StagechainError::TaskPanicked(message));
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_str_and_string_payloads() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");

        let payload = panic::catch_unwind(|| std::panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
