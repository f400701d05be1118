// src/engine/invoker.rs

//! The engine handle: builder surface, chain execution, and rejection.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::chain::{Chain, Task, TaskResult};
use crate::engine::gate::CompletionGate;
use crate::engine::state::{Lifecycle, Settle};
use crate::engine::{EngineState, FailureHandler, SuccessHandler};
use crate::errors::{StagechainError, TaskError};
use crate::exec::task_runner::{panic_message, run_task};
use crate::exec::{Spawner, ThreadSpawner};

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    /// Notified whenever a run reaches `Ended`.
    ended: Condvar,
    spawner: Arc<dyn Spawner>,
}

/// Fork-join chain engine.
///
/// Build a chain with [`call`](Self::call), [`then`](Self::then),
/// [`join`](Self::join) and [`detach`](Self::detach), register optional
/// handlers, then [`start`](Self::start) it:
///
/// ```no_run
/// use stagechain::engine::Invoker;
///
/// Invoker::new()
///     .call(|_| Ok(()))
///     .then(|_| Ok(()))
///     .join(|r| {
///         r.reject(anyhow::anyhow!("bad input"));
///         Ok(())
///     })
///     .on_failure(|e| eprintln!("chain failed: {e}"))
///     .on_success(|| println!("chain done"))
///     .start();
/// ```
///
/// Stages run in order; tasks of one stage run concurrently. Builder calls
/// made while a run is in progress are ignored. The handle is cheap to clone
/// and every clone drives the same engine.
#[derive(Clone)]
pub struct Invoker {
    shared: Arc<Shared>,
}

/// Rejection entry point handed to every task.
///
/// Bound to the run the task was launched for: rejecting through a
/// `Rejector` of a finished run has no effect on later runs.
#[derive(Clone)]
pub struct Rejector {
    shared: Arc<Shared>,
    run_id: u64,
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lc = self.shared.lifecycle.lock();
        f.debug_struct("Invoker")
            .field("state", &lc.state())
            .field("run_id", &lc.current_run())
            .field("in_flight", &lc.in_flight())
            .field("pending_stages", &lc.pending_stages())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Rejector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejector")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl Invoker {
    /// Engine launching one OS thread per task.
    pub fn new() -> Self {
        Self::with_spawner(Arc::new(ThreadSpawner::new()))
    }

    pub fn with_spawner(spawner: Arc<dyn Spawner>) -> Self {
        Self {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle::new()),
                ended: Condvar::new(),
                spawner,
            }),
        }
    }

    // ---- builder surface ----

    /// Discard any previous chain and start a new one whose first stage
    /// holds `task`.
    pub fn call<F>(&self, task: F) -> &Self
    where
        F: FnOnce(&Rejector) -> TaskResult + Send + 'static,
    {
        self.shared.lifecycle.lock().call(Box::new(task));
        self
    }

    /// Open a new stage holding `task`. It launches only after every earlier
    /// blocking stage has finished.
    pub fn then<F>(&self, task: F) -> &Self
    where
        F: FnOnce(&Rejector) -> TaskResult + Send + 'static,
    {
        self.shared.lifecycle.lock().then(Box::new(task));
        self
    }

    /// Add `task` to the current stage, to run alongside its siblings.
    pub fn join<F>(&self, task: F) -> &Self
    where
        F: FnOnce(&Rejector) -> TaskResult + Send + 'static,
    {
        self.shared.lifecycle.lock().join(Box::new(task));
        self
    }

    /// Do not wait for the current stage before moving on.
    ///
    /// Tasks of a detached stage may still be running, and may still reject
    /// the run, after `start` has returned.
    pub fn detach(&self) -> &Self {
        self.shared.lifecycle.lock().detach();
        self
    }

    pub fn on_failure<F>(&self, handler: F) -> &Self
    where
        F: Fn(TaskError) + Send + Sync + 'static,
    {
        let handler: FailureHandler = Arc::new(handler);
        self.shared.lifecycle.lock().set_failure_handler(handler);
        self
    }

    pub fn on_success<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let handler: SuccessHandler = Arc::new(handler);
        self.shared.lifecycle.lock().set_success_handler(handler);
        self
    }

    // ---- runtime surface ----

    /// Run the chain built so far.
    ///
    /// Returns once every blocking stage is done and the run has been
    /// settled, or right after the chain loop if detached tasks are still
    /// running (they settle the run themselves). Does nothing if a run is
    /// already in progress.
    ///
    /// In the second case the engine is still running when `start` returns:
    /// builder calls are ignored until the detached tasks finish (use
    /// [`wait_until_ended`](Self::wait_until_ended) first), and the success
    /// or failure handler runs on the thread of the task that ends the run,
    /// not on the caller's thread.
    pub fn start(&self) {
        let run = match self.shared.lifecycle.lock().begin_run() {
            Some(run) => run,
            None => {
                debug!("start called while a run is in progress; ignoring");
                return;
            }
        };

        let run_id = run.run_id;
        info!(
            run_id,
            stages = run.chain.len(),
            tasks = run.chain.task_count(),
            "starting chain"
        );

        self.invoke(run_id, run.chain);

        let settle = self.shared.lifecycle.lock().settle_after_invoke(run_id);
        match settle {
            Settle::AwaitFailureHandler(run_gate) => {
                debug!(run_id, "run rejected; waiting for failure handler");
                run_gate.wait();
                self.shared.finish(run_id);
            }
            Settle::End => {
                self.shared.finish(run_id);
            }
            Settle::Succeed(handler) => {
                self.shared.complete(run_id, handler);
            }
            Settle::Release => {
                debug!(run_id, "detached tasks still running; returning to caller");
            }
        }
    }

    /// Reject the run in progress, if any.
    ///
    /// Tasks should prefer the [`Rejector`] they are given, which cannot
    /// reach a later run by accident.
    pub fn reject(&self, error: impl Into<TaskError>) {
        let run_id = self.shared.lifecycle.lock().running_run();
        match run_id {
            Some(run_id) => self.shared.reject(run_id, error.into()),
            None => debug!("reject called with no run in progress; ignoring"),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.lifecycle.lock().state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_in_run()
    }

    /// Block until no run is in progress.
    pub fn wait_until_ended(&self) {
        let mut lc = self.shared.lifecycle.lock();
        while lc.state().is_in_run() {
            self.shared.ended.wait(&mut lc);
        }
    }

    /// Like [`wait_until_ended`](Self::wait_until_ended) with a deadline.
    ///
    /// Returns `true` if no run is in progress. A timeout too large to
    /// represent waits without a deadline.
    pub fn wait_until_ended_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_until_ended();
            return true;
        };
        let mut lc = self.shared.lifecycle.lock();
        while lc.state().is_in_run() {
            if self.shared.ended.wait_until(&mut lc, deadline).timed_out() {
                return !lc.state().is_in_run();
            }
        }
        true
    }

    /// Walk the stages in order on the calling thread.
    fn invoke(&self, run_id: u64, chain: Chain) {
        for (index, stage) in chain.into_stages().into_iter().enumerate() {
            let size = stage.len();
            let wait = stage.waits();
            let gate = Arc::new(CompletionGate::new(size));

            // Checking for a rejection and installing the gate happen in one
            // critical section; past this point every task of the stage is
            // launched.
            if !self
                .shared
                .lifecycle
                .lock()
                .begin_stage(run_id, Arc::clone(&gate), size)
            {
                info!(run_id, stage = index, "run rejected; not launching remaining stages");
                return;
            }

            debug!(run_id, stage = index, tasks = size, wait, "launching stage");
            for task in stage.into_tasks() {
                self.launch(run_id, task, Arc::clone(&gate));
            }

            if wait {
                gate.wait();
                debug!(run_id, stage = index, "stage gate open");
            }
        }
    }

    fn launch(&self, run_id: u64, task: Task, gate: Arc<CompletionGate>) {
        let rejector = Rejector {
            shared: Arc::clone(&self.shared),
            run_id,
        };
        let unit = UnitGuard {
            shared: Arc::clone(&self.shared),
            run_id,
            gate,
            ran: false,
        };

        let job_rejector = rejector.clone();
        let job = Box::new(move || {
            let mut unit = unit;
            unit.ran = true;
            run_task(task, &job_rejector);
        });

        // A failed launch drops the job, and with it the guard, so the run is
        // rejected and the gate is still signalled.
        if let Err(err) = self.shared.spawner.spawn(job) {
            error!(run_id, error = %err, "failed to launch task");
            rejector.reject(err);
        }
    }
}

impl Rejector {
    /// Report a failure for this task's run.
    ///
    /// Only the first rejection of a run reaches the failure handler; later
    /// ones, and ones arriving after the run began completing normally, are
    /// dropped.
    pub fn reject(&self, error: impl Into<TaskError>) {
        self.shared.reject(self.run_id, error.into());
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

impl Shared {
    fn reject(&self, run_id: u64, error: TaskError) {
        let catch = match self.lifecycle.lock().try_catch(run_id) {
            Some(catch) => catch,
            None => {
                debug!(run_id, error = %error, "rejection dropped");
                return;
            }
        };

        info!(run_id, error = %error, "run rejected");

        if let Some(gate) = catch.active_gate {
            gate.force_release();
        }

        match catch.failure_handler {
            Some(handler) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(error))) {
                    error!(
                        run_id,
                        panic = %panic_message(payload.as_ref()),
                        "failure handler panicked"
                    );
                }
            }
            None => {
                error!(run_id, error = %error, "chain failed with no failure handler registered");
            }
        }

        if let Some(run_gate) = catch.run_gate {
            run_gate.signal();
        }

        if catch.ends_run {
            self.finish(run_id);
        }
    }

    /// Bookkeeping for a finished (or never-run) unit.
    fn unit_finished(&self, run_id: u64, gate: &CompletionGate) {
        let settle = self.lifecycle.lock().unit_finished(run_id);
        gate.signal();

        if let Some(handler) = settle {
            debug!(run_id, "last detached task finished; completing run");
            self.complete(run_id, handler);
        }
    }

    /// Run the success handler of a run that won `NormalEndPreparing`, then
    /// end it.
    fn complete(&self, run_id: u64, handler: Option<SuccessHandler>) {
        if let Some(handler) = handler {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler())) {
                error!(
                    run_id,
                    panic = %panic_message(payload.as_ref()),
                    "success handler panicked"
                );
            }
        }
        self.finish(run_id);
    }

    fn finish(&self, run_id: u64) {
        if self.lifecycle.lock().finish(run_id) {
            info!(run_id, "run ended");
            self.ended.notify_all();
        } else {
            warn!(run_id, "run was already ended");
        }
    }
}

/// Signals a stage gate exactly once, when the unit holding it is dropped.
///
/// A unit dropped before its task started (the spawner discarded the job)
/// rejects the run first.
struct UnitGuard {
    shared: Arc<Shared>,
    run_id: u64,
    gate: Arc<CompletionGate>,
    ran: bool,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if !self.ran {
            warn!(run_id = self.run_id, "task dropped before running; rejecting run");
            self.shared.reject(
                self.run_id,
                StagechainError::SpawnFailed("task dropped before running".to_string()).into(),
            );
        }
        self.shared.unit_finished(self.run_id, &self.gate);
    }
}

