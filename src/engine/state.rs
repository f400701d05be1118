// src/engine/state.rs

//! Lifecycle state machine of an engine.
//!
//! [`Lifecycle`] is the single value the [`Invoker`](super::Invoker) keeps
//! behind its mutex. Every transition is one method call on it, so holding
//! the lock for the duration of the call makes each check-and-set atomic.
//! Methods never run user code; they hand back what the caller should run
//! (handlers, gates to release) once the lock is dropped.
//!
//! It owns:
//! - the chain under construction and the registered handlers
//! - the engine state and the run id of the current run
//! - the per-run bookkeeping: active stage gate, run-level gate, and the
//!   number of launched units still in flight

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chain::{Chain, Task};
use crate::engine::gate::CompletionGate;
use crate::engine::{EngineState, FailureHandler, SuccessHandler};

/// Bookkeeping for the run currently in progress (or the last one).
#[derive(Default)]
struct ActiveRun {
    failure_handler: Option<FailureHandler>,
    success_handler: Option<SuccessHandler>,
    active_gate: Option<Arc<CompletionGate>>,
    run_gate: Option<Arc<CompletionGate>>,
    in_flight: usize,
    /// `start` has returned while detached units were still running, so the
    /// run settles on whichever task thread observes its end.
    initiator_released: bool,
}

/// What `start` gets back from a successful `Idle → Running` transition.
pub struct RunStart {
    pub run_id: u64,
    pub chain: Chain,
}

/// What the winner of the `Running → Catching` transition must do.
pub struct Catch {
    pub active_gate: Option<Arc<CompletionGate>>,
    pub failure_handler: Option<FailureHandler>,
    pub run_gate: Option<Arc<CompletionGate>>,
    /// The rejecting thread is responsible for the final `Ended` transition.
    pub ends_run: bool,
}

/// How the initiating thread settles a run once the chain loop is over.
pub enum Settle {
    /// Block on the run-level gate until the failure handler is done, then end.
    AwaitFailureHandler(Arc<CompletionGate>),
    /// Rejected without a failure handler; end right away.
    End,
    /// Normal completion: run the success handler (if any), then end.
    Succeed(Option<SuccessHandler>),
    /// Detached units are still running; they settle the run.
    Release,
}

pub struct Lifecycle {
    state: EngineState,
    run_counter: u64,
    current_run: Option<u64>,
    chain: Option<Chain>,
    failure_handler: Option<FailureHandler>,
    success_handler: Option<SuccessHandler>,
    run: ActiveRun,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: EngineState::Idle,
            run_counter: 0,
            current_run: None,
            chain: None,
            failure_handler: None,
            success_handler: None,
            run: ActiveRun::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Id of the run in progress, or of the last run once it has ended.
    pub fn current_run(&self) -> Option<u64> {
        self.current_run
    }

    /// Id of the run in progress, if any.
    pub fn running_run(&self) -> Option<u64> {
        if self.state.is_in_run() {
            self.current_run
        } else {
            None
        }
    }

    /// Units of the current run launched but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.run.in_flight
    }

    /// Number of stages in the chain under construction.
    pub fn pending_stages(&self) -> usize {
        self.chain.as_ref().map_or(0, Chain::len)
    }

    fn buildable(&self, op: &str) -> bool {
        if self.state.is_in_run() {
            debug!(op, state = %self.state, "builder call while a run is in progress; ignoring");
            false
        } else {
            true
        }
    }

    // ---- builder surface ----

    pub fn call(&mut self, task: Task) -> bool {
        if !self.buildable("call") {
            return false;
        }
        self.chain = Some(Chain::starting_with(task));
        true
    }

    pub fn then(&mut self, task: Task) -> bool {
        if !self.buildable("then") {
            return false;
        }
        match self.chain.as_mut() {
            Some(chain) => chain.push_stage(task),
            None => self.chain = Some(Chain::starting_with(task)),
        }
        true
    }

    pub fn join(&mut self, task: Task) -> bool {
        if !self.buildable("join") {
            return false;
        }
        match self.chain.as_mut().and_then(Chain::current_mut) {
            Some(stage) => {
                stage.push(task);
                true
            }
            None => {
                warn!("join called before any stage exists; ignoring");
                false
            }
        }
    }

    pub fn detach(&mut self) -> bool {
        if !self.buildable("detach") {
            return false;
        }
        match self.chain.as_mut().and_then(Chain::current_mut) {
            Some(stage) => {
                stage.set_wait(false);
                true
            }
            None => {
                warn!("detach called before any stage exists; ignoring");
                false
            }
        }
    }

    pub fn set_failure_handler(&mut self, handler: FailureHandler) -> bool {
        if !self.buildable("on_failure") {
            return false;
        }
        self.failure_handler = Some(handler);
        true
    }

    pub fn set_success_handler(&mut self, handler: SuccessHandler) -> bool {
        if !self.buildable("on_success") {
            return false;
        }
        self.success_handler = Some(handler);
        true
    }

    // ---- transitions ----

    /// `Idle | Ended → Running`.
    ///
    /// Takes the built chain (an empty one if nothing was built) and snapshots
    /// the handlers for the new run. Returns `None` if a run is in progress.
    pub fn begin_run(&mut self) -> Option<RunStart> {
        if self.state.is_in_run() {
            return None;
        }

        self.run_counter += 1;
        let run_id = self.run_counter;
        self.current_run = Some(run_id);
        self.state = EngineState::Running;

        let failure_handler = self.failure_handler.clone();
        let run_gate = failure_handler
            .as_ref()
            .map(|_| Arc::new(CompletionGate::new(1)));

        self.run = ActiveRun {
            failure_handler,
            success_handler: self.success_handler.clone(),
            active_gate: None,
            run_gate,
            in_flight: 0,
            initiator_released: false,
        };

        Some(RunStart {
            run_id,
            chain: self.chain.take().unwrap_or_default(),
        })
    }

    fn is_current(&self, run_id: u64) -> bool {
        self.current_run == Some(run_id)
    }

    /// Make `gate` the active stage gate and account for `tasks` new units.
    ///
    /// Returns `false` (and changes nothing) once the run has been rejected:
    /// the stage must not be launched.
    pub fn begin_stage(&mut self, run_id: u64, gate: Arc<CompletionGate>, tasks: usize) -> bool {
        if !self.is_current(run_id) || self.state != EngineState::Running {
            return false;
        }
        self.run.active_gate = Some(gate);
        self.run.in_flight += tasks;
        true
    }

    /// `Running → Catching`, at most once per run.
    ///
    /// Refused when the run is already catching, has begun normal completion,
    /// has ended, or when `run_id` belongs to an earlier run.
    pub fn try_catch(&mut self, run_id: u64) -> Option<Catch> {
        if !self.is_current(run_id) || self.state != EngineState::Running {
            return None;
        }
        self.state = EngineState::Catching;

        Some(Catch {
            active_gate: self.run.active_gate.clone(),
            failure_handler: self.run.failure_handler.clone(),
            run_gate: self.run.run_gate.clone(),
            ends_run: self.run.initiator_released,
        })
    }

    /// Decide how the initiating thread settles the run after the chain loop.
    pub fn settle_after_invoke(&mut self, run_id: u64) -> Settle {
        if !self.is_current(run_id) {
            return Settle::Release;
        }

        match self.state {
            EngineState::Catching => match self.run.run_gate.clone() {
                Some(gate) => Settle::AwaitFailureHandler(gate),
                None => Settle::End,
            },
            EngineState::Running if self.run.in_flight == 0 => {
                self.state = EngineState::NormalEndPreparing;
                Settle::Succeed(self.run.success_handler.clone())
            }
            EngineState::Running => {
                self.run.initiator_released = true;
                Settle::Release
            }
            other => {
                warn!(run_id, state = %other, "unexpected state after chain loop");
                Settle::Release
            }
        }
    }

    /// Account for a finished unit of `run_id`.
    ///
    /// Returns `Some(handler)` when this unit was the last one of a run whose
    /// initiator already returned: the caller has won `Running →
    /// NormalEndPreparing` and must run the success handler, then end.
    pub fn unit_finished(&mut self, run_id: u64) -> Option<Option<SuccessHandler>> {
        if !self.is_current(run_id) {
            return None;
        }
        self.run.in_flight = self.run.in_flight.saturating_sub(1);

        if self.run.in_flight == 0
            && self.run.initiator_released
            && self.state == EngineState::Running
        {
            self.state = EngineState::NormalEndPreparing;
            return Some(self.run.success_handler.clone());
        }
        None
    }

    /// `Catching | NormalEndPreparing → Ended`.
    ///
    /// Returns `true` if this call ended the run.
    pub fn finish(&mut self, run_id: u64) -> bool {
        if !self.is_current(run_id) || !self.state.is_in_run() {
            return false;
        }
        self.state = EngineState::Ended;
        self.run.active_gate = None;
        self.run.run_gate = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task {
        Box::new(|_| Ok(()))
    }

    fn gate(n: usize) -> Arc<CompletionGate> {
        Arc::new(CompletionGate::new(n))
    }

    fn failure_handler() -> FailureHandler {
        Arc::new(|_| {})
    }

    #[test]
    fn only_one_start_wins() {
        let mut lc = Lifecycle::new();
        lc.call(noop());

        let first = lc.begin_run().expect("first start should win");
        assert_eq!(first.run_id, 1);
        assert_eq!(first.chain.len(), 1);
        assert!(lc.begin_run().is_none());
        assert_eq!(lc.state(), EngineState::Running);
    }

    #[test]
    fn builder_calls_are_ignored_during_a_run() {
        let mut lc = Lifecycle::new();
        lc.call(noop());
        lc.begin_run().unwrap();

        assert!(!lc.call(noop()));
        assert!(!lc.then(noop()));
        assert!(!lc.join(noop()));
        assert!(!lc.detach());
        assert!(!lc.set_failure_handler(failure_handler()));
        assert!(!lc.set_success_handler(Arc::new(|| {})));
        assert_eq!(lc.pending_stages(), 0);
    }

    #[test]
    fn only_one_rejection_catches() {
        let mut lc = Lifecycle::new();
        lc.set_failure_handler(failure_handler());
        lc.call(noop());
        let run = lc.begin_run().unwrap();
        let stage_gate = gate(1);
        assert!(lc.begin_stage(run.run_id, Arc::clone(&stage_gate), 1));

        let catch = lc.try_catch(run.run_id).expect("first rejection wins");
        assert!(catch.failure_handler.is_some());
        assert!(catch.run_gate.is_some());
        assert!(Arc::ptr_eq(catch.active_gate.as_ref().unwrap(), &stage_gate));
        assert!(!catch.ends_run);

        assert!(lc.try_catch(run.run_id).is_none());
        assert_eq!(lc.state(), EngineState::Catching);
    }

    #[test]
    fn rejected_run_refuses_further_stages() {
        let mut lc = Lifecycle::new();
        lc.call(noop());
        let run = lc.begin_run().unwrap();
        lc.try_catch(run.run_id).unwrap();

        assert!(!lc.begin_stage(run.run_id, gate(1), 1));
        assert!(matches!(lc.settle_after_invoke(run.run_id), Settle::End));
        assert!(lc.finish(run.run_id));
        assert_eq!(lc.state(), EngineState::Ended);
    }

    #[test]
    fn rejection_after_normal_end_began_is_dropped() {
        let mut lc = Lifecycle::new();
        lc.call(noop());
        let run = lc.begin_run().unwrap();

        assert!(matches!(
            lc.settle_after_invoke(run.run_id),
            Settle::Succeed(None)
        ));
        assert_eq!(lc.state(), EngineState::NormalEndPreparing);
        assert!(lc.try_catch(run.run_id).is_none());
    }

    #[test]
    fn rejection_from_an_earlier_run_is_dropped() {
        let mut lc = Lifecycle::new();
        lc.call(noop());
        let first = lc.begin_run().unwrap();
        lc.settle_after_invoke(first.run_id);
        lc.finish(first.run_id);

        lc.call(noop());
        let second = lc.begin_run().unwrap();
        assert_ne!(first.run_id, second.run_id);
        assert!(lc.try_catch(first.run_id).is_none());
        assert!(lc.unit_finished(first.run_id).is_none());
        assert_eq!(lc.state(), EngineState::Running);
    }

    #[test]
    fn detached_units_settle_the_run_when_the_last_one_finishes() {
        let mut lc = Lifecycle::new();
        lc.set_success_handler(Arc::new(|| {}));
        lc.call(noop());
        let run = lc.begin_run().unwrap();
        assert!(lc.begin_stage(run.run_id, gate(2), 2));

        assert!(matches!(lc.settle_after_invoke(run.run_id), Settle::Release));
        assert!(lc.unit_finished(run.run_id).is_none());

        let settle = lc.unit_finished(run.run_id).expect("last unit settles");
        assert!(settle.is_some());
        assert_eq!(lc.state(), EngineState::NormalEndPreparing);
        assert!(lc.finish(run.run_id));
    }

    #[test]
    fn late_catch_after_release_ends_the_run() {
        let mut lc = Lifecycle::new();
        lc.call(noop());
        let run = lc.begin_run().unwrap();
        lc.begin_stage(run.run_id, gate(1), 1);
        lc.settle_after_invoke(run.run_id);

        let catch = lc.try_catch(run.run_id).unwrap();
        assert!(catch.ends_run);
        assert!(catch.run_gate.is_none());
        // The unit finishing afterwards must not start normal completion.
        assert!(lc.unit_finished(run.run_id).is_none());
    }

    #[test]
    fn ended_engine_is_reusable() {
        let mut lc = Lifecycle::new();
        lc.call(noop());
        let run = lc.begin_run().unwrap();
        lc.settle_after_invoke(run.run_id);
        assert!(lc.finish(run.run_id));
        assert!(!lc.finish(run.run_id));

        assert!(lc.call(noop()));
        assert!(lc.join(noop()));
        let next = lc.begin_run().unwrap();
        assert_eq!(next.chain.task_count(), 2);
    }

    #[test]
    fn join_and_detach_without_a_stage_are_ignored() {
        let mut lc = Lifecycle::new();
        assert!(!lc.join(noop()));
        assert!(!lc.detach());
        assert!(lc.then(noop()));
        assert_eq!(lc.pending_stages(), 1);
    }
}
