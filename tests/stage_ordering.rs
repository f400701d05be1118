// tests/stage_ordering.rs

mod common;
use crate::common::{EventLog, init_tracing, wait_for};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use stagechain::engine::{EngineState, Invoker};
use stagechain::errors::Result;
use stagechain::exec::{Job, Spawner, ThreadSpawner};

#[test]
fn blocking_stage_finishes_before_the_next_launches() {
    init_tracing();

    let finished = Arc::new(AtomicUsize::new(0));
    let seen_by_next = Arc::new(AtomicUsize::new(usize::MAX));
    let invoker = Invoker::new();

    for i in 0..3 {
        let finished = Arc::clone(&finished);
        let task = move |_: &stagechain::engine::Rejector| -> stagechain::chain::TaskResult {
            thread::sleep(Duration::from_millis(10 * (i + 1) as u64));
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        if i == 0 {
            invoker.call(task);
        } else {
            invoker.join(task);
        }
    }
    {
        let finished = Arc::clone(&finished);
        let seen = Arc::clone(&seen_by_next);
        invoker.then(move |_| {
            seen.store(finished.load(Ordering::SeqCst), Ordering::SeqCst);
            Ok(())
        });
    }

    invoker.start();

    assert_eq!(seen_by_next.load(Ordering::SeqCst), 3);
}

#[test]
fn detached_stage_does_not_hold_back_the_next_one() {
    init_tracing();

    let log = EventLog::new();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let invoker = Invoker::new();

    {
        let first = log.clone();
        let second = log.clone();
        let successes = log.clone();
        invoker
            .call(move |_| {
                release_rx.recv().ok();
                first.push("detached done");
                Ok(())
            })
            .detach()
            .then(move |_| {
                second.push("second stage");
                Ok(())
            })
            .on_success(move || successes.push("success"));
    }

    invoker.start();

    // The second stage ran while the detached one was still blocked, and the
    // run is not complete until the detached task finishes.
    assert_eq!(log.snapshot(), vec!["second stage".to_string()]);
    assert!(invoker.is_running());

    release_tx.send(()).unwrap();
    assert!(invoker.wait_until_ended_timeout(Duration::from_secs(5)));
    assert_eq!(
        log.snapshot(),
        vec![
            "second stage".to_string(),
            "detached done".to_string(),
            "success".to_string()
        ]
    );
}

/// Rejects the run from inside the launch loop, right before the launch
/// numbered `at` (1-based) is handed to a thread.
struct RejectDuringLaunch {
    inner: ThreadSpawner,
    launches: AtomicUsize,
    at: usize,
    invoker: OnceLock<Invoker>,
}

impl Spawner for RejectDuringLaunch {
    fn spawn(&self, job: Job) -> Result<()> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.at {
            if let Some(invoker) = self.invoker.get() {
                invoker.reject(anyhow!("rejected mid-launch"));
            }
        }
        self.inner.spawn(job)
    }
}

#[test]
fn stage_whose_launch_began_is_launched_completely() {
    init_tracing();

    let spawner = Arc::new(RejectDuringLaunch {
        inner: ThreadSpawner::new(),
        launches: AtomicUsize::new(0),
        // Launch 1 is the first stage; launch 3 is the second task of stage two.
        at: 3,
        invoker: OnceLock::new(),
    });
    let invoker = Invoker::with_spawner(spawner.clone());
    assert!(spawner.invoker.set(invoker.clone()).is_ok());

    let log = EventLog::new();
    let stage_two = Arc::new(AtomicUsize::new(0));
    let third_stage_ran = Arc::new(AtomicBool::new(false));

    invoker.call(|_| Ok(()));
    for i in 0..4 {
        let stage_two = Arc::clone(&stage_two);
        let task = move |_: &stagechain::engine::Rejector| -> stagechain::chain::TaskResult {
            stage_two.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        if i == 0 {
            invoker.then(task);
        } else {
            invoker.join(task);
        }
    }
    {
        let ran = Arc::clone(&third_stage_ran);
        let failures = log.clone();
        invoker
            .then(move |_| {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .on_failure(move |e| failures.push(e.to_string()));
    }

    invoker.start();

    wait_for("all four stage-two tasks", || stage_two.load(Ordering::SeqCst) == 4);
    assert_eq!(spawner.launches.load(Ordering::SeqCst), 5);
    assert!(!third_stage_ran.load(Ordering::SeqCst));
    assert_eq!(log.snapshot(), vec!["rejected mid-launch".to_string()]);
}

#[test]
fn start_while_running_is_a_no_op() {
    init_tracing();

    let runs = Arc::new(AtomicUsize::new(0));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let invoker = Invoker::new();

    {
        let runs = Arc::clone(&runs);
        invoker.call(move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            release_rx.recv().ok();
            Ok(())
        });
    }

    let starter = {
        let invoker = invoker.clone();
        thread::spawn(move || invoker.start())
    };
    wait_for("the first run to start", || runs.load(Ordering::SeqCst) == 1);

    // Returns immediately instead of running the chain again or blocking.
    invoker.start();
    assert_eq!(invoker.state(), EngineState::Running);

    release_tx.send(()).unwrap();
    starter.join().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(invoker.state(), EngineState::Ended);
}

#[test]
fn builder_calls_during_a_run_are_ignored() {
    init_tracing();

    let log = EventLog::new();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let invoker = Invoker::new();

    {
        let successes = log.clone();
        invoker
            .call(move |_| {
                release_rx.recv().ok();
                Ok(())
            })
            .on_success(move || successes.push("original success"));
    }

    let starter = {
        let invoker = invoker.clone();
        thread::spawn(move || invoker.start())
    };
    wait_for("the run to start", || invoker.is_running());

    {
        let late = log.clone();
        let replaced = log.clone();
        invoker
            .then(move |_| {
                late.push("late stage");
                Ok(())
            })
            .detach()
            .on_success(move || replaced.push("replaced success"));
    }

    release_tx.send(()).unwrap();
    starter.join().unwrap();

    assert_eq!(log.snapshot(), vec!["original success".to_string()]);

    // Nothing was queued for the next run either.
    invoker.start();
    assert_eq!(log.count("late stage"), 0);
    assert_eq!(log.count("original success"), 2);
}
