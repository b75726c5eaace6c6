//! Schedulable delays for envelope cleanup.
//!
//! Voice disposal happens in delayed callbacks. Routing them through a trait
//! lets tests drive a virtual clock instead of waiting on wall time.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

/// Identifier of a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Deferred callback
pub type Task = Box<dyn FnOnce()>;

/// Single-threaded delayed-callback scheduler
pub trait Scheduler {
    /// Run `task` once after `delay`
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Drop a pending task; returns false if it already ran or was cancelled
    fn cancel(&self, id: TimerId) -> bool;
}

/// Virtual-clock scheduler advanced explicitly
///
/// Tasks run in deadline order (ties in scheduling order) from inside
/// `advance`, and may schedule further tasks.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    pending: RefCell<BTreeMap<(Duration, u64), Task>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed so far
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Move the clock forward, running every task that comes due
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;

        loop {
            // Release the borrow before running: tasks may schedule more work
            let next = {
                let mut pending = self.pending.borrow_mut();
                match pending.keys().next().copied() {
                    Some(key) if key.0 <= target => {
                        self.now.set(key.0);
                        pending.remove(&key)
                    }
                    _ => None,
                }
            };

            match next {
                Some(task) => task(),
                None => break,
            }
        }

        self.now.set(target);
    }

    /// Run everything currently scheduled, however far out
    pub fn run_all(&self) {
        let last = self.pending.borrow().keys().next_back().map(|key| key.0);
        if let Some(deadline) = last {
            self.advance(deadline.saturating_sub(self.now.get()));
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.pending
            .borrow_mut()
            .insert((self.now.get() + delay, id), task);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let mut pending = self.pending.borrow_mut();
        let key = pending.keys().find(|key| key.1 == id.0).copied();
        key.and_then(|key| pending.remove(&key)).is_some()
    }
}

/// Scheduler backed by tokio timers on the current `LocalSet`
///
/// Must be used from within `LocalSet::run_until` (or a task spawned on it).
#[derive(Default)]
pub struct TokioScheduler {
    next_id: Cell<u64>,
    timers: Rc<RefCell<HashMap<TimerId, tokio::task::JoinHandle<()>>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let timers = Rc::clone(&self.timers);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            timers.borrow_mut().remove(&id);
            task();
        });
        self.timers.borrow_mut().insert(id, handle);
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        match self.timers.borrow_mut().remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}
