//! Single-threaded timer loop with a virtual clock.
//!
//! The host drives time explicitly: [`EventLoop::tick`] runs whatever was due
//! when the tick began, and [`EventLoop::advance`] moves the clock forward and
//! fires timers at their own deadlines. Nothing runs on the caller's stack at
//! scheduling time, so zero-delay timers are the "next tick" primitive.

use core::cell::RefCell;
use core::fmt;
use core::time::Duration;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use log::{trace, warn};

/// Upper bound on ticks per [`EventLoop::run_until_idle`] call.
const MAX_IDLE_TICKS: usize = 10_000;

/// Handle for cancelling a scheduled task.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(u64);

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct LoopState {
    now: Duration,
    next_id: u64,
    /// Ordered by deadline, then by scheduling order.
    queue: BTreeMap<(Duration, TimerId), Task>,
    deadlines: HashMap<TimerId, Duration>,
}

impl LoopState {
    fn pop(&mut self, key: (Duration, TimerId)) -> Option<Task> {
        let task = self.queue.remove(&key)?;
        self.deadlines.remove(&key.1);
        Some(task)
    }
}

/// Shared handle to the host timer queue.
#[derive(Clone, Default)]
pub struct EventLoop {
    state: Rc<RefCell<LoopState>>,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        formatter
            .debug_struct("EventLoop")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl EventLoop {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since the loop was created.
    #[inline]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of scheduled tasks not yet run or cleared.
    #[inline]
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Schedule `task` to run once `delay` has elapsed.
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = TimerId(state.next_id);
        state.next_id = state.next_id.saturating_add(1);
        let deadline = state.now.saturating_add(delay);
        state.queue.insert((deadline, id), Box::new(task));
        state.deadlines.insert(id, deadline);
        trace!("timer {id:?} scheduled for {deadline:?}");
        id
    }

    /// Schedule `task` for the next tick.
    #[inline]
    pub fn defer(&self, task: impl FnOnce() + 'static) -> TimerId {
        self.set_timeout(Duration::ZERO, task)
    }

    /// Cancel a scheduled task. Returns `false` if it already ran or was cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(deadline) = state.deadlines.remove(&id) else {
            return false;
        };
        state.queue.remove(&(deadline, id));
        trace!("timer {id:?} cleared");
        true
    }

    /// Run every task that was due when this tick began. Tasks scheduled
    /// while the tick runs wait for the next one. Returns the number run.
    pub fn tick(&self) -> usize {
        let due: Vec<(Duration, TimerId)> = {
            let state = self.state.borrow();
            let horizon = state.next_id;
            state
                .queue
                .range(..=(state.now, TimerId(u64::MAX)))
                .map(|(key, _)| *key)
                .filter(|(_, id)| id.0 < horizon)
                .collect()
        };
        let mut ran = 0;
        for key in due {
            let task = self.state.borrow_mut().pop(key);
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }
        ran
    }

    /// Tick until nothing is due at the current time.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_IDLE_TICKS {
            let ran = self.tick();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
        warn!("event loop still busy after {MAX_IDLE_TICKS} ticks");
        total
    }

    /// Move the clock forward by `delta`, firing due timers in deadline order.
    /// Each task observes `now()` equal to its own deadline.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.now().saturating_add(delta);
        let mut ran = 0;
        loop {
            let task = {
                let mut state = self.state.borrow_mut();
                let Some(key) = state.queue.keys().next().copied() else {
                    break;
                };
                if key.0 > target {
                    break;
                }
                state.now = state.now.max(key.0);
                state.pop(key)
            };
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(target);
        ran
    }
}
