//! Per-type load-state detectors.
//!
//! Every detector drives one [`Detection`]: a tagged state machine that
//! starts `Pending` and moves to a terminal [`DetectorState::Settled`] through
//! a single transition function, [`Detection::settle`]. Whichever trigger
//! arrives first (cache replay, deferred check, native event, timeout) wins;
//! later triggers find the machine settled and do nothing.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use dom::{CachedStatus, Document, EventHandler, LoadEvent, NodeKey, TimerId};
use log::{debug, trace};

use crate::status::LoadStatus;

pub mod frame;
pub mod image;

/// Called exactly once with the terminal status of a cycle.
pub type Completion = Box<dyn FnOnce(LoadStatus)>;

/// Signature shared by all detectors: node, completion, optional timeout.
pub type Detector = fn(&Document, NodeKey, Completion, Option<Duration>);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectorState {
    Pending,
    Settled(LoadStatus),
}

struct Machine {
    state: DetectorState,
    completion: Option<Completion>,
    timer: Option<TimerId>,
}

/// Shared handle to one node's detection state machine.
#[derive(Clone)]
pub struct Detection {
    node: NodeKey,
    /// Handler slots this detector attaches and must detach on settlement.
    events: &'static [LoadEvent],
    machine: Rc<RefCell<Machine>>,
}

impl Detection {
    pub(crate) fn new(node: NodeKey, events: &'static [LoadEvent], completion: Completion) -> Self {
        Self {
            node,
            events,
            machine: Rc::new(RefCell::new(Machine {
                state: DetectorState::Pending,
                completion: Some(completion),
                timer: None,
            })),
        }
    }

    #[inline]
    pub const fn node(&self) -> NodeKey {
        self.node
    }

    #[inline]
    pub fn state(&self) -> DetectorState {
        self.machine.borrow().state
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state() == DetectorState::Pending
    }

    /// The transition function. Caches the trit on the node, cancels the
    /// timeout, detaches handlers, then runs the completion. Returns `false`
    /// when the machine had already settled.
    pub fn settle(&self, document: &Document, status: LoadStatus) -> bool {
        let (completion, timer) = {
            let mut machine = self.machine.borrow_mut();
            if machine.state != DetectorState::Pending {
                trace!("{} already settled; dropping {status}", self.node);
                return false;
            }
            machine.state = DetectorState::Settled(status);
            (machine.completion.take(), machine.timer.take())
        };
        if let Some(timer) = timer {
            document.event_loop().clear_timeout(timer);
        }
        if let Err(err) = document.set_status(self.node, status.cached()) {
            debug!("could not cache {status} on {}: {err}", self.node);
        }
        document.clear_handlers(self.node, self.events);
        debug!("{} settled: {status}", self.node);
        if let Some(completion) = completion {
            completion(status);
        }
        true
    }

    /// Cache fast path: if the node already carries a settled trit, replay
    /// it on the next tick. Returns `true` when the replay was scheduled.
    pub(crate) fn replay_cached(&self, document: &Document) -> bool {
        let Some(status) = LoadStatus::from_cached(document.status(self.node)) else {
            return false;
        };
        trace!("{} has cached status {status}; replaying next tick", self.node);
        self.settle_next_tick(document, status);
        true
    }

    /// Run `check` on the next tick if the machine is still pending then.
    pub(crate) fn next_tick(
        &self,
        document: &Document,
        check: impl FnOnce(&Document, &Self) + 'static,
    ) {
        let owner = document.clone();
        let detection = self.clone();
        document.event_loop().defer(move || {
            if detection.is_pending() {
                check(&owner, &detection);
            }
        });
    }

    pub(crate) fn settle_next_tick(&self, document: &Document, status: LoadStatus) {
        self.next_tick(document, move |owner, detection| {
            detection.settle(owner, status);
        });
    }

    /// Mark the node's cached trit as undetermined for this cycle.
    pub(crate) fn mark_pending(&self, document: &Document) {
        if let Err(err) = document.set_status(self.node, CachedStatus::Pending) {
            debug!("could not mark {} pending: {err}", self.node);
        }
    }

    /// Install `reaction` in each of the given handler slots.
    pub(crate) fn on(
        &self,
        document: &Document,
        events: &[LoadEvent],
        reaction: impl Fn(&Document, &Self) + 'static,
    ) {
        let detection = self.clone();
        let handler: EventHandler = Rc::new(move |owner: &Document, _node: NodeKey| {
            if detection.is_pending() {
                reaction(owner, &detection);
            }
        });
        for event in events {
            if let Err(err) = document.set_handler(self.node, *event, Some(Rc::clone(&handler))) {
                debug!("could not attach {event:?} to {}: {err}", self.node);
            }
        }
    }

    /// Start the timeout race when a positive deadline is configured.
    pub(crate) fn arm_timeout(&self, document: &Document, timeout: Option<Duration>) {
        let Some(delay) = timeout.filter(|delay| !delay.is_zero()) else {
            return;
        };
        let owner = document.clone();
        let detection = self.clone();
        let id = document.event_loop().set_timeout(delay, move || {
            detection.settle(&owner, LoadStatus::Timeout);
        });
        self.machine.borrow_mut().timer = Some(id);
        trace!("{} timeout armed for {delay:?}", self.node);
    }
}
