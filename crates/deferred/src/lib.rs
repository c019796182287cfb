//! Single-threaded deferred/promise primitive.
//!
//! A [`Deferred`] settles at most once, either resolved or rejected, and runs
//! the callbacks registered for that outcome in registration order. Callbacks
//! registered after settlement run immediately. Values are cloned out of the
//! shared cell before any callback runs, so callbacks may freely register
//! further callbacks or settle other deferreds.

#![allow(
    clippy::module_name_repetitions,
    reason = "Deferred/Promise naming mirrors the host API it models"
)]

use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use std::rc::Rc;

use log::trace;
use tokio::sync::oneshot;

/// Settlement state of a [`Deferred`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeferredState {
    Pending,
    Resolved,
    Rejected,
}

/// A settled value, tagged with the path it took.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome<T> {
    Resolved(T),
    Rejected(T),
}

impl<T> Outcome<T> {
    /// Borrow the carried value regardless of path.
    #[inline]
    pub const fn value(&self) -> &T {
        match self {
            Self::Resolved(value) | Self::Rejected(value) => value,
        }
    }

    /// Returns `true` for the resolve path.
    #[inline]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Which outcome a registered callback listens for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Listen {
    Done,
    Fail,
    Always,
}

impl Listen {
    const fn accepts(self, state: DeferredState) -> bool {
        match self {
            Self::Done => matches!(state, DeferredState::Resolved),
            Self::Fail => matches!(state, DeferredState::Rejected),
            Self::Always => !matches!(state, DeferredState::Pending),
        }
    }
}

type Callback<T> = Box<dyn FnOnce(&T)>;

struct Inner<T> {
    state: DeferredState,
    value: Option<T>,
    callbacks: Vec<(Listen, Callback<T>)>,
}

/// A settle-once value with resolve/reject callback lists.
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        formatter
            .debug_struct("Deferred")
            .field("state", &inner.state)
            .field("callbacks", &inner.callbacks.len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Create a pending deferred.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: DeferredState::Pending,
                value: None,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Current settlement state.
    #[inline]
    pub fn state(&self) -> DeferredState {
        self.inner.borrow().state
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.state() == DeferredState::Resolved
    }

    #[inline]
    pub fn is_rejected(&self) -> bool {
        self.state() == DeferredState::Rejected
    }

    /// Resolve with `value`. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(DeferredState::Resolved, value)
    }

    /// Reject with `value`. Returns `false` if already settled.
    pub fn reject(&self, value: T) -> bool {
        self.settle(DeferredState::Rejected, value)
    }

    fn settle(&self, state: DeferredState, value: T) -> bool {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != DeferredState::Pending {
                trace!("deferred already {:?}; ignoring {state:?}", inner.state);
                return false;
            }
            inner.state = state;
            inner.value = Some(value.clone());
            core::mem::take(&mut inner.callbacks)
        };
        for (listen, callback) in callbacks {
            if listen.accepts(state) {
                callback(&value);
            }
        }
        true
    }

    fn register(&self, listen: Listen, callback: Callback<T>) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == DeferredState::Pending {
                inner.callbacks.push((listen, callback));
                return;
            }
            if !listen.accepts(inner.state) {
                return;
            }
            inner.value.clone()
        };
        if let Some(value) = settled {
            callback(&value);
        }
    }

    /// Run `callback` when resolved.
    pub fn done(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        self.register(Listen::Done, Box::new(callback));
        self
    }

    /// Run `callback` when rejected.
    pub fn fail(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        self.register(Listen::Fail, Box::new(callback));
        self
    }

    /// Run `callback` on either outcome.
    pub fn always(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        self.register(Listen::Always, Box::new(callback));
        self
    }

    /// Register a resolve and a reject callback in one call.
    pub fn then(
        &self,
        on_done: impl FnOnce(&T) + 'static,
        on_fail: impl FnOnce(&T) + 'static,
    ) -> &Self {
        self.done(on_done).fail(on_fail)
    }

    /// A registration-only view of this deferred.
    #[inline]
    #[must_use]
    pub fn promise(&self) -> Promise<T> {
        Promise {
            deferred: self.clone(),
        }
    }

    /// Future that yields the outcome once settled, or `None` if every
    /// handle to this deferred was dropped while still pending.
    pub fn settled(&self) -> impl Future<Output = Option<Outcome<T>>> + use<T> {
        let (sender, receiver) = oneshot::channel();
        let slot = Rc::new(RefCell::new(Some(sender)));
        let on_fail = Rc::clone(&slot);
        self.then(
            move |value: &T| send_outcome(&slot, Outcome::Resolved(value.clone())),
            move |value: &T| send_outcome(&on_fail, Outcome::Rejected(value.clone())),
        );
        async move { receiver.await.ok() }
    }
}

fn send_outcome<T>(slot: &RefCell<Option<oneshot::Sender<Outcome<T>>>>, outcome: Outcome<T>) {
    if let Some(sender) = slot.borrow_mut().take()
        && sender.send(outcome).is_err()
    {
        trace!("settled() receiver dropped before outcome arrived");
    }
}

/// Registration-only handle onto a [`Deferred`]; cannot settle it.
pub struct Promise<T> {
    deferred: Deferred<T>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Promise")
            .field(&self.deferred)
            .finish()
    }
}

impl<T: Clone + 'static> Promise<T> {
    #[inline]
    pub fn state(&self) -> DeferredState {
        self.deferred.state()
    }

    pub fn done(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        self.deferred.done(callback);
        self
    }

    pub fn fail(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        self.deferred.fail(callback);
        self
    }

    pub fn always(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        self.deferred.always(callback);
        self
    }

    pub fn then(
        &self,
        on_done: impl FnOnce(&T) + 'static,
        on_fail: impl FnOnce(&T) + 'static,
    ) -> &Self {
        self.deferred.then(on_done, on_fail);
        self
    }

    pub fn settled(&self) -> impl Future<Output = Option<Outcome<T>>> + use<T> {
        self.deferred.settled()
    }
}
