//! Deferred aggregator facade.
//!
//! [`Loader::loaded`] starts at most one detection cycle per node and hands
//! back a [`LoadedSet`] whose registration methods fan out to every node's
//! deferred pair. The pair lives in the document's node data store under
//! [`RESULT_DEFERRED`] and [`COMPLETE_DEFERRED`] until the cycle settles.

use core::cell::RefCell;
use core::fmt;
use core::time::Duration;
use std::rc::Rc;

use anyhow::{Context as _, Result};
use deferred::Deferred;
use dom::{Document, NodeKey};
use futures::future::join_all;
use log::{debug, trace};
use tracing::info_span;

use crate::classify::ResourceKind;
use crate::config::LoadedConfig;
use crate::detect::Completion;
use crate::status::LoadStatus;
use crate::telemetry::{DetectionStats, maybe_emit};

/// Data key of the deferred resolved on success, rejected otherwise.
pub const RESULT_DEFERRED: &str = "*loaded*Deferred";
/// Data key of the deferred always resolved with the terminal status.
pub const COMPLETE_DEFERRED: &str = "*loaded*completeDeferred";

/// Value carried by both deferreds of a pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Settlement {
    pub node: NodeKey,
    pub status: LoadStatus,
}

/// Callback shared across every node of a set.
pub type LoadCallback = Rc<dyn Fn(&Settlement)>;

/// Registration methods forwarded to each node's result deferred.
/// `then` is not listed; it registers through `Done` and `Fail`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegistrationMethod {
    Done,
    Fail,
    Always,
}

impl RegistrationMethod {
    pub const ALL: [Self; 3] = [Self::Done, Self::Fail, Self::Always];

    fn attach(self, deferred: &Deferred<Settlement>, callback: LoadCallback) {
        let call = move |settlement: &Settlement| callback(settlement);
        match self {
            Self::Done => deferred.done(call),
            Self::Fail => deferred.fail(call),
            Self::Always => deferred.always(call),
        };
    }
}

/// Callbacks and timeout for one [`Loader::loaded`] call.
#[derive(Clone, Default)]
pub struct LoadOptions {
    complete: Option<LoadCallback>,
    success: Option<LoadCallback>,
    error: Option<LoadCallback>,
    timeout: Option<Duration>,
}

impl LoadOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per node with the terminal status.
    #[must_use]
    pub fn complete(mut self, callback: impl Fn(&Settlement) + 'static) -> Self {
        self.complete = Some(Rc::new(callback));
        self
    }

    #[must_use]
    pub fn success(mut self, callback: impl Fn(&Settlement) + 'static) -> Self {
        self.success = Some(Rc::new(callback));
        self
    }

    /// Called for `error` and `timeout`.
    #[must_use]
    pub fn error(mut self, callback: impl Fn(&Settlement) + 'static) -> Self {
        self.error = Some(Rc::new(callback));
        self
    }

    /// Deadline for cycles started by this call. Zero means none.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoadOptions")
            .field("complete", &self.complete.is_some())
            .field("success", &self.success.is_some())
            .field("error", &self.error.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Entry point: owns the document handle, configuration, and counters.
#[derive(Clone, Debug)]
pub struct Loader {
    document: Document,
    config: LoadedConfig,
    stats: Rc<RefCell<DetectionStats>>,
}

impl Loader {
    #[inline]
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self::with_config(document, LoadedConfig::default())
    }

    #[must_use]
    pub fn with_config(document: Document, config: LoadedConfig) -> Self {
        Self {
            document,
            config,
            stats: Rc::new(RefCell::new(DetectionStats::default())),
        }
    }

    /// Loader configured from `LOADED_*` environment variables.
    #[must_use]
    pub fn from_env(document: Document) -> Self {
        Self::with_config(document, LoadedConfig::from_env())
    }

    #[inline]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    pub const fn config(&self) -> &LoadedConfig {
        &self.config
    }

    /// Snapshot of the counters.
    #[inline]
    pub fn stats(&self) -> DetectionStats {
        *self.stats.borrow()
    }

    /// Start detection on `nodes` and register `options` on the result.
    ///
    /// Nodes with an active cycle keep it; the options' timeout does not
    /// apply to them. Unsupported nodes are carried in the set but never
    /// fire anything.
    pub fn loaded(&self, nodes: &[NodeKey], options: LoadOptions) -> LoadedSet {
        let _span = info_span!("loaded.dispatch", nodes = nodes.len()).entered();
        let timeout = options.timeout.or_else(|| self.config.default_timeout());
        for node in nodes {
            self.begin_cycle(*node, timeout);
        }

        let set = LoadedSet {
            document: self.document.clone(),
            nodes: nodes.to_vec(),
        };
        if let Some(callback) = options.success {
            set.register(RegistrationMethod::Done, callback);
        }
        if let Some(callback) = options.error {
            set.register(RegistrationMethod::Fail, callback);
        }
        if let Some(callback) = options.complete {
            set.register_complete(callback);
        }
        set
    }

    /// Query `selector` (optionally within `context`) and run [`Self::loaded`]
    /// on the matches.
    ///
    /// # Errors
    /// Returns an error if the selector does not parse or `context` is unknown.
    pub fn select(
        &self,
        selector: &str,
        context: Option<NodeKey>,
        options: LoadOptions,
    ) -> Result<LoadedSet> {
        let nodes = self
            .document
            .query(selector, context)
            .with_context(|| format!("selecting {selector:?}"))?;
        Ok(self.loaded(&nodes, options))
    }

    fn begin_cycle(&self, node: NodeKey, timeout: Option<Duration>) {
        let data = self.document.data();
        if data.contains(node, COMPLETE_DEFERRED) {
            trace!("{node} already has an active cycle");
            return;
        }
        let kind = ResourceKind::of(&self.document, node);
        let Some(detector) = kind.detector() else {
            trace!("{node} is not a resource node; ignoring");
            self.stats.borrow_mut().ignored += 1;
            return;
        };

        let result = Deferred::<Settlement>::new();
        let complete = Deferred::<Settlement>::new();
        data.set(node, RESULT_DEFERRED, result.clone());
        data.set(node, COMPLETE_DEFERRED, complete.clone());
        {
            let mut stats = self.stats.borrow_mut();
            stats.cycles_started += 1;
            if self.document.status(node).is_settled() {
                stats.cache_hits += 1;
            }
        }
        debug!("{node} starting {kind:?} detection (timeout {timeout:?})");

        let store = data.clone();
        let stats = Rc::clone(&self.stats);
        let telemetry = self.config.telemetry_enabled;
        let completion: Completion = Box::new(move |status| {
            let settlement = Settlement { node, status };
            if status.is_success() {
                result.resolve(settlement);
            } else {
                result.reject(settlement);
            }
            complete.resolve(settlement);
            store.remove(node, RESULT_DEFERRED);
            store.remove(node, COMPLETE_DEFERRED);
            let snapshot = {
                let mut counters = stats.borrow_mut();
                counters.record(status);
                *counters
            };
            maybe_emit(telemetry, &snapshot);
        });
        detector(&self.document, node, completion, timeout);
    }
}

/// Ordered node sequence returned by [`Loader::loaded`].
#[derive(Clone, Debug)]
pub struct LoadedSet {
    document: Document,
    nodes: Vec<NodeKey>,
}

impl LoadedSet {
    #[inline]
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn pair_member(&self, node: NodeKey, key: &'static str) -> Option<Deferred<Settlement>> {
        self.document.data().get::<Deferred<Settlement>>(node, key)
    }

    /// Forward `callback` to every node's result deferred via `method`.
    /// Nodes without an active pair are skipped.
    pub fn register(&self, method: RegistrationMethod, callback: LoadCallback) -> &Self {
        for node in &self.nodes {
            if let Some(deferred) = self.pair_member(*node, RESULT_DEFERRED) {
                method.attach(&deferred, Rc::clone(&callback));
            }
        }
        self
    }

    fn register_complete(&self, callback: LoadCallback) -> &Self {
        for node in &self.nodes {
            if let Some(deferred) = self.pair_member(*node, COMPLETE_DEFERRED) {
                RegistrationMethod::Done.attach(&deferred, Rc::clone(&callback));
            }
        }
        self
    }

    pub fn done(&self, callback: impl Fn(&Settlement) + 'static) -> &Self {
        self.register(RegistrationMethod::Done, Rc::new(callback))
    }

    /// Runs for `error` and `timeout`.
    pub fn fail(&self, callback: impl Fn(&Settlement) + 'static) -> &Self {
        self.register(RegistrationMethod::Fail, Rc::new(callback))
    }

    pub fn always(&self, callback: impl Fn(&Settlement) + 'static) -> &Self {
        self.register(RegistrationMethod::Always, Rc::new(callback))
    }

    pub fn then(
        &self,
        on_done: impl Fn(&Settlement) + 'static,
        on_fail: impl Fn(&Settlement) + 'static,
    ) -> &Self {
        self.done(on_done).fail(on_fail)
    }

    /// Alias of [`Self::done`].
    pub fn success(&self, callback: impl Fn(&Settlement) + 'static) -> &Self {
        self.done(callback)
    }

    /// Alias of [`Self::fail`].
    pub fn error(&self, callback: impl Fn(&Settlement) + 'static) -> &Self {
        self.fail(callback)
    }

    /// Runs once per node with whatever status ends its cycle.
    pub fn complete(&self, callback: impl Fn(&Settlement) + 'static) -> &Self {
        self.register_complete(Rc::new(callback))
    }

    /// Future of the settlements of every node that has an active cycle now,
    /// in node order. The document's event loop still has to be driven.
    pub fn settled(&self) -> impl Future<Output = Vec<Settlement>> + use<> {
        let pending: Vec<_> = self
            .nodes
            .iter()
            .filter_map(|node| self.pair_member(*node, COMPLETE_DEFERRED))
            .map(|deferred| deferred.settled())
            .collect();
        async move {
            join_all(pending)
                .await
                .into_iter()
                .flatten()
                .map(|outcome| *outcome.value())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::{EngineQuirks, Size};

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> LoadCallback) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |label: &'static str| -> LoadCallback {
            let inner = Rc::clone(&sink);
            Rc::new(move |settlement: &Settlement| {
                inner
                    .borrow_mut()
                    .push(format!("{label}:{}", settlement.status));
            })
        };
        (log, make)
    }

    #[test]
    fn pair_lives_until_completion() {
        let doc = Document::new(EngineQuirks::MODERN);
        let img = doc.append_element(doc.root(), "img").expect("img");
        let loader = Loader::new(doc.clone());
        let set = loader.loaded(&[img], LoadOptions::new());
        assert_eq!(set.len(), 1);
        assert!(doc.data().contains(img, RESULT_DEFERRED));
        assert!(doc.data().contains(img, COMPLETE_DEFERRED));

        doc.finish_load(img, Size::new(5, 5)).expect("load");
        assert!(!doc.data().contains(img, RESULT_DEFERRED));
        assert!(!doc.data().contains(img, COMPLETE_DEFERRED));
        assert_eq!(loader.stats().successes, 1);
    }

    #[test]
    fn registration_methods_fan_out() {
        let doc = Document::new(EngineQuirks::MODERN);
        let first = doc.append_element(doc.root(), "iframe").expect("iframe");
        let second = doc.append_element(doc.root(), "script").expect("script");
        let loader = Loader::new(doc.clone());
        let set = loader.loaded(&[first, second], LoadOptions::new());
        let (log, make) = recorder();
        for method in RegistrationMethod::ALL {
            set.register(method, make(match method {
                RegistrationMethod::Done => "done",
                RegistrationMethod::Fail => "fail",
                RegistrationMethod::Always => "always",
            }));
        }
        doc.finish_load(first, Size::ZERO).expect("load");
        doc.abort_load(second).expect("abort");
        assert_eq!(
            *log.borrow(),
            vec!["done:success", "always:success", "fail:error", "always:error"]
        );
    }

    #[test]
    fn registration_without_pair_is_silent() {
        let doc = Document::new(EngineQuirks::MODERN);
        let div = doc.append_element(doc.root(), "div").expect("div");
        let loader = Loader::new(doc.clone());
        let set = loader.loaded(&[div], LoadOptions::new());
        let (log, make) = recorder();
        set.register(RegistrationMethod::Always, make("always"));
        doc.event_loop().run_until_idle();
        assert!(log.borrow().is_empty());
        assert_eq!(loader.stats().ignored, 1);
        assert_eq!(loader.stats().cycles_started, 0);
    }

    #[test]
    fn default_timeout_comes_from_config() {
        let doc = Document::new(EngineQuirks::MODERN);
        let frame = doc.append_element(doc.root(), "iframe").expect("iframe");
        let loader = Loader::with_config(doc.clone(), LoadedConfig::new(Some(20), false));
        let (log, make) = recorder();
        let set = loader.loaded(&[frame], LoadOptions::new());
        set.register(RegistrationMethod::Fail, make("fail"));
        doc.event_loop().advance(Duration::from_millis(19));
        assert!(log.borrow().is_empty());
        doc.event_loop().advance(Duration::from_millis(1));
        assert_eq!(*log.borrow(), vec!["fail:timeout"]);
        assert_eq!(loader.stats().timeouts, 1);
    }

    #[test]
    fn then_registers_through_done_and_fail() {
        let doc = Document::new(EngineQuirks::MODERN);
        let img = doc.append_element(doc.root(), "img").expect("img");
        let frame = doc.append_element(doc.root(), "iframe").expect("iframe");
        let loader = Loader::new(doc.clone());
        let set = loader.loaded(&[img, frame], LoadOptions::new());
        let (log, make) = recorder();
        let on_done = make("then-done");
        let on_fail = make("then-fail");
        set.then(
            move |settlement: &Settlement| on_done(settlement),
            move |settlement: &Settlement| on_fail(settlement),
        );
        doc.finish_load(img, Size::new(4, 4)).expect("load");
        doc.fail_load(frame).expect("fail");
        assert_eq!(*log.borrow(), vec!["then-done:success", "then-fail:error"]);
    }
}
