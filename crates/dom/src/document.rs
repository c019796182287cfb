//! Resource node store.
//!
//! [`Document`] is a cheap, cloneable handle over an `indextree` arena of
//! [`Element`]s addressed by [`NodeKey`]. Besides plain accessors it carries
//! the host-side simulation hooks (`finish_load`, `fail_load`, ...) that an
//! embedder or a test uses to play the network's part: they update the
//! native load state the way the active [`EngineQuirks`] profile would and
//! then fire the node's event handlers.
//!
//! No `RefCell` borrow is held while an event handler runs, so handlers may
//! re-enter the document freely.

use core::cell::RefCell;
use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use indextree::{Arena, Node, NodeId};
use log::{debug, trace};

use crate::data::NodeData;
use crate::element::{CachedStatus, Element, LoadEvent, RuntimeStyle, Size};
use crate::event_loop::EventLoop;
use crate::quirks::EngineQuirks;
use crate::selector::Selector;
use crate::NodeKey;

/// Placeholder size the legacy engine renders for a broken image.
pub const LEGACY_BROKEN_PLACEHOLDER: Size = Size::new(28, 30);

/// Native event handler slot value (`onload`, `onerror`, ...).
pub type EventHandler = Rc<dyn Fn(&Document, NodeKey)>;

struct DocumentState {
    arena: Arena<Element>,
    ids: HashMap<NodeKey, NodeId>,
    next_key: u64,
    quirks: EngineQuirks,
}

impl DocumentState {
    fn element(&self, node: NodeKey) -> Result<&Element> {
        let id = self
            .ids
            .get(&node)
            .ok_or_else(|| anyhow!("unknown node {node}"))?;
        self.arena
            .get(*id)
            .map(Node::get)
            .ok_or_else(|| anyhow!("node {node} was removed"))
    }

    fn element_mut(&mut self, node: NodeKey) -> Result<&mut Element> {
        let id = *self
            .ids
            .get(&node)
            .ok_or_else(|| anyhow!("unknown node {node}"))?;
        self.arena
            .get_mut(id)
            .map(Node::get_mut)
            .ok_or_else(|| anyhow!("node {node} was removed"))
    }
}

/// Shared handle to a document, its node data store and its event loop.
#[derive(Clone)]
pub struct Document {
    state: Rc<RefCell<DocumentState>>,
    data: NodeData,
    event_loop: EventLoop,
}

impl fmt::Debug for Document {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        formatter
            .debug_struct("Document")
            .field("nodes", &state.ids.len())
            .field("quirks", &state.quirks)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(EngineQuirks::default())
    }
}

impl Document {
    /// Create an empty document whose nodes behave per `quirks`.
    #[must_use]
    pub fn new(quirks: EngineQuirks) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(Element::new(NodeKey::ROOT, "#document"));
        let mut ids = HashMap::new();
        ids.insert(NodeKey::ROOT, root);
        Self {
            state: Rc::new(RefCell::new(DocumentState {
                arena,
                ids,
                next_key: 1,
                quirks,
            })),
            data: NodeData::new(),
            event_loop: EventLoop::new(),
        }
    }

    #[inline]
    pub fn quirks(&self) -> EngineQuirks {
        self.state.borrow().quirks
    }

    /// The node-associated data store.
    #[inline]
    pub const fn data(&self) -> &NodeData {
        &self.data
    }

    /// The host timer facility.
    #[inline]
    pub const fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    #[inline]
    pub const fn root(&self) -> NodeKey {
        NodeKey::ROOT
    }

    pub fn contains(&self, node: NodeKey) -> bool {
        self.state.borrow().element(node).is_ok()
    }

    // ============================
    // Tree construction
    // ============================

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeKey {
        let mut state = self.state.borrow_mut();
        let key = NodeKey(state.next_key);
        state.next_key = state.next_key.saturating_add(1);
        let mut element = Element::new(key, tag);
        if state.quirks.ready_state && is_resource_tag(&element.tag) {
            element.ready_state = Some(String::from("uninitialized"));
        }
        let id = state.arena.new_node(element);
        state.ids.insert(key, id);
        trace!("created <{tag}> as {key}");
        key
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let parent_id = *state
            .ids
            .get(&parent)
            .ok_or_else(|| anyhow!("unknown parent {parent}"))?;
        let child_id = *state
            .ids
            .get(&child)
            .ok_or_else(|| anyhow!("unknown child {child}"))?;
        parent_id
            .checked_append(child_id, &mut state.arena)
            .map_err(|err| anyhow!("cannot append {child} to {parent}: {err}"))
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&self, parent: NodeKey, tag: &str) -> Result<NodeKey> {
        let key = self.create_element(tag);
        self.append_child(parent, key)?;
        Ok(key)
    }

    /// Remove `node` and its subtree, dropping their handlers and data.
    pub fn remove(&self, node: NodeKey) -> Result<()> {
        if node == NodeKey::ROOT {
            return Err(anyhow!("the document root cannot be removed"));
        }
        let removed: Vec<NodeKey> = {
            let mut state = self.state.borrow_mut();
            let id = *state
                .ids
                .get(&node)
                .ok_or_else(|| anyhow!("unknown node {node}"))?;
            let keys: Vec<NodeKey> = id
                .descendants(&state.arena)
                .filter_map(|desc| state.arena.get(desc).map(|entry| entry.get().key))
                .collect();
            id.remove_subtree(&mut state.arena);
            for key in &keys {
                state.ids.remove(key);
            }
            keys
        };
        for key in removed {
            self.data.remove_node(key);
        }
        debug!("removed {node} and its subtree");
        Ok(())
    }

    /// Nodes under `context` (default: the root) matching `selector`, in
    /// document order. The context node itself is not included.
    pub fn query(&self, selector: &str, context: Option<NodeKey>) -> Result<Vec<NodeKey>> {
        let parsed = Selector::parse(selector)?;
        let state = self.state.borrow();
        let scope = context.unwrap_or(NodeKey::ROOT);
        let id = *state
            .ids
            .get(&scope)
            .ok_or_else(|| anyhow!("unknown context {scope}"))?;
        Ok(id
            .descendants(&state.arena)
            .skip(1)
            .filter_map(|desc| state.arena.get(desc).map(Node::get))
            .filter(|element| parsed.matches(element))
            .map(|element| element.key)
            .collect())
    }

    // ============================
    // Element accessors
    // ============================

    pub fn tag(&self, node: NodeKey) -> Option<String> {
        self.state
            .borrow()
            .element(node)
            .ok()
            .map(|element| element.tag.clone())
    }

    pub fn attribute(&self, node: NodeKey, name: &str) -> Option<String> {
        let state = self.state.borrow();
        state
            .element(node)
            .ok()
            .and_then(|element| element.attribute(name).map(str::to_owned))
    }

    pub fn set_attribute(&self, node: NodeKey, name: &str, value: &str) -> Result<()> {
        self.state
            .borrow_mut()
            .element_mut(node)?
            .set_attribute(name, value);
        Ok(())
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&self, node: NodeKey, name: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .borrow_mut()
            .element_mut(node)?
            .remove_attribute(name))
    }

    /// Legacy `readyState`; `None` when the engine does not expose one.
    pub fn ready_state(&self, node: NodeKey) -> Option<String> {
        let state = self.state.borrow();
        state
            .element(node)
            .ok()
            .and_then(|element| element.ready_state.clone())
    }

    pub fn set_ready_state(&self, node: NodeKey, ready_state: Option<&str>) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.ready_state = ready_state.map(str::to_owned);
        Ok(())
    }

    /// Native `complete` flag.
    pub fn is_complete(&self, node: NodeKey) -> bool {
        self.state
            .borrow()
            .element(node)
            .is_ok_and(|element| element.complete)
    }

    pub fn set_complete(&self, node: NodeKey, complete: bool) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.complete = complete;
        Ok(())
    }

    /// Rendered size as the engine would report through `width`/`height`.
    pub fn rendered_size(&self, node: NodeKey) -> Result<Size> {
        Ok(self.state.borrow().element(node)?.rendered_size())
    }

    /// Set the size of the fetched resource without firing any event.
    pub fn set_intrinsic_size(&self, node: NodeKey, size: Option<Size>) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.intrinsic = size;
        Ok(())
    }

    /// Natural-size accessor: native on engines that have one, otherwise
    /// whatever normalization stored. `None` means the accessor is absent.
    pub fn natural_size(&self, node: NodeKey) -> Option<Size> {
        let state = self.state.borrow();
        let element = state.element(node).ok()?;
        if state.quirks.native_natural_size {
            Some(if element.complete {
                element.intrinsic.unwrap_or_default()
            } else {
                Size::ZERO
            })
        } else {
            element.synthetic_natural
        }
    }

    /// Store a synthetic natural size on engines without the native accessor.
    pub fn set_synthetic_natural_size(&self, node: NodeKey, size: Size) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.synthetic_natural = Some(size);
        Ok(())
    }

    pub fn runtime_style(&self, node: NodeKey) -> Result<RuntimeStyle> {
        Ok(self.state.borrow().element(node)?.runtime_style.clone())
    }

    pub fn set_runtime_style(&self, node: NodeKey, style: RuntimeStyle) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.runtime_style = style;
        Ok(())
    }

    /// Cached tri-state load status; unknown nodes read as pending.
    pub fn status(&self, node: NodeKey) -> CachedStatus {
        self.state
            .borrow()
            .element(node)
            .map(|element| element.status)
            .unwrap_or_default()
    }

    pub fn set_status(&self, node: NodeKey, status: CachedStatus) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.status = status;
        Ok(())
    }

    // ============================
    // Event handlers
    // ============================

    pub fn set_handler(
        &self,
        node: NodeKey,
        event: LoadEvent,
        handler: Option<EventHandler>,
    ) -> Result<()> {
        self.state.borrow_mut().element_mut(node)?.handlers[event.slot()] = handler;
        Ok(())
    }

    pub fn has_handler(&self, node: NodeKey, event: LoadEvent) -> bool {
        self.state
            .borrow()
            .element(node)
            .is_ok_and(|element| element.handlers[event.slot()].is_some())
    }

    /// Null out the given handler slots. Unknown nodes are ignored.
    pub fn clear_handlers(&self, node: NodeKey, events: &[LoadEvent]) {
        if let Ok(element) = self.state.borrow_mut().element_mut(node) {
            for event in events {
                element.handlers[event.slot()] = None;
            }
        }
    }

    /// Fire `event` on `node`. Returns `true` if a handler ran.
    pub fn dispatch(&self, node: NodeKey, event: LoadEvent) -> bool {
        let handler = self
            .state
            .borrow()
            .element(node)
            .ok()
            .and_then(|element| element.handlers[event.slot()].clone());
        trace!("dispatch {event:?} on {node} (handler: {})", handler.is_some());
        let Some(callback) = handler else {
            return false;
        };
        callback(self, node);
        true
    }

    // ============================
    // Network simulation
    // ============================

    /// The resource finished loading with the given intrinsic size.
    pub fn finish_load(&self, node: NodeKey, size: Size) -> Result<()> {
        let legacy = {
            let mut state = self.state.borrow_mut();
            let legacy = state.quirks.ready_state;
            let element = state.element_mut(node)?;
            element.intrinsic = Some(size);
            element.complete = true;
            if legacy {
                let done = if element.tag == "script" { "loaded" } else { "complete" };
                element.ready_state = Some(String::from(done));
            }
            legacy
        };
        debug!("{node} finished loading at {}x{}", size.width, size.height);
        if legacy {
            self.dispatch(node, LoadEvent::ReadyStateChange);
        }
        self.dispatch(node, LoadEvent::Load);
        Ok(())
    }

    /// The resource failed to load.
    pub fn fail_load(&self, node: NodeKey) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            let legacy = state.quirks.ready_state;
            let element = state.element_mut(node)?;
            if legacy {
                element.ready_state = Some(String::from("uninitialized"));
                element.intrinsic = (element.tag == "img").then_some(LEGACY_BROKEN_PLACEHOLDER);
            } else {
                element.intrinsic = None;
                element.complete = true;
            }
        }
        debug!("{node} failed to load");
        self.dispatch(node, LoadEvent::Error);
        Ok(())
    }

    /// The fetch was aborted before completion.
    pub fn abort_load(&self, node: NodeKey) -> Result<()> {
        self.state.borrow().element(node)?;
        debug!("{node} load aborted");
        self.dispatch(node, LoadEvent::Abort);
        Ok(())
    }

    /// Forget all native load state, as if the resource source changed.
    pub fn reset_resource(&self, node: NodeKey) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let legacy = state.quirks.ready_state;
        let element = state.element_mut(node)?;
        element.complete = false;
        element.intrinsic = None;
        element.synthetic_natural = None;
        element.status = CachedStatus::Pending;
        if legacy && is_resource_tag(&element.tag) {
            element.ready_state = Some(String::from("loading"));
        }
        Ok(())
    }
}

fn is_resource_tag(tag: &str) -> bool {
    matches!(tag, "img" | "iframe" | "script")
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn query_returns_document_order_within_context() {
        let doc = Document::default();
        let gallery = doc.append_element(doc.root(), "div").expect("div");
        let first = doc.append_element(gallery, "img").expect("img");
        let frame = doc.append_element(doc.root(), "iframe").expect("iframe");
        let second = doc.append_element(gallery, "img").expect("img");

        assert_eq!(doc.query("img", None).expect("query"), vec![first, second]);
        assert_eq!(
            doc.query("iframe, img", None).expect("query"),
            vec![first, second, frame]
        );
        assert_eq!(doc.query("*", Some(gallery)).expect("query"), vec![first, second]);
        assert!(doc.query("img", Some(NodeKey(999))).is_err());
    }

    #[test]
    fn dispatch_runs_handler_without_holding_borrows() {
        let doc = Document::default();
        let img = doc.create_element("img");
        let fired = Rc::new(Cell::new(0_u32));
        let seen = Rc::clone(&fired);
        let handler: EventHandler = Rc::new(move |owner: &Document, node: NodeKey| {
            seen.set(seen.get() + 1);
            owner.clear_handlers(node, &LoadEvent::ALL);
            owner.set_status(node, CachedStatus::Success).expect("status");
        });
        doc.set_handler(img, LoadEvent::Load, Some(handler)).expect("handler");
        assert!(doc.dispatch(img, LoadEvent::Load));
        assert!(!doc.dispatch(img, LoadEvent::Load));
        assert_eq!(fired.get(), 1);
        assert_eq!(doc.status(img), CachedStatus::Success);
    }

    #[test]
    fn legacy_profile_tracks_ready_state_and_placeholder() {
        let doc = Document::new(EngineQuirks::LEGACY);
        let img = doc.create_element("img");
        let script = doc.create_element("script");
        assert_eq!(doc.ready_state(img).as_deref(), Some("uninitialized"));

        doc.fail_load(img).expect("fail");
        assert_eq!(doc.rendered_size(img).expect("size"), LEGACY_BROKEN_PLACEHOLDER);
        assert!(!doc.is_complete(img));

        doc.finish_load(script, Size::ZERO).expect("finish");
        assert_eq!(doc.ready_state(script).as_deref(), Some("loaded"));
    }

    #[test]
    fn modern_profile_exposes_native_natural_size() {
        let doc = Document::new(EngineQuirks::MODERN);
        let img = doc.create_element("img");
        assert_eq!(doc.ready_state(img), None);
        assert_eq!(doc.natural_size(img), Some(Size::ZERO));
        doc.set_attribute(img, "width", "10").expect("attr");
        doc.finish_load(img, Size::new(64, 48)).expect("finish");
        assert_eq!(doc.natural_size(img), Some(Size::new(64, 48)));
        assert_eq!(doc.rendered_size(img).expect("size"), Size::new(10, 48));

        doc.reset_resource(img).expect("reset");
        assert!(!doc.is_complete(img));
        assert_eq!(doc.natural_size(img), Some(Size::ZERO));
    }

    #[test]
    fn remove_drops_subtree_and_data() {
        let doc = Document::default();
        let wrapper = doc.append_element(doc.root(), "div").expect("div");
        let img = doc.append_element(wrapper, "img").expect("img");
        doc.data().set(img, "marker", 1_u8);
        doc.remove(wrapper).expect("remove");
        assert!(!doc.contains(img));
        assert!(doc.data().is_empty());
        assert!(doc.set_attribute(img, "width", "1").is_err());
        assert!(doc.remove(NodeKey::ROOT).is_err());
    }
}
