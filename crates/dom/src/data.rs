//! Node-associated data side-table.
//!
//! Values are keyed by `(NodeKey, name)` and stored type-erased, so callers
//! can attach arbitrary per-node records without the node owning them.

use core::any::Any;
use core::cell::RefCell;
use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;

use crate::NodeKey;

/// Shared handle to the per-document data store.
#[derive(Clone, Default)]
pub struct NodeData {
    entries: Rc<RefCell<HashMap<(NodeKey, &'static str), Rc<dyn Any>>>>,
}

impl fmt::Debug for NodeData {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NodeData")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

impl NodeData {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a clone of the value stored under `name`, if it has type `T`.
    pub fn get<T: Clone + 'static>(&self, node: NodeKey, name: &'static str) -> Option<T> {
        let entry = self.entries.borrow().get(&(node, name)).map(Rc::clone)?;
        entry.downcast_ref::<T>().cloned()
    }

    /// Store `value` under `name`, replacing any previous value.
    pub fn set<T: 'static>(&self, node: NodeKey, name: &'static str, value: T) {
        self.entries
            .borrow_mut()
            .insert((node, name), Rc::new(value));
    }

    /// Remove the value under `name`. Returns `true` if one was present.
    pub fn remove(&self, node: NodeKey, name: &'static str) -> bool {
        self.entries.borrow_mut().remove(&(node, name)).is_some()
    }

    #[inline]
    pub fn contains(&self, node: NodeKey, name: &'static str) -> bool {
        self.entries.borrow().contains_key(&(node, name))
    }

    /// Drop every value attached to `node`.
    pub fn remove_node(&self, node: NodeKey) {
        self.entries.borrow_mut().retain(|(owner, _), _| *owner != node);
    }

    /// Number of stored values across all nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
