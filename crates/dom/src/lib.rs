//! Host-side DOM primitives for resource load-state detection.
//!
//! This crate owns everything the detection engine treats as external: the
//! resource node store ([`Document`]), per-engine quirk profiles, the
//! node-associated data side-table ([`NodeData`]), the single-threaded timer
//! facility ([`EventLoop`]), and a minimal selector query layer.

#![allow(
    clippy::module_name_repetitions,
    reason = "Types like EngineQuirks and NodeData read better than bare names"
)]
#![allow(clippy::missing_errors_doc, reason = "Errors are uniform unknown-node failures")]

use core::fmt;

pub mod data;
pub mod document;
pub mod element;
pub mod event_loop;
pub mod quirks;
pub mod selector;

pub use data::NodeData;
pub use document::{Document, EventHandler, LEGACY_BROKEN_PLACEHOLDER};
pub use element::{CachedStatus, LoadEvent, RuntimeStyle, Size};
pub use event_loop::{EventLoop, TimerId};
pub use quirks::EngineQuirks;
pub use selector::Selector;

// ============================
// Stable Node keys
// ============================

/// A 64-bit stable key for DOM nodes used to correlate asynchronous callbacks.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// The document root key (always present).
    pub const ROOT: Self = Self(0);
}

impl fmt::Display for NodeKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}
