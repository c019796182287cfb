//! Image detector.
//!
//! Signals, in order of precedence: the cached trit, the legacy
//! `readyState` (with the 28x30 broken-image sentinel), the native
//! `complete` flag validated by size, and finally the load/abort/error
//! events raced against an optional timeout.

use core::time::Duration;

use dom::{Document, LEGACY_BROKEN_PLACEHOLDER, LoadEvent, NodeKey};
use log::{trace, warn};

use super::{Completion, Detection};
use crate::normalize::normalize_natural_size;
use crate::status::LoadStatus;

const EVENTS: [LoadEvent; 3] = [LoadEvent::Load, LoadEvent::Abort, LoadEvent::Error];

/// Drive one detection cycle for an `<img>` node.
pub fn detect(document: &Document, node: NodeKey, completion: Completion, timeout: Option<Duration>) {
    let detection = Detection::new(node, &EVENTS, completion);
    if detection.replay_cached(document) {
        return;
    }

    if let Some(ready_state) = document.ready_state(node) {
        if ready_state == "complete" {
            normalize(document, node);
            detection.settle_next_tick(document, LoadStatus::Success);
            return;
        }
        detection.next_tick(document, |owner, pending| {
            if is_broken_sentinel(owner, pending.node()) {
                pending.settle(owner, LoadStatus::Error);
            }
        });
    } else if document.is_complete(node) {
        detection.next_tick(document, |owner, pending| {
            let status = validate_complete(owner, pending.node());
            pending.settle(owner, status);
        });
    }

    detection.mark_pending(document);
    detection.on(document, &[LoadEvent::Load], |owner, pending| {
        let node = pending.node();
        let finished = owner.is_complete(node)
            || owner.ready_state(node).as_deref() == Some("complete");
        if finished {
            normalize(owner, node);
            pending.settle(owner, LoadStatus::Success);
        } else {
            pending.settle(owner, LoadStatus::Error);
        }
    });
    detection.on(document, &[LoadEvent::Abort, LoadEvent::Error], |owner, pending| {
        pending.settle(owner, LoadStatus::Error);
    });
    detection.arm_timeout(document, timeout);
}

/// Legacy engines never fire `error` for an image that broke before the
/// handlers were attached; the placeholder it renders is the only tell.
fn is_broken_sentinel(document: &Document, node: NodeKey) -> bool {
    document.ready_state(node).as_deref() == Some("uninitialized")
        && document
            .rendered_size(node)
            .is_ok_and(|size| size == LEGACY_BROKEN_PLACEHOLDER)
}

/// A `complete` image is only good if it has a width and, where the
/// accessor exists, a non-zero natural width.
fn validate_complete(document: &Document, node: NodeKey) -> LoadStatus {
    let width = document.rendered_size(node).map_or(0, |size| size.width);
    let natural_zero = document
        .natural_size(node)
        .is_some_and(|natural| natural.width == 0);
    if width == 0 || natural_zero {
        trace!("{node} is complete but has no usable size");
        return LoadStatus::Error;
    }
    normalize(document, node);
    LoadStatus::Success
}

fn normalize(document: &Document, node: NodeKey) {
    if let Err(err) = normalize_natural_size(document, node) {
        warn!("natural size of {node} unavailable: {err:#}");
    }
}
