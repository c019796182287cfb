//! Frame-like detector shared by `<iframe>` and `<script>`.

use core::time::Duration;

use dom::{Document, LoadEvent, NodeKey};

use super::{Completion, Detection};
use crate::status::LoadStatus;

const EVENTS: [LoadEvent; 4] = [
    LoadEvent::Load,
    LoadEvent::ReadyStateChange,
    LoadEvent::Abort,
    LoadEvent::Error,
];

/// `readyState` values that mean the frame or script is done.
#[inline]
#[must_use]
pub fn is_complete_state(ready_state: &str) -> bool {
    matches!(ready_state, "loaded" | "complete")
}

/// Drive one detection cycle for an `<iframe>` or `<script>` node.
pub fn detect(document: &Document, node: NodeKey, completion: Completion, timeout: Option<Duration>) {
    let detection = Detection::new(node, &EVENTS, completion);
    if detection.replay_cached(document) {
        return;
    }
    if document
        .ready_state(node)
        .is_some_and(|state| is_complete_state(&state))
    {
        detection.settle_next_tick(document, LoadStatus::Success);
        return;
    }

    detection.mark_pending(document);
    detection.on(
        document,
        &[LoadEvent::Load, LoadEvent::ReadyStateChange],
        |owner, pending| {
            let done = owner
                .ready_state(pending.node())
                .is_none_or(|state| is_complete_state(&state));
            if done {
                pending.settle(owner, LoadStatus::Success);
            }
        },
    );
    detection.on(document, &[LoadEvent::Abort, LoadEvent::Error], |owner, pending| {
        pending.settle(owner, LoadStatus::Error);
    });
    detection.arm_timeout(document, timeout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_pattern_is_exact() {
        assert!(is_complete_state("loaded"));
        assert!(is_complete_state("complete"));
        assert!(!is_complete_state("interactive"));
        assert!(!is_complete_state("completed"));
        assert!(!is_complete_state(""));
    }
}
