//! Node classification and detector dispatch.

use dom::{Document, NodeKey};

use crate::detect::{Detector, frame, image};

/// Detector family a node belongs to, selected once per cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Image,
    /// `<iframe>` and `<script>` share one state machine.
    Frame,
    /// Anything else is inert: no deferred pair, no callbacks.
    Unsupported,
}

/// Fixed dispatch table. Kinds without an entry have no detector.
const DETECTORS: [(ResourceKind, Detector); 2] = [
    (ResourceKind::Image, image::detect),
    (ResourceKind::Frame, frame::detect),
];

impl ResourceKind {
    /// Classify by (case-insensitive) tag name.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "img" => Self::Image,
            "iframe" | "script" => Self::Frame,
            _ => Self::Unsupported,
        }
    }

    /// Classify a node; unknown nodes are unsupported.
    pub fn of(document: &Document, node: NodeKey) -> Self {
        document
            .tag(node)
            .map_or(Self::Unsupported, |tag| Self::from_tag(&tag))
    }

    /// The detector for this kind, if any.
    #[must_use]
    pub fn detector(self) -> Option<Detector> {
        DETECTORS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, detector)| *detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_kinds() {
        assert_eq!(ResourceKind::from_tag("IMG"), ResourceKind::Image);
        assert_eq!(ResourceKind::from_tag("iframe"), ResourceKind::Frame);
        assert_eq!(ResourceKind::from_tag("script"), ResourceKind::Frame);
        assert_eq!(ResourceKind::from_tag("video"), ResourceKind::Unsupported);
    }

    #[test]
    fn only_supported_kinds_have_detectors() {
        assert!(ResourceKind::Image.detector().is_some());
        assert!(ResourceKind::Frame.detector().is_some());
        assert!(ResourceKind::Unsupported.detector().is_none());
    }

    #[test]
    fn unknown_nodes_are_unsupported() {
        let doc = Document::default();
        let div = doc.create_element("div");
        let script = doc.create_element("SCRIPT");
        assert_eq!(ResourceKind::of(&doc, div), ResourceKind::Unsupported);
        assert_eq!(ResourceKind::of(&doc, script), ResourceKind::Frame);
        assert_eq!(ResourceKind::of(&doc, NodeKey(9_999)), ResourceKind::Unsupported);
    }
}
