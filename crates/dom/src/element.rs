//! Resource element record stored in the document arena.

use smallvec::SmallVec;

use crate::NodeKey;
use crate::document::EventHandler;

/// Width/height pair in CSS pixels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Tri-state load status cached on the node itself.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum CachedStatus {
    /// Not yet determined (`0`).
    #[default]
    Pending,
    /// Loaded successfully (`1`).
    Success,
    /// Failed or timed out (`-1`).
    Failed,
}

impl CachedStatus {
    /// Numeric trit form: `0`, `1` or `-1`.
    #[inline]
    #[must_use]
    pub const fn trit(self) -> i8 {
        match self {
            Self::Pending => 0,
            Self::Success => 1,
            Self::Failed => -1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Native events a resource node can emit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LoadEvent {
    Load,
    Error,
    Abort,
    ReadyStateChange,
}

impl LoadEvent {
    pub const ALL: [Self; 4] = [Self::Load, Self::Error, Self::Abort, Self::ReadyStateChange];

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::Load => 0,
            Self::Error => 1,
            Self::Abort => 2,
            Self::ReadyStateChange => 3,
        }
    }
}

/// Runtime style overrides (the legacy engine's `runtimeStyle`).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RuntimeStyle {
    pub display: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// A node in the document arena.
#[derive(Clone, Default)]
pub struct Element {
    pub key: NodeKey,
    /// Lowercased tag name; `#document` for the root.
    pub tag: String,
    pub attrs: SmallVec<(String, String), 4>,
    pub runtime_style: RuntimeStyle,
    pub ready_state: Option<String>,
    pub complete: bool,
    /// Size of the fetched resource, or of the broken placeholder.
    pub intrinsic: Option<Size>,
    /// Natural size stored by normalization on engines without the native accessor.
    pub synthetic_natural: Option<Size>,
    pub status: CachedStatus,
    pub handlers: [Option<EventHandler>; 4],
}

impl Element {
    pub(crate) fn new(key: NodeKey, tag: &str) -> Self {
        Self {
            key,
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        if let Some(slot) = self
            .attrs
            .iter_mut()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
        {
            value.clone_into(&mut slot.1);
            return;
        }
        self.attrs.push((name.to_ascii_lowercase(), value.to_owned()));
    }

    pub(crate) fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attrs
            .iter()
            .position(|(attr, _)| attr.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(pos).1)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class").is_some_and(|list| {
            list.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case(class))
        })
    }

    /// Rendered size: runtime style beats attributes, which beat intrinsic size.
    pub fn rendered_size(&self) -> Size {
        if self.runtime_style.display.as_deref() == Some("none") {
            return Size::ZERO;
        }
        let intrinsic = self.intrinsic.unwrap_or_default();
        Size {
            width: rendered_axis(
                self.runtime_style.width.as_deref(),
                self.attribute("width"),
                intrinsic.width,
            ),
            height: rendered_axis(
                self.runtime_style.height.as_deref(),
                self.attribute("height"),
                intrinsic.height,
            ),
        }
    }
}

fn rendered_axis(style: Option<&str>, attr: Option<&str>, intrinsic: u32) -> u32 {
    match style.map(str::trim) {
        Some("auto") => intrinsic,
        Some(value) => parse_length(value).unwrap_or(intrinsic),
        None => attr.and_then(parse_length).unwrap_or(intrinsic),
    }
}

fn parse_length(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    let digits = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    digits.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_size_prefers_style_then_attribute_then_intrinsic() {
        let mut element = Element::new(NodeKey(1), "IMG");
        element.intrinsic = Some(Size::new(640, 480));
        assert_eq!(element.rendered_size(), Size::new(640, 480));

        element.set_attribute("width", "100");
        assert_eq!(element.rendered_size(), Size::new(100, 480));

        element.runtime_style.width = Some(String::from("auto"));
        element.runtime_style.height = Some(String::from("20px"));
        assert_eq!(element.rendered_size(), Size::new(640, 20));

        element.runtime_style.display = Some(String::from("none"));
        assert_eq!(element.rendered_size(), Size::ZERO);
    }

    #[test]
    fn attributes_are_case_insensitive_and_removable() {
        let mut element = Element::new(NodeKey(2), "img");
        assert_eq!(element.tag, "img");
        element.set_attribute("Width", "10");
        element.set_attribute("width", "12");
        assert_eq!(element.attribute("WIDTH"), Some("12"));
        assert_eq!(element.attrs.len(), 1);
        assert_eq!(element.remove_attribute("width"), Some(String::from("12")));
        assert_eq!(element.attribute("width"), None);
        assert_eq!(element.remove_attribute("width"), None);
    }

    #[test]
    fn class_tokens_match_whole_words() {
        let mut element = Element::new(NodeKey(3), "img");
        element.set_attribute("class", "thumb  lazy");
        assert!(element.has_class("lazy"));
        assert!(!element.has_class("thu"));
    }

    #[test]
    fn status_trits() {
        assert_eq!(CachedStatus::Pending.trit(), 0);
        assert_eq!(CachedStatus::Success.trit(), 1);
        assert_eq!(CachedStatus::Failed.trit(), -1);
        assert!(!CachedStatus::Pending.is_settled());
    }
}
