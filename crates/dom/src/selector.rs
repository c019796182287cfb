//! Minimal selector grammar for collecting resource nodes.
//!
//! Supported: comma-separated compounds of `*`, a tag name, `#id` and any
//! number of `.class` tokens (e.g. `img.thumb, iframe, #hero`). Combinators
//! are not supported.

use anyhow::{Result, anyhow, bail};

use crate::element::Element;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag
            && *tag != element.tag
        {
            return false;
        }
        if let Some(id) = &self.id
            && element.attribute("id") != Some(id.as_str())
        {
            return false;
        }
        self.classes.iter().all(|class| element.has_class(class))
    }
}

/// A parsed selector list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selector {
    compounds: Vec<Compound>,
}

impl Selector {
    /// Parse a selector list.
    ///
    /// # Errors
    /// Returns an error for empty lists, empty compounds, or unsupported syntax.
    pub fn parse(source: &str) -> Result<Self> {
        let compounds = source
            .split(',')
            .map(parse_compound)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { compounds })
    }

    /// Whether `element` matches any compound in the list.
    pub fn matches(&self, element: &Element) -> bool {
        self.compounds.iter().any(|compound| compound.matches(element))
    }
}

fn parse_compound(raw: &str) -> Result<Compound> {
    let text = raw.trim();
    if text.is_empty() {
        bail!("empty selector in list");
    }
    let mut compound = Compound::default();
    let mut rest = text;
    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let (name, after) = take_ident(rest);
        if !name.is_empty() {
            compound.tag = Some(name.to_ascii_lowercase());
        }
        rest = after;
    }
    while let Some(sigil) = rest.chars().next() {
        let (name, after) = take_ident(&rest[sigil.len_utf8()..]);
        if name.is_empty() {
            bail!("expected a name after {sigil:?} in {text:?}");
        }
        match sigil {
            '#' => compound.id = Some(name.to_owned()),
            '.' => compound.classes.push(name.to_owned()),
            other => {
                return Err(anyhow!("unsupported selector syntax {other:?} in {text:?}"));
            }
        }
        rest = after;
    }
    Ok(compound)
}

fn take_ident(text: &str) -> (&str, &str) {
    let end = text
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
        .unwrap_or(text.len());
    text.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKey;

    fn element(tag: &str, attrs: &[(&str, &str)]) -> Element {
        let mut element = Element::new(NodeKey(1), tag);
        for (name, value) in attrs {
            element.set_attribute(name, value);
        }
        element
    }

    #[test]
    fn tag_id_and_class_compounds() {
        let selector = Selector::parse("img.thumb, #hero, SCRIPT").expect("parse");
        assert!(selector.matches(&element("img", &[("class", "thumb big")])));
        assert!(!selector.matches(&element("img", &[])));
        assert!(selector.matches(&element("iframe", &[("id", "hero")])));
        assert!(selector.matches(&element("script", &[])));
    }

    #[test]
    fn universal_matches_everything() {
        let selector = Selector::parse("*").expect("parse");
        assert!(selector.matches(&element("video", &[])));
    }

    #[test]
    fn rejects_combinators_and_empties() {
        assert!(Selector::parse("div img").is_err());
        assert!(Selector::parse("img,").is_err());
        assert!(Selector::parse("img.").is_err());
        assert!(Selector::parse("").is_err());
    }
}
