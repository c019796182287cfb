//! Natural-size normalization.
//!
//! Engines without `naturalWidth`/`naturalHeight` get synthetic accessors.
//! The measurement mutates the node (runtime style on the legacy engine,
//! explicit size attributes elsewhere) and every mutation is undone by a
//! scope guard, so the rendered size is unchanged afterwards even when the
//! read fails.

use anyhow::{Context as _, Result};
use dom::{Document, NodeKey, RuntimeStyle, Size};
use log::{trace, warn};

const SIZE_ATTRIBUTES: [&str; 2] = ["width", "height"];

/// Give `node` readable natural-size accessors.
///
/// Returns the measured size, or `None` when the node already exposes an
/// accessor (native, or synthetic from an earlier call) and nothing was done.
///
/// # Errors
/// Returns an error if the node is unknown or cannot be measured; the node
/// is restored before the error is returned.
pub fn normalize_natural_size(document: &Document, node: NodeKey) -> Result<Option<Size>> {
    normalize_with(document, node, Document::rendered_size)
}

pub(crate) fn normalize_with(
    document: &Document,
    node: NodeKey,
    measure: impl FnOnce(&Document, NodeKey) -> Result<Size>,
) -> Result<Option<Size>> {
    if document.natural_size(node).is_some() {
        return Ok(None);
    }
    let size = if document.quirks().runtime_style {
        measure_with_runtime_style(document, node, measure)?
    } else {
        measure_without_attributes(document, node, measure)?
    };
    document
        .set_synthetic_natural_size(node, size)
        .with_context(|| format!("storing natural size on {node}"))?;
    trace!("{node} natural size {}x{}", size.width, size.height);
    Ok(Some(size))
}

fn measure_with_runtime_style(
    document: &Document,
    node: NodeKey,
    measure: impl FnOnce(&Document, NodeKey) -> Result<Size>,
) -> Result<Size> {
    let _restore = RuntimeStyleGuard {
        document,
        node,
        saved: document.runtime_style(node)?,
    };
    document.set_runtime_style(
        node,
        RuntimeStyle {
            display: Some(String::from("inline-block")),
            width: Some(String::from("auto")),
            height: Some(String::from("auto")),
        },
    )?;
    measure(document, node).with_context(|| format!("measuring {node} under auto sizing"))
}

fn measure_without_attributes(
    document: &Document,
    node: NodeKey,
    measure: impl FnOnce(&Document, NodeKey) -> Result<Size>,
) -> Result<Size> {
    let _restore = AttributeGuard {
        document,
        node,
        saved: SIZE_ATTRIBUTES.map(|name| (name, document.attribute(node, name))),
    };
    for name in SIZE_ATTRIBUTES {
        document.remove_attribute(node, name)?;
    }
    measure(document, node).with_context(|| format!("measuring {node} without size attributes"))
}

struct RuntimeStyleGuard<'doc> {
    document: &'doc Document,
    node: NodeKey,
    saved: RuntimeStyle,
}

impl Drop for RuntimeStyleGuard<'_> {
    fn drop(&mut self) {
        let saved = core::mem::take(&mut self.saved);
        if let Err(err) = self.document.set_runtime_style(self.node, saved) {
            warn!("could not restore runtime style on {}: {err}", self.node);
        }
    }
}

struct AttributeGuard<'doc> {
    document: &'doc Document,
    node: NodeKey,
    saved: [(&'static str, Option<String>); 2],
}

impl Drop for AttributeGuard<'_> {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            let restored = match value {
                Some(original) => self.document.set_attribute(self.node, name, original),
                None => self.document.remove_attribute(self.node, name).map(drop),
            };
            if let Err(err) = restored {
                warn!("could not restore {name} on {}: {err}", self.node);
            }
        }
    }
}
