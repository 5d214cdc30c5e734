//! First render pass: resolve and coerce a serialized tree into fragments.
//!
//! No markup is produced here. Each [`Fragment`] holds the resolved manifest
//! entry, coerced props and one [`SlotFragment`] per content slot, so the
//! splice pass only has to stitch renderer output together.

use std::collections::BTreeMap;

use crate::catalog::{Manifest, ManifestLookupError};
use crate::coerce::{coerce, PropValue};
use crate::models::{ManifestEntry, Props, SerializedNode};

use super::RenderError;

/// Coerced props keyed by parameter name.
pub type CoercedProps = BTreeMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<'m> {
    pub id: String,
    pub entry: &'m ManifestEntry,
    pub props: CoercedProps,
    pub slots: Vec<SlotFragment<'m>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotFragment<'m> {
    pub name: String,
    pub content: SlotContent<'m>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotContent<'m> {
    Node(Box<Fragment<'m>>),
    /// Empty content slot; rendered as a drop-target placeholder.
    Placeholder,
}

/// Coerce every property of a node against its component's parameters.
///
/// A property the component does not declare is a lookup error.
pub fn coerce_props(entry: &ManifestEntry, props: &Props) -> Result<CoercedProps, RenderError> {
    let mut coerced = CoercedProps::new();
    for (name, raw) in props {
        let spec = entry
            .param(name)
            .ok_or_else(|| ManifestLookupError::UnknownParameter {
                component: entry.name.clone(),
                parameter: name.clone(),
            })?;
        coerced.insert(name.clone(), coerce(raw, spec)?);
    }
    Ok(coerced)
}

/// Build the fragment tree for `node`, children first.
pub fn build<'m>(node: &SerializedNode, manifest: &'m Manifest) -> Result<Fragment<'m>, RenderError> {
    let entry = manifest.get(&node.component)?;

    for slot in node.slots.keys() {
        manifest.content_slot(&entry.name, slot)?;
    }

    let mut slots = Vec::new();
    for name in entry.content_slots() {
        let content = match node.slots.get(name) {
            Some(child) => SlotContent::Node(Box::new(build(child, manifest)?)),
            None => SlotContent::Placeholder,
        };
        slots.push(SlotFragment {
            name: name.to_string(),
            content,
        });
    }

    Ok(Fragment {
        id: node.id.clone(),
        entry,
        props: coerce_props(entry, &node.props)?,
        slots,
    })
}
