//! Server-side rendering of a serialized component tree.
//!
//! Rendering runs in two passes. [`fragment::build`] resolves every node
//! against the manifest and coerces its props, producing a fragment tree.
//! [`Renderer::splice`] then renders bottom-up: slot content first, then the
//! node's own renderer with that content spliced in. Any failure anywhere
//! fails the whole render; there is no partial output.

mod components;
pub mod fragment;
pub mod markup;
mod registry;

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{Manifest, ManifestLookupError};
use crate::coerce::CoercionError;
use crate::models::{RenderRequest, SerializedNode, ROOT_COMPONENT};

pub use components::{ButtonComponent, GenericComponent, RootComponent, BUTTON_DEFAULT_LABEL};
pub use fragment::{CoercedProps, Fragment, SlotContent, SlotFragment};
pub use registry::{
    ComponentRegistry, ComponentRenderer, RegistryBuilder, RegistryError, RenderContext,
    RenderedSlot,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Lookup(#[from] ManifestLookupError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("Component {component} failed to render: {message}")]
    Component { component: String, message: String },
}

/// Stateless tree renderer; safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct Renderer {
    manifest: Manifest,
    registry: Arc<ComponentRegistry>,
}

impl Renderer {
    /// Renderer with the default registry for `manifest`.
    pub fn new(manifest: Manifest) -> Self {
        let registry = ComponentRegistry::from_manifest(&manifest);
        Self::with_registry(manifest, registry)
    }

    pub fn with_registry(manifest: Manifest, registry: ComponentRegistry) -> Self {
        Self {
            manifest,
            registry: Arc::new(registry),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Render the canvas: the content of the root's `main` slot, or its
    /// placeholder when the canvas is empty.
    pub fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let root = SerializedNode {
            id: ROOT_COMPONENT.to_string(),
            component: ROOT_COMPONENT.to_string(),
            slots: request.state.slots.clone(),
            props: Default::default(),
        };
        self.render_node(&root)
    }

    /// Render a single subtree.
    pub fn render_node(&self, node: &SerializedNode) -> Result<String, RenderError> {
        let fragment = fragment::build(node, &self.manifest)?;
        self.splice(&fragment)
    }

    /// Second pass: render children, then hand their markup to the parent.
    pub fn splice(&self, fragment: &Fragment<'_>) -> Result<String, RenderError> {
        let mut slots = Vec::with_capacity(fragment.slots.len());
        for slot in &fragment.slots {
            let html = match &slot.content {
                SlotContent::Node(child) => self.splice(child)?,
                SlotContent::Placeholder => markup::placeholder(&slot.name),
            };
            slots.push(RenderedSlot {
                name: slot.name.clone(),
                html,
            });
        }

        let renderer = self.registry.get(&fragment.entry.name)?;
        renderer.render(&RenderContext {
            id: &fragment.id,
            component: fragment.entry,
            props: &fragment.props,
            slots: &slots,
        })
    }
}
