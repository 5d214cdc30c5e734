//! Statically registered component renderers, keyed by component name.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{Manifest, ManifestLookupError};
use crate::coerce::PropValue;
use crate::models::{ManifestEntry, ROOT_COMPONENT};

use super::components::{ButtonComponent, GenericComponent, RootComponent};
use super::fragment::CoercedProps;
use super::markup;
use super::RenderError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Cannot register renderer for {0}: component is not in the manifest")]
    UnknownComponent(String),
}

/// Markup already rendered for one content slot.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSlot {
    pub name: String,
    pub html: String,
}

/// Everything a renderer gets for one node.
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub id: &'a str,
    pub component: &'a ManifestEntry,
    pub props: &'a CoercedProps,
    /// Content slots in manifest order, children or placeholders.
    pub slots: &'a [RenderedSlot],
}

impl RenderContext<'_> {
    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    pub fn slot_html(&self, name: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.html.as_str())
    }

    /// `data-view-component`, `data-sb-id` and `data-sb-component`.
    pub fn identity_attrs(&self) -> String {
        markup::identity_attrs(self.id, &self.component.name)
    }
}

/// Renders one component instance, given its already rendered slot content.
pub trait ComponentRenderer: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError>;
}

/// Name-to-renderer table, fixed after startup.
#[derive(Clone)]
pub struct ComponentRegistry {
    renderers: HashMap<String, Arc<dyn ComponentRenderer>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.renderers.keys().collect();
        names.sort();
        f.debug_struct("ComponentRegistry").field("renderers", &names).finish()
    }
}

impl ComponentRegistry {
    /// Registry covering every manifest component.
    ///
    /// Components without a dedicated renderer get the generic one. Built-in
    /// renderers for components this manifest does not list are left out.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut builder = RegistryBuilder::new(manifest);
        builder.insert(ROOT_COMPONENT, Arc::new(RootComponent));
        for entry in manifest.entries() {
            builder.insert(&entry.name, Arc::new(GenericComponent));
        }
        for (name, renderer) in builtin() {
            if manifest.contains(name) {
                builder.insert(name, renderer);
            } else {
                tracing::debug!("Built-in renderer {} unused: not in manifest", name);
            }
        }
        builder.build()
    }

    /// Start from [`Self::from_manifest`] and add dedicated renderers.
    pub fn builder(manifest: &Manifest) -> RegistryBuilder<'_> {
        let base = Self::from_manifest(manifest);
        RegistryBuilder {
            manifest,
            renderers: base.renderers,
        }
    }

    pub fn get(&self, name: &str) -> Result<&dyn ComponentRenderer, ManifestLookupError> {
        self.renderers
            .get(name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ManifestLookupError::UnknownComponent(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

fn builtin() -> Vec<(&'static str, Arc<dyn ComponentRenderer>)> {
    vec![("Button", Arc::new(ButtonComponent))]
}

pub struct RegistryBuilder<'m> {
    manifest: &'m Manifest,
    renderers: HashMap<String, Arc<dyn ComponentRenderer>>,
}

impl<'m> RegistryBuilder<'m> {
    fn new(manifest: &'m Manifest) -> Self {
        Self {
            manifest,
            renderers: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, renderer: Arc<dyn ComponentRenderer>) {
        self.renderers.insert(name.to_string(), renderer);
    }

    /// Register a dedicated renderer. Names the manifest does not know are
    /// rejected here rather than at render time.
    pub fn register(
        mut self,
        name: &str,
        renderer: Arc<dyn ComponentRenderer>,
    ) -> Result<Self, RegistryError> {
        if !self.manifest.contains(name) {
            return Err(RegistryError::UnknownComponent(name.to_string()));
        }
        self.insert(name, renderer);
        Ok(self)
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            renderers: self.renderers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Static;

    impl ComponentRenderer for Static {
        fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
            Ok("static".to_string())
        }
    }

    fn manifest() -> Manifest {
        Manifest::from_yaml_str("- component: Box\n- component: Flash\n").unwrap()
    }

    #[test]
    fn covers_every_manifest_component_and_root() {
        let manifest = manifest();
        let registry = ComponentRegistry::from_manifest(&manifest);

        assert!(registry.get("Box").is_ok());
        assert!(registry.get("Flash").is_ok());
        assert!(registry.get(ROOT_COMPONENT).is_ok());
        // Button is built in but not listed, so it is not registered.
        assert!(registry.get("Button").is_err());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn registering_unknown_component_fails() {
        let manifest = manifest();
        let result = ComponentRegistry::builder(&manifest).register("Tooltip", Arc::new(Static));
        assert_eq!(
            result.err(),
            Some(RegistryError::UnknownComponent("Tooltip".to_string()))
        );
    }

    #[test]
    fn registered_renderer_replaces_generic() {
        let manifest = manifest();
        let registry = ComponentRegistry::builder(&manifest)
            .register("Flash", Arc::new(Static))
            .unwrap()
            .build();

        let entry = manifest.get("Flash").unwrap();
        let props = CoercedProps::new();
        let ctx = RenderContext {
            id: "f",
            component: entry,
            props: &props,
            slots: &[],
        };
        assert_eq!(registry.get("Flash").unwrap().render(&ctx).unwrap(), "static");
    }
}
