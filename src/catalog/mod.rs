//! The component manifest: every component type the canvas may place.
//!
//! A [`Manifest`] is built once at startup from a YAML or JSON file and shared
//! read-only between requests. Lookups that fail produce a
//! [`ManifestLookupError`], which is fatal for the operation that made them.

mod options;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use thiserror::Error;

pub use options::parse_options;

use crate::models::{ManifestEntry, ParameterSpec, SlotSpec, ROOT_COMPONENT};

/// Unknown component, parameter or slot name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestLookupError {
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Unknown parameter `{parameter}` for component {component}")]
    UnknownParameter { component: String, parameter: String },

    #[error("Unknown slot `{slot}` for component {component}")]
    UnknownSlot { component: String, slot: String },

    #[error("Slot `{slot}` of component {component} does not accept content")]
    NotContentSlot { component: String, slot: String },
}

/// Immutable component catalog.
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Debug, Clone)]
pub struct Manifest {
    inner: Arc<ManifestInner>,
}

#[derive(Debug)]
struct ManifestInner {
    /// Palette entries in file order. The root sentinel is not among them.
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
    root: ManifestEntry,
}

impl Manifest {
    /// Build a manifest from definitions, extracting enumerated options.
    ///
    /// Fails on duplicate names and on definitions that claim the reserved
    /// `root` name.
    pub fn new(definitions: Vec<ManifestEntry>) -> Result<Self> {
        let mut entries = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());

        for mut entry in definitions {
            if entry.name == ROOT_COMPONENT {
                bail!("Component name `{}` is reserved", ROOT_COMPONENT);
            }
            if index.contains_key(&entry.name) {
                bail!("Duplicate component in manifest: {}", entry.name);
            }
            entry.parameters.iter_mut().for_each(options::apply_options);
            index.insert(entry.name.clone(), entries.len());
            entries.push(entry);
        }

        Ok(Self {
            inner: Arc::new(ManifestInner {
                entries,
                index,
                root: ManifestEntry::root(),
            }),
        })
    }

    /// Load definitions from a file. `.json` files are read as JSON, anything
    /// else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let manifest = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

        tracing::info!(
            "Loaded {} components from {}",
            manifest.entries().len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let definitions: Vec<ManifestEntry> = serde_yaml::from_str(content)?;
        Self::new(definitions)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let definitions: Vec<ManifestEntry> = serde_json::from_str(content)?;
        Self::new(definitions)
    }

    /// Palette entries, excluding the root sentinel.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.inner.entries
    }

    pub fn root(&self) -> &ManifestEntry {
        &self.inner.root
    }

    pub fn contains(&self, name: &str) -> bool {
        name == ROOT_COMPONENT || self.inner.index.contains_key(name)
    }

    /// Resolve a component by name. `root` always resolves to the sentinel.
    pub fn get(&self, name: &str) -> Result<&ManifestEntry, ManifestLookupError> {
        if name == ROOT_COMPONENT {
            return Ok(&self.inner.root);
        }
        self.inner
            .index
            .get(name)
            .map(|&i| &self.inner.entries[i])
            .ok_or_else(|| ManifestLookupError::UnknownComponent(name.to_string()))
    }

    pub fn param(&self, component: &str, parameter: &str) -> Result<&ParameterSpec, ManifestLookupError> {
        self.get(component)?
            .param(parameter)
            .ok_or_else(|| ManifestLookupError::UnknownParameter {
                component: component.to_string(),
                parameter: parameter.to_string(),
            })
    }

    pub fn slot(&self, component: &str, slot: &str) -> Result<&SlotSpec, ManifestLookupError> {
        self.get(component)?
            .slots
            .get(slot)
            .ok_or_else(|| ManifestLookupError::UnknownSlot {
                component: component.to_string(),
                slot: slot.to_string(),
            })
    }

    /// Resolve a slot that must accept nested content.
    pub fn content_slot(&self, component: &str, slot: &str) -> Result<(), ManifestLookupError> {
        if self.slot(component, slot)?.content {
            Ok(())
        } else {
            Err(ManifestLookupError::NotContentSlot {
                component: component.to_string(),
                slot: slot.to_string(),
            })
        }
    }
}
