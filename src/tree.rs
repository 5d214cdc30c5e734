//! The canvas component tree.
//!
//! Nodes live in an arena keyed by [`NodeId`], which doubles as the id-to-node
//! table the reconciler resolves markup against. Edges run parent to child
//! through named content slots; every node except the root has exactly one
//! parent, and a node is never re-parented after it is placed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{Manifest, ManifestLookupError};
use crate::models::{Props, SerializedNode, ROOT_COMPONENT};

/// Stable node identity for the lifetime of a canvas session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The fixed id of the root sentinel.
    pub fn root() -> Self {
        Self(ROOT_COMPONENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error(transparent)]
    Lookup(#[from] ManifestLookupError),

    #[error("Node not found: {0}")]
    MissingNode(NodeId),

    #[error("Node {0} is reachable more than once")]
    Cycle(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),
}

/// Where a node hangs: its parent and the parent's slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRef {
    pub node: NodeId,
    pub slot: String,
}

/// One component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: NodeId,
    pub component: String,
    pub properties: Props,
    /// Occupied content slots. Empty slots have no entry.
    pub slots: BTreeMap<String, NodeId>,
    pub parent: Option<SlotRef>,
}

/// Result of placing a component into a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: NodeId,
    /// Ids of the discarded previous occupant and its descendants.
    pub discarded: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ComponentTree {
    nodes: HashMap<NodeId, TreeNode>,
    root: NodeId,
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTree {
    /// A tree holding only the root sentinel.
    pub fn new() -> Self {
        let root = NodeId::root();
        let node = TreeNode {
            id: root.clone(),
            component: ROOT_COMPONENT.to_string(),
            properties: Props::new(),
            slots: BTreeMap::new(),
            parent: None,
        };
        Self {
            nodes: HashMap::from([(root.clone(), node)]),
            root,
        }
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn get(&self, id: &NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn child(&self, parent: &NodeId, slot: &str) -> Option<&NodeId> {
        self.nodes.get(parent).and_then(|n| n.slots.get(slot))
    }

    /// Place a new `component` node into `slot` of `parent`.
    ///
    /// An existing occupant is discarded with its whole subtree; its ids leave
    /// the table and are never handed out again.
    pub fn place(
        &mut self,
        manifest: &Manifest,
        parent: &NodeId,
        slot: &str,
        component: &str,
    ) -> Result<Placement, TreeError> {
        let parent_component = self
            .nodes
            .get(parent)
            .map(|n| n.component.clone())
            .ok_or_else(|| TreeError::MissingNode(parent.clone()))?;
        if component == ROOT_COMPONENT {
            return Err(ManifestLookupError::UnknownComponent(component.to_string()).into());
        }
        manifest.get(component)?;
        manifest.content_slot(&parent_component, slot)?;

        let discarded = match self.child(parent, slot).cloned() {
            Some(previous) => self.remove_subtree(&previous),
            None => Vec::new(),
        };

        let mut id = NodeId::generate();
        while self.nodes.contains_key(&id) {
            id = NodeId::generate();
        }

        self.nodes.insert(
            id.clone(),
            TreeNode {
                id: id.clone(),
                component: component.to_string(),
                properties: Props::new(),
                slots: BTreeMap::new(),
                parent: Some(SlotRef {
                    node: parent.clone(),
                    slot: slot.to_string(),
                }),
            },
        );
        if let Some(p) = self.nodes.get_mut(parent) {
            p.slots.insert(slot.to_string(), id.clone());
        }

        Ok(Placement { id, discarded })
    }

    /// Replace a node's whole property map.
    pub fn set_properties(&mut self, id: &NodeId, properties: Props) -> Result<(), TreeError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::MissingNode(id.clone()))?;
        node.properties = properties;
        Ok(())
    }

    fn remove_subtree(&mut self, id: &NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];

        if let Some(SlotRef { node, slot }) = self.nodes.get(id).and_then(|n| n.parent.clone()) {
            if let Some(parent) = self.nodes.get_mut(&node) {
                parent.slots.remove(&slot);
            }
        }

        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.slots.into_values());
                removed.push(current);
            }
        }
        removed
    }

    /// Serialize the whole tree from the root.
    pub fn serialize(&self) -> Result<SerializedNode, TreeError> {
        self.serialize_node(&self.root)
    }

    /// Serialize the subtree under `id`, omitting empty slots.
    pub fn serialize_node(&self, id: &NodeId) -> Result<SerializedNode, TreeError> {
        let mut visited = HashSet::new();
        self.serialize_inner(id, &mut visited)
    }

    fn serialize_inner(
        &self,
        id: &NodeId,
        visited: &mut HashSet<NodeId>,
    ) -> Result<SerializedNode, TreeError> {
        // Placement never re-parents, so a repeat visit means the table is corrupt.
        if !visited.insert(id.clone()) {
            return Err(TreeError::Cycle(id.clone()));
        }

        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::MissingNode(id.clone()))?;

        let mut slots = BTreeMap::new();
        for (slot, child) in &node.slots {
            slots.insert(slot.clone(), self.serialize_inner(child, visited)?);
        }

        Ok(SerializedNode {
            id: node.id.to_string(),
            component: node.component.clone(),
            slots,
            props: node.properties.clone(),
        })
    }

    /// Rebuild a tree rooted at `serialized`, resolving every component and
    /// slot against the manifest.
    pub fn deserialize(serialized: &SerializedNode, manifest: &Manifest) -> Result<Self, TreeError> {
        let root = NodeId::from(serialized.id.as_str());
        let mut tree = Self {
            nodes: HashMap::new(),
            root,
        };
        tree.insert_serialized(serialized, None, manifest)?;
        Ok(tree)
    }

    fn insert_serialized(
        &mut self,
        serialized: &SerializedNode,
        parent: Option<SlotRef>,
        manifest: &Manifest,
    ) -> Result<(), TreeError> {
        manifest.get(&serialized.component)?;

        let id = NodeId::from(serialized.id.as_str());
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }

        let mut slots = BTreeMap::new();
        for (slot, child) in &serialized.slots {
            manifest.content_slot(&serialized.component, slot)?;
            slots.insert(slot.clone(), NodeId::from(child.id.as_str()));
        }

        self.nodes.insert(
            id.clone(),
            TreeNode {
                id: id.clone(),
                component: serialized.component.clone(),
                properties: serialized.props.clone(),
                slots,
                parent,
            },
        );

        for (slot, child) in &serialized.slots {
            let edge = SlotRef {
                node: id.clone(),
                slot: slot.clone(),
            };
            self.insert_serialized(child, Some(edge), manifest)?;
        }
        Ok(())
    }
}
