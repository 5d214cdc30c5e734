use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::manifest::MAIN_SLOT;

/// Raw property values as entered in the editor, keyed by parameter name.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Transport form of a tree node.
///
/// Empty slots are omitted on the way out and `null` slot entries are dropped on
/// the way in, so "absent" and "never set" are the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub id: String,
    pub component: String,
    #[serde(default, deserialize_with = "present_slots")]
    pub slots: BTreeMap<String, SerializedNode>,
    #[serde(default)]
    pub props: Props,
}

impl SerializedNode {
    pub fn new(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            slots: BTreeMap::new(),
            props: Props::new(),
        }
    }

    pub fn with_slot(mut self, slot: impl Into<String>, child: SerializedNode) -> Self {
        self.slots.insert(slot.into(), child);
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    /// Ids of this node and every descendant, depth first.
    pub fn ids(&self) -> Vec<&str> {
        let mut out = vec![self.id.as_str()];
        for child in self.slots.values() {
            out.extend(child.ids());
        }
        out
    }
}

fn present_slots<'de, D>(deserializer: D) -> Result<BTreeMap<String, SerializedNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<SerializedNode>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, child)| child.map(|c| (name, c)))
        .collect())
}

/// Body of `PATCH /components/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub state: RenderState,
}

/// The canvas state sent for rendering: the root sentinel's slots.
///
/// Any other root fields the canvas sends (`id`, `component`, `props`) are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderState {
    #[serde(default, deserialize_with = "present_slots")]
    pub slots: BTreeMap<String, SerializedNode>,
}

impl RenderRequest {
    /// Wrap a serialized root; only its slots travel.
    pub fn from_root(root: SerializedNode) -> Self {
        Self {
            state: RenderState { slots: root.slots },
        }
    }

    /// Request with `node` as the content of the `main` slot.
    pub fn main(node: SerializedNode) -> Self {
        Self {
            state: RenderState {
                slots: BTreeMap::from([(MAIN_SLOT.to_string(), node)]),
            },
        }
    }

    pub fn main_node(&self) -> Option<&SerializedNode> {
        self.state.slots.get(MAIN_SLOT)
    }
}

/// `{ "html": "..." }` response of the render and settings endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlResponse {
    pub html: String,
}
