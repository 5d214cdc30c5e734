use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the sentinel component that owns the whole canvas.
pub const ROOT_COMPONENT: &str = "root";

/// The single content slot of the root sentinel.
pub const MAIN_SLOT: &str = "main";

/// A component type available on the palette.
///
/// Entries are read from the manifest file at startup. The `options` of each
/// parameter are filled in by the catalog loader from the parameter description,
/// so the file itself only needs the four documented parameter fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "component")]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub slots: BTreeMap<String, SlotSpec>,
}

impl ManifestEntry {
    /// The root sentinel: no parameters, one content slot named `main`.
    pub fn root() -> Self {
        Self {
            name: ROOT_COMPONENT.to_string(),
            namespace: None,
            source: None,
            parameters: Vec::new(),
            slots: BTreeMap::from([(MAIN_SLOT.to_string(), SlotSpec { content: true })]),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Content slots in manifest order.
    pub fn content_slots(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|(_, spec)| spec.content)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_content_slot(&self, slot: &str) -> bool {
        self.slots.get(slot).is_some_and(|s| s.content)
    }
}

/// A typed component parameter.
///
/// The first entry of `accepted_types` is the coercion target; see
/// [`crate::coerce::coerce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type", with = "type_list")]
    pub accepted_types: Vec<TypeTag>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: String,
    /// Allowed discrete values. `Some` marks the parameter as enumerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl ParameterSpec {
    /// The preferred (coercion-target) type.
    pub fn primary_type(&self) -> Option<&TypeTag> {
        self.accepted_types.first()
    }

    /// Declared as exactly `String` or exactly `Symbol`. Only these get
    /// extracted options and an editor control; `Symbol,String` does not.
    pub fn is_editable(&self) -> bool {
        matches!(self.accepted_types.as_slice(), [tag] if tag.is_textual())
    }

    pub fn is_enumerated(&self) -> bool {
        self.options.is_some()
    }
}

/// Slot flags. Only content slots may hold a nested subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotSpec {
    #[serde(default, alias = "lambda")]
    pub content: bool,
}

/// Declared type of a parameter value.
///
/// Type names follow the component library's conventions (`String`, `Symbol`,
/// `Boolean`, ...). Unknown names are kept verbatim in [`TypeTag::Other`] so
/// they round-trip through the manifest endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    Symbol,
    Boolean,
    Integer,
    Float,
    Numeric,
    Hash,
    Array,
    Nil,
    Other(String),
}

impl TypeTag {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "String" => Self::String,
            "Symbol" => Self::Symbol,
            "Boolean" | "TrueClass" | "FalseClass" => Self::Boolean,
            "Integer" => Self::Integer,
            "Float" => Self::Float,
            "Numeric" => Self::Numeric,
            "Hash" => Self::Hash,
            "Array" => Self::Array,
            "Nil" | "NilClass" => Self::Nil,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "String",
            Self::Symbol => "Symbol",
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Numeric => "Numeric",
            Self::Hash => "Hash",
            Self::Array => "Array",
            Self::Nil => "NilClass",
            Self::Other(name) => name,
        }
    }

    /// Text-like types, edited through a text input or a select.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Symbol)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"Symbol,String"` <-> `[Symbol, String]`.
mod type_list {
    use super::*;

    pub fn serialize<S: Serializer>(tags: &[TypeTag], serializer: S) -> Result<S::Ok, S::Error> {
        let joined = tags.iter().map(TypeTag::as_str).collect::<Vec<_>>().join(",");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<TypeTag>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let tags: Vec<TypeTag> = raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(TypeTag::parse)
            .collect();
        if tags.is_empty() {
            return Err(serde::de::Error::custom("parameter type must name at least one type"));
        }
        Ok(tags)
    }
}
