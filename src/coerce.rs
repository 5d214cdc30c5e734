//! Type-directed coercion of edited property values.
//!
//! Values arrive from the editor as JSON. Before a component renderer sees them
//! they are converted towards the parameter's declared types, best effort:
//!
//! 1. A value whose runtime type is already one of the accepted types is kept
//!    as-is (booleans, numbers and structured values survive untouched).
//! 2. Otherwise only the first accepted type is tried. `String` stringifies,
//!    `Symbol` stringifies into a symbol.
//! 3. For any other target the raw value passes through unchanged. Nothing is
//!    dropped, and nothing is rejected.
//!
//! Enumerated parameters are not checked for membership here; the editor only
//! offers the listed options, and an out-of-range value passes through.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::models::{ParameterSpec, TypeTag};

/// Reserved for a strict coercion policy. The best-effort policy never returns it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot coerce {value} for parameter `{parameter}` to {target}")]
pub struct CoercionError {
    pub parameter: String,
    pub target: TypeTag,
    pub value: Value,
}

/// A property value as handed to a component renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Text(String),
    Symbol(String),
    Bool(bool),
    Number(serde_json::Number),
    /// Objects and arrays, kept verbatim.
    Structured(Value),
    Nil,
}

impl PropValue {
    /// Wrap a raw value without conversion.
    pub fn raw(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::Null => Self::Nil,
            other => Self::Structured(other.clone()),
        }
    }

    /// The value as it appears in markup.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) | Self::Symbol(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Structured(v) => v.to_string(),
            Self::Nil => String::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(s) => write!(f, ":{}", s),
            other => f.write_str(&other.as_text()),
        }
    }
}

/// Does the runtime type of `value` satisfy `tag`?
fn is_instance(value: &Value, tag: &TypeTag) -> bool {
    match (value, tag) {
        (Value::String(_), TypeTag::String) => true,
        (Value::Bool(_), TypeTag::Boolean) => true,
        (Value::Number(n), TypeTag::Integer) => n.is_i64() || n.is_u64(),
        (Value::Number(n), TypeTag::Float) => n.is_f64(),
        (Value::Number(_), TypeTag::Numeric) => true,
        (Value::Object(_), TypeTag::Hash) => true,
        (Value::Array(_), TypeTag::Array) => true,
        (Value::Null, TypeTag::Nil) => true,
        _ => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce `raw` towards the types `spec` accepts.
pub fn coerce(raw: &Value, spec: &ParameterSpec) -> Result<PropValue, CoercionError> {
    if spec.accepted_types.iter().any(|tag| is_instance(raw, tag)) {
        return Ok(PropValue::raw(raw));
    }

    let coerced = match spec.primary_type() {
        Some(TypeTag::String) => PropValue::Text(stringify(raw)),
        Some(TypeTag::Symbol) => PropValue::Symbol(stringify(raw)),
        _ => PropValue::raw(raw),
    };
    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(types: &[TypeTag]) -> ParameterSpec {
        ParameterSpec {
            name: "p".to_string(),
            accepted_types: types.to_vec(),
            default: None,
            description: String::new(),
            options: None,
        }
    }

    #[test]
    fn matching_values_are_unchanged() {
        let cases = [
            (json!("hello"), vec![TypeTag::String]),
            (json!(true), vec![TypeTag::String, TypeTag::Boolean]),
            (json!(3), vec![TypeTag::Integer]),
            (json!(2.5), vec![TypeTag::Numeric]),
            (json!({"a": 1}), vec![TypeTag::String, TypeTag::Hash]),
            (json!([1, 2]), vec![TypeTag::Array]),
        ];
        for (value, types) in cases {
            assert_eq!(coerce(&value, &spec(&types)).unwrap(), PropValue::raw(&value));
        }
    }

    #[test]
    fn text_target_stringifies() {
        let s = spec(&[TypeTag::String]);
        assert_eq!(coerce(&json!(42), &s).unwrap(), PropValue::Text("42".to_string()));
        assert_eq!(coerce(&json!(false), &s).unwrap(), PropValue::Text("false".to_string()));
        assert_eq!(coerce(&json!(null), &s).unwrap(), PropValue::Text(String::new()));
    }

    #[test]
    fn symbol_target_symbolizes_strings() {
        let s = spec(&[TypeTag::Symbol]);
        assert_eq!(
            coerce(&json!("primary"), &s).unwrap(),
            PropValue::Symbol("primary".to_string())
        );
    }

    #[test]
    fn string_accepted_second_keeps_text() {
        let s = spec(&[TypeTag::Symbol, TypeTag::String]);
        assert_eq!(coerce(&json!("div"), &s).unwrap(), PropValue::Text("div".to_string()));
    }

    #[test]
    fn only_first_type_is_a_target() {
        // Integer is accepted second, so a string is not parsed into it.
        let s = spec(&[TypeTag::Boolean, TypeTag::Integer]);
        assert_eq!(coerce(&json!("7"), &s).unwrap(), PropValue::Text("7".to_string()));
    }

    #[test]
    fn other_targets_pass_through() {
        let s = spec(&[TypeTag::Integer]);
        assert_eq!(coerce(&json!("12"), &s).unwrap(), PropValue::Text("12".to_string()));

        let s = spec(&[TypeTag::Other("Primer::Octicon".to_string())]);
        assert_eq!(coerce(&json!({"icon": "x"}), &s).unwrap(), PropValue::Structured(json!({"icon": "x"})));
    }

    #[test]
    fn enumerated_values_are_not_validated() {
        let mut s = spec(&[TypeTag::Symbol]);
        s.options = Some(vec!["default".to_string()]);
        assert_eq!(
            coerce(&json!("rainbow"), &s).unwrap(),
            PropValue::Symbol("rainbow".to_string())
        );
    }

    #[test]
    fn symbols_display_with_colon() {
        assert_eq!(PropValue::Symbol("primary".to_string()).to_string(), ":primary");
        assert_eq!(PropValue::Symbol("primary".to_string()).as_text(), "primary");
    }
}
