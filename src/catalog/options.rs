//! Enumerated option extraction from parameter descriptions.
//!
//! The component library documents enumerated parameters in prose:
//!
//! ```text
//! One of `:default`, `:primary`, or `:danger`.
//! ```
//!
//! That sentence is the only source of option lists, so the parsing rules are
//! fixed: drop the first six characters, split on `", "` or `"or "`, and keep the
//! first back-ticked word of each chunk (a leading `:` is not part of the value).

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ParameterSpec;

const PREFIX: &str = "One of";

static CHUNK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r", |or ").expect("valid separator pattern"));

static QUOTED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`:?(\w+)`").expect("valid token pattern"));

/// Options encoded in `description`, or `None` when it is not an enumeration.
pub fn parse_options(description: &str) -> Option<Vec<String>> {
    if !description.starts_with(PREFIX) {
        return None;
    }

    let rest = &description[PREFIX.len()..];
    let options = CHUNK_SEPARATOR
        .split(rest)
        .filter_map(|chunk| QUOTED_TOKEN.captures(chunk))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    Some(options)
}

/// Fill in `options` for `String` / `Symbol` parameters that do not already
/// carry them.
pub fn apply_options(param: &mut ParameterSpec) {
    if param.options.is_some() {
        return;
    }
    if param.is_editable() {
        param.options = parse_options(&param.description);
    }
}
