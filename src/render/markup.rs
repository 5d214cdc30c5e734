//! Markup helpers shared by component renderers.

/// Class carried by every empty content-slot placeholder.
pub const PLACEHOLDER_CLASS: &str = "sb-slot-placeholder";
/// Attribute naming the slot a placeholder stands in for.
pub const SLOT_NAME_ATTR: &str = "data-sb-name";
/// Attribute carrying a node's stable id.
pub const NODE_ID_ATTR: &str = "data-sb-id";
/// Attribute carrying a node's component name.
pub const COMPONENT_ATTR: &str = "data-sb-component";
/// Marker on the root element of every rendered component.
pub const VIEW_COMPONENT_ATTR: &str = "data-view-component";

/// Escape text content.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// The drop target emitted for an empty content slot.
pub fn placeholder(slot: &str) -> String {
    format!(
        "<div class=\"{}\" {}=\"{}\">{}</div>",
        PLACEHOLDER_CLASS,
        SLOT_NAME_ATTR,
        escape_attr(slot),
        escape_html(slot)
    )
}

/// The identity attributes injected on a component's root element.
pub fn identity_attrs(id: &str, component: &str) -> String {
    format!(
        "{}=\"true\" {}=\"{}\" {}=\"{}\"",
        VIEW_COMPONENT_ATTR,
        NODE_ID_ATTR,
        escape_attr(id),
        COMPONENT_ATTR,
        escape_attr(component)
    )
}

/// `Primer::BorderBox` -> `primer-border-box`.
pub fn css_name(component: &str) -> String {
    let mut out = String::with_capacity(component.len() + 4);
    let mut prev_lower = false;
    for c in component.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        }
    }
    out.trim_end_matches('-').to_string()
}
