//! Property-editor markup for a component type.
//!
//! One labelled control per textual parameter, each tagged with
//! `data-sb-param` so the canvas can bind it back to the schema. Enumerated
//! parameters get a `<select>` of their options, the rest a text input.
//! Only parameters declared as exactly `String` or `Symbol` are editable;
//! every other parameter gets no control.

use askama::Template;

use crate::models::{ManifestEntry, ParameterSpec};

/// Class shared by every editor control.
pub const CONTROL_CLASS: &str = "form-control";
/// Attribute naming the parameter a control edits.
pub const PARAM_ATTR: &str = "data-sb-param";

struct ControlView<'a> {
    name: &'a str,
    enumerated: bool,
    options: Vec<&'a str>,
}

#[derive(Template)]
#[template(path = "settings_form.html")]
struct SettingsFormTemplate<'a> {
    control_class: &'static str,
    param_attr: &'static str,
    controls: Vec<ControlView<'a>>,
}

pub fn editor_form(entry: &ManifestEntry) -> askama::Result<String> {
    SettingsFormTemplate {
        control_class: CONTROL_CLASS,
        param_attr: PARAM_ATTR,
        controls: entry.parameters.iter().filter_map(control).collect(),
    }
    .render()
}

fn control(param: &ParameterSpec) -> Option<ControlView<'_>> {
    if !param.is_editable() {
        return None;
    }

    Some(ControlView {
        name: &param.name,
        enumerated: param.is_enumerated(),
        options: param
            .options
            .iter()
            .flatten()
            .map(String::as_str)
            .collect(),
    })
}
