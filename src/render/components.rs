//! Built-in component renderers.

use crate::coerce::PropValue;

use super::markup::{css_name, escape_attr, escape_html};
use super::registry::{ComponentRenderer, RenderContext};
use super::RenderError;

/// Content of a `Button` rendered without a label.
pub const BUTTON_DEFAULT_LABEL: &str = "Click me!";

/// The canvas itself: emits its slot content with no wrapper, since the
/// canvas element already exists on the page.
pub struct RootComponent;

impl ComponentRenderer for RootComponent {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Ok(ctx.slots.iter().map(|s| s.html.as_str()).collect())
    }
}

/// Fallback for any manifest component: a `div` carrying props as
/// `data-prop-*` attributes and one region per content slot.
pub struct GenericComponent;

impl ComponentRenderer for GenericComponent {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let mut html = format!(
            "<div {} class=\"sb-component sb-{}\"",
            ctx.identity_attrs(),
            css_name(&ctx.component.name)
        );
        for (name, value) in ctx.props {
            html.push_str(&format!(
                " data-prop-{}=\"{}\"",
                css_name(name),
                escape_attr(&value.as_text())
            ));
        }
        html.push('>');

        for slot in ctx.slots {
            html.push_str(&format!(
                "<div class=\"sb-slot\" data-sb-slot=\"{}\">{}</div>",
                escape_attr(&slot.name),
                slot.html
            ));
        }

        html.push_str("</div>");
        Ok(html)
    }
}

/// `Button { label, scheme, size, block }`.
pub struct ButtonComponent;

impl ComponentRenderer for ButtonComponent {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let mut classes = vec!["btn".to_string()];
        if let Some(scheme) = ctx.prop("scheme").map(PropValue::as_text) {
            if !scheme.is_empty() && scheme != "default" {
                classes.push(format!("btn-{}", scheme));
            }
        }
        if let Some(size) = ctx.prop("size").map(PropValue::as_text) {
            if !size.is_empty() && size != "medium" {
                classes.push(format!("btn-{}", size));
            }
        }
        if matches!(ctx.prop("block"), Some(PropValue::Bool(true))) {
            classes.push("btn-block".to_string());
        }

        let label = ctx
            .prop("label")
            .map(PropValue::as_text)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| BUTTON_DEFAULT_LABEL.to_string());

        Ok(format!(
            "<button type=\"button\" class=\"{}\" {}>{}</button>",
            escape_attr(&classes.join(" ")),
            ctx.identity_attrs(),
            escape_html(&label)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ManifestEntry;
    use crate::render::fragment::CoercedProps;
    use crate::render::registry::RenderedSlot;

    fn entry(name: &str) -> ManifestEntry {
        ManifestEntry {
            name: name.to_string(),
            ..ManifestEntry::root()
        }
    }

    #[test]
    fn button_defaults_its_label() {
        let entry = entry("Button");
        let props = CoercedProps::new();
        let ctx = RenderContext {
            id: "b1",
            component: &entry,
            props: &props,
            slots: &[],
        };

        let html = ButtonComponent.render(&ctx).unwrap();
        assert_eq!(
            html,
            r#"<button type="button" class="btn" data-view-component="true" data-sb-id="b1" data-sb-component="Button">Click me!</button>"#
        );
    }

    #[test]
    fn button_uses_label_and_scheme() {
        let entry = entry("Button");
        let props = CoercedProps::from([
            ("label".to_string(), PropValue::Text("<Go>".to_string())),
            ("scheme".to_string(), PropValue::Symbol("primary".to_string())),
            ("block".to_string(), PropValue::Bool(true)),
        ]);
        let ctx = RenderContext {
            id: "b1",
            component: &entry,
            props: &props,
            slots: &[],
        };

        let html = ButtonComponent.render(&ctx).unwrap();
        assert!(html.contains(r#"class="btn btn-primary btn-block""#));
        assert!(html.ends_with(">&lt;Go&gt;</button>"));
    }

    #[test]
    fn generic_wraps_slots_and_props() {
        let entry = entry("BorderBox");
        let props = CoercedProps::from([("padding".to_string(), PropValue::Symbol("condensed".to_string()))]);
        let slots = [RenderedSlot {
            name: "body".to_string(),
            html: "<p>x</p>".to_string(),
        }];
        let ctx = RenderContext {
            id: "n",
            component: &entry,
            props: &props,
            slots: &slots,
        };

        let html = GenericComponent.render(&ctx).unwrap();
        assert_eq!(
            html,
            r#"<div data-view-component="true" data-sb-id="n" data-sb-component="BorderBox" class="sb-component sb-border-box" data-prop-padding="condensed"><div class="sb-slot" data-sb-slot="body"><p>x</p></div></div>"#
        );
    }

    #[test]
    fn root_concatenates_slots_without_wrapper() {
        let entry = ManifestEntry::root();
        let props = CoercedProps::new();
        let slots = [RenderedSlot {
            name: "main".to_string(),
            html: "<span></span>".to_string(),
        }];
        let ctx = RenderContext {
            id: "root",
            component: &entry,
            props: &props,
            slots: &slots,
        };
        assert_eq!(RootComponent.render(&ctx).unwrap(), "<span></span>");
    }
}
