//! In-memory markup document.
//!
//! A small element tree with just what the reconciler needs: replacing an
//! element's content from markup, attribute and class access, ancestor and
//! descendant walks, and per-element event listener tables. Parsing is lenient
//! in the way browsers are: stray closing tags are ignored and unclosed
//! elements are closed at the end of input.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Handle to an element of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Element(ElementId),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Child>,
    parent: Option<ElementId>,
}

/// Events the canvas reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    DragOver,
    DragEnter,
    DragLeave,
    Drop,
    Change,
    KeyUp,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--.*?-->|<(/)?([A-Za-z][\w:-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("valid tag pattern")
});

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute pattern")
});

/// Element tree plus listener tables, generic over the handler type.
#[derive(Debug, Clone)]
pub struct Document<H> {
    elements: HashMap<ElementId, Element>,
    listeners: HashMap<ElementId, HashMap<EventKind, H>>,
    next_id: usize,
}

impl<H> Default for Document<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Document<H> {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            listeners: HashMap::new(),
            next_id: 0,
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> ElementId {
        self.insert(Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    fn insert(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, element);
        id
    }

    pub fn contains(&self, el: ElementId) -> bool {
        self.elements.contains_key(&el)
    }

    pub fn element(&self, el: ElementId) -> Option<&Element> {
        self.elements.get(&el)
    }

    pub fn tag(&self, el: ElementId) -> Option<&str> {
        self.elements.get(&el).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.elements.get(&el).and_then(|e| e.parent)
    }

    pub fn attr(&self, el: ElementId, name: &str) -> Option<&str> {
        self.elements
            .get(&el)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, el: ElementId, name: &str, value: &str) {
        if let Some(element) = self.elements.get_mut(&el) {
            match element.attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => element.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.attr(el, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, el: ElementId, class: &str) {
        if self.has_class(el, class) {
            return;
        }
        let classes = match self.attr(el, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(el, "class", &classes);
    }

    pub fn remove_class(&mut self, el: ElementId, class: &str) {
        if let Some(existing) = self.attr(el, "class") {
            let classes: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
            let joined = classes.join(" ");
            self.set_attr(el, "class", &joined);
        }
    }

    /// Element descendants of `el` in document order, `el` excluded.
    pub fn descendants(&self, el: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        self.collect_descendants(el, &mut out);
        out
    }

    fn collect_descendants(&self, el: ElementId, out: &mut Vec<ElementId>) {
        if let Some(element) = self.elements.get(&el) {
            for child in &element.children {
                if let Child::Element(id) = child {
                    out.push(*id);
                    self.collect_descendants(*id, out);
                }
            }
        }
    }

    /// Descendants of `el` carrying attribute `name`.
    pub fn query_attr(&self, el: ElementId, name: &str) -> Vec<ElementId> {
        self.descendants(el)
            .into_iter()
            .filter(|id| self.attr(*id, name).is_some())
            .collect()
    }

    /// Descendants of `el` carrying `class`.
    pub fn query_class(&self, el: ElementId, class: &str) -> Vec<ElementId> {
        self.descendants(el)
            .into_iter()
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    /// `el` followed by its ancestors.
    pub fn ancestors_inclusive(&self, el: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut current = Some(el);
        while let Some(id) = current {
            if !self.contains(id) {
                break;
            }
            out.push(id);
            current = self.parent(id);
        }
        out
    }

    /// Concatenated text of `el` and its descendants.
    pub fn text_content(&self, el: ElementId) -> String {
        let mut out = String::new();
        self.collect_text(el, &mut out);
        out
    }

    fn collect_text(&self, el: ElementId, out: &mut String) {
        if let Some(element) = self.elements.get(&el) {
            for child in &element.children {
                match child {
                    Child::Text(t) => out.push_str(t),
                    Child::Element(id) => self.collect_text(*id, out),
                }
            }
        }
    }

    /// Detach `el` from its parent and drop it with its subtree and listeners.
    pub fn remove(&mut self, el: ElementId) -> Vec<ElementId> {
        if let Some(parent) = self.parent(el) {
            if let Some(p) = self.elements.get_mut(&parent) {
                p.children.retain(|c| *c != Child::Element(el));
            }
        }
        self.drop_subtree(el)
    }

    fn drop_subtree(&mut self, el: ElementId) -> Vec<ElementId> {
        let mut removed = Vec::new();
        let mut stack = vec![el];
        while let Some(id) = stack.pop() {
            if let Some(element) = self.elements.remove(&id) {
                self.listeners.remove(&id);
                stack.extend(element.children.into_iter().filter_map(|c| match c {
                    Child::Element(child) => Some(child),
                    Child::Text(_) => None,
                }));
                removed.push(id);
            }
        }
        removed
    }

    /// Replace the content of `el` with parsed `markup`.
    ///
    /// Returns the ids of the elements that were dropped.
    pub fn set_inner_html(&mut self, el: ElementId, markup: &str) -> Vec<ElementId> {
        let old_children = match self.elements.get_mut(&el) {
            Some(element) => std::mem::take(&mut element.children),
            None => return Vec::new(),
        };

        let mut removed = Vec::new();
        for child in old_children {
            if let Child::Element(id) = child {
                removed.extend(self.drop_subtree(id));
            }
        }

        self.parse_into(el, markup);
        removed
    }

    fn push_child(&mut self, parent: ElementId, child: Child) {
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.push(child);
        }
    }

    fn push_text(&mut self, parent: ElementId, raw: &str) {
        if !raw.is_empty() {
            self.push_child(parent, Child::Text(decode_entities(raw)));
        }
    }

    fn parse_into(&mut self, container: ElementId, markup: &str) {
        let mut stack = vec![container];
        let mut cursor = 0;

        for caps in TAG.captures_iter(markup) {
            let Some(whole) = caps.get(0) else { continue };
            let top = *stack.last().unwrap_or(&container);
            self.push_text(top, &markup[cursor..whole.start()]);
            cursor = whole.end();

            let Some(name) = caps.get(2) else {
                // Comment.
                continue;
            };
            let tag = name.as_str().to_ascii_lowercase();

            if caps.get(1).is_some() {
                // Close the nearest open element with this tag, if any.
                if let Some(pos) = stack
                    .iter()
                    .rposition(|id| *id != container && self.tag(*id) == Some(tag.as_str()))
                {
                    stack.truncate(pos);
                }
                continue;
            }

            let raw_attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            let self_closing = raw_attrs.trim_end().ends_with('/');
            let attrs = ATTR
                .captures_iter(raw_attrs)
                .filter_map(|a| {
                    let key = a.get(1)?.as_str().to_string();
                    let value = a
                        .get(2)
                        .or_else(|| a.get(3))
                        .or_else(|| a.get(4))
                        .map(|v| decode_entities(v.as_str()))
                        .unwrap_or_default();
                    Some((key, value))
                })
                .collect();

            let parent = *stack.last().unwrap_or(&container);
            let id = self.insert(Element {
                tag: tag.clone(),
                attrs,
                children: Vec::new(),
                parent: Some(parent),
            });
            self.push_child(parent, Child::Element(id));

            if !self_closing && !VOID_TAGS.contains(&tag.as_str()) {
                stack.push(id);
            }
        }

        let top = *stack.last().unwrap_or(&container);
        self.push_text(top, &markup[cursor..]);
    }

    // ============================================================
    // Listeners
    // ============================================================

    /// Attach `handler` for `kind`, replacing any previous one so repeated
    /// attachment never fires twice.
    pub fn listen(&mut self, el: ElementId, kind: EventKind, handler: H) {
        if self.contains(el) {
            self.listeners.entry(el).or_default().insert(kind, handler);
        }
    }

    pub fn unlisten_all(&mut self, el: ElementId) {
        self.listeners.remove(&el);
    }

    pub fn listener(&self, el: ElementId, kind: EventKind) -> Option<&H> {
        self.listeners.get(&el).and_then(|l| l.get(&kind))
    }

    pub fn listener_count(&self, el: ElementId) -> usize {
        self.listeners.get(&el).map(HashMap::len).unwrap_or(0)
    }

    /// Nearest element from `target` upwards with a `kind` listener.
    pub fn bubble(&self, target: ElementId, kind: EventKind) -> Option<(ElementId, &H)> {
        self.ancestors_inclusive(target)
            .into_iter()
            .find_map(|id| self.listener(id, kind).map(|h| (id, h)))
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
