//! Re-attaching handlers to freshly rendered markup.

use crate::render::markup::{NODE_ID_ATTR, PLACEHOLDER_CLASS, SLOT_NAME_ATTR};
use crate::tree::NodeId;

use super::dom::{ElementId, EventKind};
use super::{Canvas, Handler};

const SLOT_EVENTS: [EventKind; 4] = [
    EventKind::DragOver,
    EventKind::DragEnter,
    EventKind::DragLeave,
    EventKind::Drop,
];

impl Canvas {
    /// Replace the canvas content with `html`, then walk it once top-down
    /// attaching click handlers to nodes and drop handlers to placeholders.
    ///
    /// Elements whose id is not in the tree come from a stale response and
    /// are left inert.
    pub(super) fn reconcile(&mut self, html: &str) {
        let dropped = self.document.set_inner_html(self.root_element, html);
        tracing::debug!("Replaced {} elements", dropped.len());
        self.attach_handlers();
    }

    /// Walk the current view and (re)attach every handler, rebuilding the
    /// node to element index. Safe to repeat on unchanged markup.
    pub(super) fn attach_handlers(&mut self) {
        self.attached.clear();

        let mut nodes = 0;
        let mut targets = 0;
        for el in self.document.descendants(self.root_element) {
            if let Some(id) = self.document.attr(el, NODE_ID_ATTR).map(NodeId::from) {
                if !self.tree.contains(&id) {
                    tracing::warn!("Rendered node {} is not in the tree; skipping", id);
                    continue;
                }
                self.document.unlisten_all(el);
                self.document
                    .listen(el, EventKind::Click, Handler::OpenEditor(id.clone()));
                self.attached.insert(id, el);
                nodes += 1;
            } else if self.document.has_class(el, PLACEHOLDER_CLASS) {
                let Some(slot) = self.document.attr(el, SLOT_NAME_ATTR).map(str::to_string) else {
                    continue;
                };
                let Some(node) = self.placeholder_owner(el) else {
                    continue;
                };
                if !self.tree.contains(&node) {
                    continue;
                }
                self.document.unlisten_all(el);
                for kind in SLOT_EVENTS {
                    self.document.listen(
                        el,
                        kind,
                        Handler::SlotTarget {
                            node: node.clone(),
                            slot: slot.clone(),
                        },
                    );
                }
                targets += 1;
            }
        }

        tracing::debug!("Attached {} nodes and {} drop targets", nodes, targets);
    }

    /// Node a placeholder belongs to: the nearest enclosing rendered
    /// component, or the root when there is none.
    pub(super) fn placeholder_owner(&self, el: ElementId) -> Option<NodeId> {
        let owner = self
            .document
            .ancestors_inclusive(el)
            .into_iter()
            .skip(1)
            .take_while(|id| *id != self.root_element)
            .find_map(|id| self.document.attr(id, NODE_ID_ATTR));

        match owner {
            Some(id) => Some(NodeId::from(id)),
            None if self.document.contains(el) => Some(self.tree.root().clone()),
            None => None,
        }
    }
}
