//! Property-editor sessions, one per component type.
//!
//! A session is created the first time a node of its type is clicked and lives
//! for the rest of the page. Its editor markup is fetched once; while that
//! fetch is in flight further clicks only update which node the session will
//! bind to. The same editor is rebound to whichever node was clicked last.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::{ParameterSpec, Props};
use crate::tree::NodeId;

use super::dom::ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Enumerated parameter; changes commit immediately.
    Select,
    /// Free text; changes are debounced.
    Text,
}

/// A form control bound to a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub param: String,
    pub kind: FieldKind,
    pub element: ElementId,
}

/// Properties to write into a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub node: NodeId,
    pub properties: Props,
}

#[derive(Debug, Clone)]
struct PendingEdits {
    values: Props,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    component: String,
    schema: Vec<ParameterSpec>,
    container: ElementId,
    fields: Vec<FieldBinding>,
    bound_node: Option<NodeId>,
    props: Props,
    pending: Option<PendingEdits>,
}

impl EditorSession {
    pub fn new(
        component: impl Into<String>,
        schema: Vec<ParameterSpec>,
        container: ElementId,
        fields: Vec<FieldBinding>,
    ) -> Self {
        Self {
            component: component.into(),
            schema,
            container,
            fields,
            bound_node: None,
            props: Props::new(),
            pending: None,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn schema(&self) -> &[ParameterSpec] {
        &self.schema
    }

    /// Root element of the editor markup.
    pub fn container(&self) -> ElementId {
        self.container
    }

    pub fn fields(&self) -> &[FieldBinding] {
        &self.fields
    }

    pub fn field(&self, param: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.param == param)
    }

    pub fn bound_node(&self) -> Option<&NodeId> {
        self.bound_node.as_ref()
    }

    /// Accumulated edits for the bound node.
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Bind `node`, seeding edits from its current properties.
    ///
    /// Edits still waiting on the debounce belong to the previous node and
    /// are returned as its final commit.
    pub fn bind(&mut self, node: NodeId, current: &Props) -> Option<Commit> {
        let flushed = self.flush();
        self.bound_node = Some(node);
        self.props = current.clone();
        flushed
    }

    /// Reset accumulated edits to `current`, keeping anything still pending.
    pub fn reseed(&mut self, current: &Props) {
        self.props = current.clone();
    }

    /// Forget the bound node if it was discarded from the tree.
    pub fn release(&mut self, discarded: &[NodeId]) {
        if self
            .bound_node
            .as_ref()
            .is_some_and(|n| discarded.contains(n))
        {
            if self.pending.take().is_some() {
                tracing::warn!("Dropping pending {} edits for a removed node", self.component);
            }
            self.bound_node = None;
            self.props = Props::new();
        }
    }

    /// Record a field change.
    ///
    /// Select changes commit at once. Text changes restart the session's
    /// single debounce timer; only the last value per field within the idle
    /// window is kept.
    pub fn capture(
        &mut self,
        param: &str,
        value: serde_json::Value,
        kind: FieldKind,
        now: Instant,
        debounce: Duration,
    ) -> Option<Commit> {
        match kind {
            FieldKind::Select => {
                self.props.insert(param.to_string(), value);
                self.commit()
            }
            FieldKind::Text => {
                let pending = self.pending.get_or_insert_with(|| PendingEdits {
                    values: Props::new(),
                    deadline: now,
                });
                pending.values.insert(param.to_string(), value);
                pending.deadline = now + debounce;
                None
            }
        }
    }

    /// Commit debounced edits whose idle window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<Commit> {
        match &self.pending {
            Some(p) if p.deadline <= now => self.flush(),
            _ => None,
        }
    }

    fn flush(&mut self) -> Option<Commit> {
        let pending = self.pending.take()?;
        self.props.extend(pending.values);
        self.commit()
    }

    fn commit(&self) -> Option<Commit> {
        match &self.bound_node {
            Some(node) => Some(Commit {
                node: node.clone(),
                properties: self.props.clone(),
            }),
            None => {
                tracing::warn!("{} editor has no bound node; edit not committed", self.component);
                None
            }
        }
    }
}

/// Lifecycle phase of a component type's editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    Uninitialized,
    Loading,
    Ready,
}

/// What the caller must do after asking for an editor.
#[derive(Debug, PartialEq, Eq)]
pub enum EditorRequest {
    /// First request for this type: fetch its markup.
    Fetch,
    /// A fetch is already in flight.
    Pending,
    Ready,
}

#[derive(Debug)]
enum EditorState {
    Loading { bind_on_load: Option<NodeId> },
    Ready(EditorSession),
}

/// Per-type editor cache. Entries are never evicted.
#[derive(Debug, Default)]
pub struct EditorRegistry {
    states: HashMap<String, EditorState>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, component: &str) -> EditorPhase {
        match self.states.get(component) {
            None => EditorPhase::Uninitialized,
            Some(EditorState::Loading { .. }) => EditorPhase::Loading,
            Some(EditorState::Ready(_)) => EditorPhase::Ready,
        }
    }

    /// Ask for the editor of `component` on behalf of `node`.
    ///
    /// At most one fetch per type is ever requested; later callers wait on it,
    /// and the most recent node is the one bound when it lands.
    pub fn request(&mut self, component: &str, node: NodeId) -> EditorRequest {
        match self.states.get_mut(component) {
            None => {
                self.states.insert(
                    component.to_string(),
                    EditorState::Loading {
                        bind_on_load: Some(node),
                    },
                );
                EditorRequest::Fetch
            }
            Some(EditorState::Loading { bind_on_load }) => {
                *bind_on_load = Some(node);
                EditorRequest::Pending
            }
            Some(EditorState::Ready(_)) => EditorRequest::Ready,
        }
    }

    /// Install a loaded session; returns the node waiting to be bound.
    pub fn complete(&mut self, session: EditorSession) -> Option<NodeId> {
        let waiting = match self.states.remove(session.component()) {
            Some(EditorState::Loading { bind_on_load }) => bind_on_load,
            _ => None,
        };
        self.states
            .insert(session.component().to_string(), EditorState::Ready(session));
        waiting
    }

    /// Forget a failed load so a later click can retry.
    pub fn fail(&mut self, component: &str) {
        if matches!(self.states.get(component), Some(EditorState::Loading { .. })) {
            self.states.remove(component);
        }
    }

    pub fn get(&self, component: &str) -> Option<&EditorSession> {
        match self.states.get(component) {
            Some(EditorState::Ready(session)) => Some(session),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, component: &str) -> Option<&mut EditorSession> {
        match self.states.get_mut(component) {
            Some(EditorState::Ready(session)) => Some(session),
            _ => None,
        }
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut EditorSession> {
        self.states.values_mut().filter_map(|s| match s {
            EditorState::Ready(session) => Some(session),
            EditorState::Loading { .. } => None,
        })
    }

    /// Drop discarded nodes from sessions and pending loads.
    pub fn release(&mut self, discarded: &[NodeId]) {
        for state in self.states.values_mut() {
            match state {
                EditorState::Ready(session) => session.release(discarded),
                EditorState::Loading { bind_on_load } => {
                    if bind_on_load.as_ref().is_some_and(|n| discarded.contains(n)) {
                        *bind_on_load = None;
                    }
                }
            }
        }
    }

    /// Earliest pending debounce deadline across sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.states
            .values()
            .filter_map(|s| match s {
                EditorState::Ready(session) => session.deadline(),
                EditorState::Loading { .. } => None,
            })
            .min()
    }
}
