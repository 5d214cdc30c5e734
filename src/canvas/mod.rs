//! Canvas client core.
//!
//! [`Canvas`] owns the component tree, the rendered document and the editor
//! sessions. It performs no I/O: user events go in through
//! [`Canvas::dispatch`], and the round-trips they require come back out as
//! [`Command`]s. Whoever runs the commands feeds the results back with
//! [`Canvas::apply_render`] / [`Canvas::render_failed`] and
//! [`Canvas::editor_loaded`] / [`Canvas::editor_failed`]. [`driver::CanvasDriver`]
//! does this against a [`driver::Transport`].

pub mod dom;
pub mod driver;
pub mod editor;
mod reconcile;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;
use tokio::time::Instant;

use crate::catalog::{Manifest, ManifestLookupError};
use crate::client::ClientError;
use crate::config::{CanvasConfig, RefreshPolicy};
use crate::models::RenderRequest;
use crate::render::markup;
use crate::settings::PARAM_ATTR;
use crate::tree::{ComponentTree, NodeId, TreeError};

use dom::{Document, ElementId, EventKind};
use editor::{Commit, EditorRegistry, EditorRequest, EditorSession, FieldBinding, FieldKind};

pub use driver::{CanvasDriver, Transport};

/// Key of the drag payload carrying the component name.
pub const DRAG_KEY: &str = "component";
/// Class toggled on a placeholder while something is dragged over it.
pub const HIGHLIGHT_CLASS: &str = "sb-drop-highlight";
/// Attribute naming the component an editor container belongs to.
pub const EDITOR_ATTR: &str = "data-sb-editor";

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Lookup(#[from] ManifestLookupError),

    #[error(transparent)]
    Transport(#[from] ClientError),

    #[error("Unknown element: {0:?}")]
    UnknownElement(ElementId),

    #[error("Editor for {0} is not loaded")]
    NotReady(String),
}

/// What a listener does when its event fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    /// Click on a rendered component.
    OpenEditor(NodeId),
    /// Drag events on an empty content slot.
    SlotTarget { node: NodeId, slot: String },
    /// Input on an editor control.
    EditorField {
        component: String,
        param: String,
        kind: FieldKind,
    },
}

/// Drag-data channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTransfer {
    data: HashMap<String, String>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    pub fn get_data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    Click,
    DragOver,
    DragEnter,
    DragLeave,
    Drop(DataTransfer),
    Change { value: String },
    KeyUp { value: String },
}

impl DomEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomEvent::Click => EventKind::Click,
            DomEvent::DragOver => EventKind::DragOver,
            DomEvent::DragEnter => EventKind::DragEnter,
            DomEvent::DragLeave => EventKind::DragLeave,
            DomEvent::Drop(_) => EventKind::Drop,
            DomEvent::Change { .. } => EventKind::Change,
            DomEvent::KeyUp { .. } => EventKind::KeyUp,
        }
    }
}

/// A render round-trip, tagged with its issue order.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRequest {
    pub seq: u64,
    pub request: RenderRequest,
}

/// Work the canvas needs done outside itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Render(RefreshRequest),
    /// Fetch editor markup for a component type.
    FetchEditor(String),
}

/// Outcome of dispatching one event.
#[derive(Debug, Default, PartialEq)]
pub struct Dispatched {
    pub default_prevented: bool,
    pub commands: Vec<Command>,
}

pub struct Canvas {
    manifest: Manifest,
    config: CanvasConfig,
    tree: ComponentTree,
    document: Document<Handler>,
    root_element: ElementId,
    /// Rendered element of each node currently in the view.
    attached: HashMap<NodeId, ElementId>,
    editors: EditorRegistry,
    active_editor: Option<String>,
    next_seq: u64,
    last_applied: Option<u64>,
    /// Tree snapshot each outstanding render was issued from.
    in_flight: BTreeMap<u64, ComponentTree>,
    /// Newest refresh that failed and has not been superseded by a newer
    /// applied one.
    last_failed: Option<u64>,
    /// Tree the current view was rendered from.
    rendered: ComponentTree,
    last_error: Option<String>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("nodes", &self.tree.len())
            .field("attached", &self.attached.len())
            .field("in_flight", &self.in_flight.keys().collect::<Vec<_>>())
            .field("last_applied", &self.last_applied)
            .finish()
    }
}

impl Canvas {
    /// An empty canvas showing the root's `main` drop target.
    pub fn new(manifest: Manifest, config: CanvasConfig) -> Self {
        let mut document = Document::new();
        let root_element = document.create_element("div");
        document.set_attr(root_element, "id", "canvas");

        let tree = ComponentTree::new();
        let mut canvas = Self {
            manifest,
            config,
            rendered: tree.clone(),
            tree,
            document,
            root_element,
            attached: HashMap::new(),
            editors: EditorRegistry::new(),
            active_editor: None,
            next_seq: 0,
            last_applied: None,
            in_flight: BTreeMap::new(),
            last_failed: None,
            last_error: None,
        };
        canvas.reconcile(&markup::placeholder(crate::models::MAIN_SLOT));
        canvas
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    pub fn document(&self) -> &Document<Handler> {
        &self.document
    }

    pub fn root_element(&self) -> ElementId {
        self.root_element
    }

    /// Element a node was last rendered to.
    pub fn element_of(&self, node: &NodeId) -> Option<ElementId> {
        self.attached.get(node).copied()
    }

    /// Ids present in the current view, in document order.
    pub fn rendered_ids(&self) -> Vec<NodeId> {
        self.document
            .query_attr(self.root_element, markup::NODE_ID_ATTR)
            .into_iter()
            .filter_map(|el| self.document.attr(el, markup::NODE_ID_ATTR))
            .map(NodeId::from)
            .collect()
    }

    /// Placeholder element standing in for `slot` of `node`.
    pub fn placeholder(&self, node: &NodeId, slot: &str) -> Option<ElementId> {
        self.document
            .query_class(self.root_element, markup::PLACEHOLDER_CLASS)
            .into_iter()
            .find(|el| {
                self.document.attr(*el, markup::SLOT_NAME_ATTR) == Some(slot)
                    && self.placeholder_owner(*el).as_ref() == Some(node)
            })
    }

    pub fn editors(&self) -> &EditorRegistry {
        &self.editors
    }

    /// The editor most recently opened.
    pub fn active_editor(&self) -> Option<&EditorSession> {
        self.active_editor
            .as_deref()
            .and_then(|component| self.editors.get(component))
    }

    /// Control bound to `param` in the editor for `component`.
    pub fn field_element(&self, component: &str, param: &str) -> Option<ElementId> {
        self.editors
            .get(component)
            .and_then(|s| s.field(param))
            .map(|f| f.element)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    /// Most recent round-trip failure, for display.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.editors.next_deadline()
    }

    // ============================================================
    // Events
    // ============================================================

    /// Payload for dragging `component` off the palette.
    pub fn drag_start(&self, component: &str) -> Result<DataTransfer, CanvasError> {
        self.manifest.get(component)?;
        let mut data = DataTransfer::new();
        data.set_data(DRAG_KEY, component);
        Ok(data)
    }

    /// Deliver `event` to `target`. The event bubbles to the nearest element
    /// with a listener for it and stops there.
    pub fn dispatch(
        &mut self,
        target: ElementId,
        event: DomEvent,
        now: Instant,
    ) -> Result<Dispatched, CanvasError> {
        if !self.document.contains(target) {
            return Err(CanvasError::UnknownElement(target));
        }

        let Some((el, handler)) = self
            .document
            .bubble(target, event.kind())
            .map(|(el, h)| (el, h.clone()))
        else {
            return Ok(Dispatched::default());
        };

        let mut out = Dispatched::default();
        match (handler, event) {
            (Handler::OpenEditor(node), DomEvent::Click) => {
                out.commands = self.open_editor(&node)?;
            }
            (Handler::SlotTarget { .. }, DomEvent::DragOver) => {
                out.default_prevented = true;
            }
            (Handler::SlotTarget { .. }, DomEvent::DragEnter) => {
                self.document.add_class(el, HIGHLIGHT_CLASS);
            }
            (Handler::SlotTarget { .. }, DomEvent::DragLeave) => {
                self.document.remove_class(el, HIGHLIGHT_CLASS);
            }
            (Handler::SlotTarget { node, slot }, DomEvent::Drop(data)) => {
                out.default_prevented = true;
                self.document.remove_class(el, HIGHLIGHT_CLASS);
                match data.get_data(DRAG_KEY) {
                    Some(component) => {
                        let component = component.to_string();
                        out.commands = self.drop_component(&node, &slot, &component)?;
                    }
                    None => tracing::warn!("Drop on {}.{} without a component", node, slot),
                }
            }
            (
                Handler::EditorField {
                    component,
                    param,
                    kind,
                },
                DomEvent::Change { value } | DomEvent::KeyUp { value },
            ) => {
                out.commands = self.edit_field(&component, &param, kind, value, now)?;
            }
            (handler, event) => {
                tracing::debug!("Ignoring {:?} for {:?}", event.kind(), handler);
            }
        }
        Ok(out)
    }

    /// Place a new `component` node into `slot` of `node` and re-render.
    ///
    /// A previous occupant is discarded: its listeners are detached now and
    /// its element disappears with the next applied render.
    pub fn drop_component(
        &mut self,
        node: &NodeId,
        slot: &str,
        component: &str,
    ) -> Result<Vec<Command>, CanvasError> {
        let placement = self.tree.place(&self.manifest, node, slot, component)?;
        tracing::debug!("Placed {} {} in {}.{}", component, placement.id, node, slot);

        for id in &placement.discarded {
            if let Some(el) = self.attached.remove(id) {
                for inner in self.document.descendants(el) {
                    self.document.unlisten_all(inner);
                }
                self.document.unlisten_all(el);
            }
        }
        self.editors.release(&placement.discarded);

        Ok(vec![self.refresh()?])
    }

    /// Serialize the tree and issue a render for it.
    pub fn refresh(&mut self) -> Result<Command, CanvasError> {
        let root = self.tree.serialize()?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.insert(seq, self.tree.clone());
        tracing::debug!("Refresh {} issued", seq);

        Ok(Command::Render(RefreshRequest {
            seq,
            request: RenderRequest::from_root(root),
        }))
    }

    /// Apply the markup returned for render `seq`.
    ///
    /// Returns whether the view was replaced. Under
    /// [`RefreshPolicy::Sequenced`] a response older than the last applied
    /// one is discarded.
    pub fn apply_render(&mut self, seq: u64, html: &str) -> Result<bool, CanvasError> {
        let Some(snapshot) = self.in_flight.remove(&seq) else {
            tracing::warn!("Ignoring response for unknown refresh {}", seq);
            return Ok(false);
        };

        if self.config.refresh_policy == RefreshPolicy::Sequenced
            && self.last_applied.is_some_and(|last| last > seq)
        {
            tracing::debug!("Discarding stale refresh {}", seq);
            return Ok(false);
        }

        self.last_applied = Some(seq);
        match self.last_failed {
            // An older render landed after a newer one failed. The view now
            // shows this snapshot, so unless something newer than the
            // failure is still outstanding the tree follows it.
            Some(failed) if failed > seq => {
                if self.in_flight.range(failed + 1..).next().is_none() {
                    self.tree = snapshot.clone();
                    self.resync_editors();
                }
            }
            _ => {
                self.last_failed = None;
                self.last_error = None;
            }
        }
        self.rendered = snapshot;
        self.reconcile(html);
        Ok(true)
    }

    /// Record a failed render. The view is left as it was; once nothing else
    /// is outstanding the tree returns to the state the view shows.
    pub fn render_failed(&mut self, seq: u64, error: &dyn fmt::Display) {
        self.in_flight.remove(&seq);
        tracing::warn!("Refresh {} failed: {}", seq, error);
        self.last_error = Some(error.to_string());
        self.last_failed = self.last_failed.max(Some(seq));

        if self.in_flight.is_empty() {
            self.tree = self.rendered.clone();
            self.resync_editors();
            self.attach_handlers();
        }
    }

    fn resync_editors(&mut self) {
        let gone: Vec<NodeId> = self
            .editors
            .sessions_mut()
            .filter_map(|s| s.bound_node().cloned())
            .filter(|id| !self.tree.contains(id))
            .collect();
        self.editors.release(&gone);

        for session in self.editors.sessions_mut() {
            if let Some(node) = session.bound_node().and_then(|id| self.tree.get(id)) {
                session.reseed(&node.properties);
            }
        }
    }

    // ============================================================
    // Editors
    // ============================================================

    /// Open the editor for `node`, fetching it on first use of its type.
    pub fn open_editor(&mut self, node: &NodeId) -> Result<Vec<Command>, CanvasError> {
        let component = self
            .tree
            .get(node)
            .map(|n| n.component.clone())
            .ok_or_else(|| TreeError::MissingNode(node.clone()))?;
        self.manifest.get(&component)?;
        self.active_editor = Some(component.clone());

        match self.editors.request(&component, node.clone()) {
            EditorRequest::Fetch => Ok(vec![Command::FetchEditor(component)]),
            EditorRequest::Pending => Ok(Vec::new()),
            EditorRequest::Ready => self.bind_editor(&component, node),
        }
    }

    fn bind_editor(&mut self, component: &str, node: &NodeId) -> Result<Vec<Command>, CanvasError> {
        let current = self
            .tree
            .get(node)
            .map(|n| n.properties.clone())
            .ok_or_else(|| TreeError::MissingNode(node.clone()))?;
        let session = self
            .editors
            .get_mut(component)
            .ok_or_else(|| CanvasError::NotReady(component.to_string()))?;

        match session.bind(node.clone(), &current) {
            Some(commit) => self.commit(commit),
            None => Ok(Vec::new()),
        }
    }

    /// Install fetched editor markup for `component`.
    ///
    /// Every control naming a parameter of the component's schema becomes a
    /// field; enumerated parameters commit on change, the rest are debounced.
    pub fn editor_loaded(&mut self, component: &str, html: &str) -> Result<Vec<Command>, CanvasError> {
        let schema = self.manifest.get(component)?.parameters.clone();
        if self.editors.get(component).is_some() {
            tracing::warn!("{} editor already loaded; ignoring markup", component);
            return Ok(Vec::new());
        }

        let container = self.document.create_element("div");
        self.document.set_attr(container, EDITOR_ATTR, component);
        self.document.set_inner_html(container, html);

        let mut fields = Vec::new();
        for el in self.document.query_attr(container, PARAM_ATTR) {
            let Some(param) = self.document.attr(el, PARAM_ATTR).map(str::to_string) else {
                continue;
            };
            let Some(spec) = schema.iter().find(|p| p.name == param) else {
                tracing::warn!("{} editor has a control for unknown parameter {}", component, param);
                continue;
            };
            let kind = if spec.is_enumerated() {
                FieldKind::Select
            } else {
                FieldKind::Text
            };

            let handler = Handler::EditorField {
                component: component.to_string(),
                param: param.clone(),
                kind,
            };
            self.document.listen(el, EventKind::Change, handler.clone());
            if kind == FieldKind::Text {
                self.document.listen(el, EventKind::KeyUp, handler);
            }
            fields.push(FieldBinding {
                param,
                kind,
                element: el,
            });
        }
        tracing::debug!("{} editor ready with {} fields", component, fields.len());

        let session = EditorSession::new(component, schema, container, fields);
        match self.editors.complete(session) {
            Some(node) if self.tree.contains(&node) => self.bind_editor(component, &node),
            _ => Ok(Vec::new()),
        }
    }

    /// Record a failed editor fetch; the next click retries.
    pub fn editor_failed(&mut self, component: &str, error: &dyn fmt::Display) {
        tracing::warn!("Loading {} editor failed: {}", component, error);
        self.last_error = Some(error.to_string());
        self.editors.fail(component);
    }

    /// Feed a control's new value into its editor session.
    pub fn edit_field(
        &mut self,
        component: &str,
        param: &str,
        kind: FieldKind,
        value: String,
        now: Instant,
    ) -> Result<Vec<Command>, CanvasError> {
        let debounce = self.config.debounce;
        let session = self
            .editors
            .get_mut(component)
            .ok_or_else(|| CanvasError::NotReady(component.to_string()))?;

        match session.capture(param, serde_json::Value::String(value), kind, now, debounce) {
            Some(commit) => self.commit(commit),
            None => Ok(Vec::new()),
        }
    }

    /// Commit every debounced edit whose idle window has passed by `now`.
    pub fn flush_due(&mut self, now: Instant) -> Result<Vec<Command>, CanvasError> {
        let commits: Vec<Commit> = self
            .editors
            .sessions_mut()
            .filter_map(|s| s.take_due(now))
            .collect();
        if commits.is_empty() {
            return Ok(Vec::new());
        }

        for commit in commits {
            self.tree.set_properties(&commit.node, commit.properties)?;
        }
        Ok(vec![self.refresh()?])
    }

    fn commit(&mut self, commit: Commit) -> Result<Vec<Command>, CanvasError> {
        tracing::debug!("Committing {} props to {}", commit.properties.len(), commit.node);
        self.tree.set_properties(&commit.node, commit.properties)?;
        Ok(vec![self.refresh()?])
    }
}
