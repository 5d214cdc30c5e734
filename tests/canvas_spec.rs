use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use speculate2::speculate;
use storybuilder::canvas::dom::ElementId;
use storybuilder::canvas::{
    Canvas, CanvasDriver, CanvasError, Command, DomEvent, Transport, HIGHLIGHT_CLASS,
};
use storybuilder::catalog::Manifest;
use storybuilder::client::ClientError;
use storybuilder::config::CanvasConfig;
use storybuilder::models::*;
use storybuilder::render::Renderer;
use storybuilder::settings;
use storybuilder::tree::NodeId;
use tokio::time::Instant;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/components.yml");

fn load_fixture() -> Manifest {
    Manifest::load(Path::new(FIXTURE)).expect("Failed to load fixture manifest")
}

/// Transport that renders in-process.
struct LocalTransport {
    renderer: Renderer,
    editor_fetches: AtomicUsize,
    offline: AtomicBool,
}

impl LocalTransport {
    fn new(manifest: Manifest) -> Self {
        Self {
            renderer: Renderer::new(manifest),
            editor_fetches: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }
}

impl Transport for LocalTransport {
    async fn manifest(&self) -> Result<Vec<ManifestEntry>, ClientError> {
        Ok(self.renderer.manifest().entries().to_vec())
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, ClientError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Server("503 Service Unavailable: offline".to_string()));
        }
        self.renderer
            .render(request)
            .map_err(|e| ClientError::BadRequest(e.to_string()))
    }

    async fn fetch_editor(&self, component: &str) -> Result<String, ClientError> {
        self.editor_fetches.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .renderer
            .manifest()
            .get(component)
            .map_err(|e| ClientError::NotFound(e.to_string()))?;
        settings::editor_form(entry).map_err(|e| ClientError::Server(e.to_string()))
    }
}

/// Render every `Render` command in order and apply it.
fn render_all(canvas: &mut Canvas, commands: Vec<Command>) {
    let renderer = Renderer::new(canvas.manifest().clone());
    for command in commands {
        if let Command::Render(refresh) = command {
            let html = renderer.render(&refresh.request).expect("render");
            canvas.apply_render(refresh.seq, &html).expect("apply");
        }
    }
}

fn render_html(canvas: &Canvas, command: &Command) -> (u64, String) {
    let Command::Render(refresh) = command else {
        panic!("expected a render command, got {:?}", command);
    };
    let html = Renderer::new(canvas.manifest().clone())
        .render(&refresh.request)
        .expect("render");
    (refresh.seq, html)
}

fn drop_into(canvas: &mut Canvas, node: &NodeId, slot: &str, component: &str) -> Vec<Command> {
    let target = canvas.placeholder(node, slot).expect("drop target");
    let data = canvas.drag_start(component).expect("drag payload");
    canvas
        .dispatch(target, DomEvent::Drop(data), Instant::now())
        .expect("drop")
        .commands
}

fn open_button_editor(canvas: &mut Canvas, id: &NodeId) {
    let commands = canvas.open_editor(id).expect("open editor");
    assert_eq!(commands, vec![Command::FetchEditor("Button".to_string())]);
    let entry = canvas.manifest().get("Button").expect("Button");
    let form = settings::editor_form(entry).expect("editor form");
    canvas.editor_loaded("Button", &form).expect("editor loaded");
}

fn main_child(canvas: &Canvas) -> NodeId {
    canvas
        .tree()
        .child(&NodeId::root(), MAIN_SLOT)
        .cloned()
        .expect("main occupied")
}

speculate! {
    before {
        let manifest = load_fixture();
        let root = NodeId::root();
    }

    describe "dropping" {
        it "creates exactly one node with a fresh id in an empty slot" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            assert_eq!(canvas.tree().len(), 1);

            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Box");
            assert_eq!(commands.len(), 1);
            assert_eq!(canvas.tree().len(), 2);

            let id = main_child(&canvas);
            assert_ne!(id, root);
            render_all(&mut canvas, commands);
            assert_eq!(canvas.rendered_ids(), vec![id]);
        }

        it "replaces the previous occupant and its subtree" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Box");
            render_all(&mut canvas, commands);
            let first = main_child(&canvas);

            let commands = drop_into(&mut canvas, &first, "body", "Button");
            render_all(&mut canvas, commands);
            let nested = canvas.tree().child(&first, "body").cloned().expect("nested");

            let commands = canvas
                .drop_component(&root, MAIN_SLOT, "Counter")
                .expect("replace");
            let Command::Render(refresh) = &commands[0] else { panic!("expected render") };
            let sent = serde_json::to_string(&refresh.request).expect("serialize");
            assert!(!sent.contains(first.as_str()));

            render_all(&mut canvas, commands);
            let replacement = main_child(&canvas);

            assert_ne!(replacement, first);
            assert!(!canvas.tree().contains(&first));
            assert!(!canvas.tree().contains(&nested));
            assert_eq!(canvas.rendered_ids(), vec![replacement]);
            assert!(canvas.element_of(&first).is_none());
        }

        it "keeps the old occupant clickable when its replacement fails to render" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Box");
            render_all(&mut canvas, commands);
            let boxed = main_child(&canvas);

            let commands = canvas
                .drop_component(&root, MAIN_SLOT, "Button")
                .expect("replace");
            let Command::Render(refresh) = &commands[0] else { panic!("expected render") };
            canvas.render_failed(refresh.seq, &"503 Service Unavailable");

            assert_eq!(main_child(&canvas), boxed);
            let el = canvas.element_of(&boxed).expect("box element");
            assert_eq!(canvas.document().listener_count(el), 1);
            let clicked = canvas
                .dispatch(el, DomEvent::Click, Instant::now())
                .expect("click");
            assert_eq!(clicked.commands, vec![Command::FetchEditor("Box".to_string())]);

            let target = canvas.placeholder(&boxed, "body").expect("body target");
            assert_eq!(canvas.document().listener_count(target), 4);
        }

        it "highlights a target only while dragged over" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let target = canvas.placeholder(&root, MAIN_SLOT).expect("target");

            canvas.dispatch(target, DomEvent::DragEnter, Instant::now()).expect("enter");
            assert!(canvas.document().has_class(target, HIGHLIGHT_CLASS));

            let over = canvas.dispatch(target, DomEvent::DragOver, Instant::now()).expect("over");
            assert!(over.default_prevented);
            assert!(over.commands.is_empty());

            canvas.dispatch(target, DomEvent::DragLeave, Instant::now()).expect("leave");
            assert!(!canvas.document().has_class(target, HIGHLIGHT_CLASS));
        }

        it "ignores drops without a component" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let target = canvas.placeholder(&root, MAIN_SLOT).expect("target");

            let out = canvas
                .dispatch(target, DomEvent::Drop(Default::default()), Instant::now())
                .expect("drop");

            assert!(out.default_prevented);
            assert!(out.commands.is_empty());
            assert_eq!(canvas.tree().len(), 1);
        }

        it "rejects elements it does not know" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let stale = canvas.placeholder(&root, MAIN_SLOT).expect("target");
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Box");
            render_all(&mut canvas, commands);

            assert!(matches!(
                canvas.dispatch(stale, DomEvent::Click, Instant::now()),
                Err(CanvasError::UnknownElement(_))
            ));
        }
    }

    describe "reconciling" {
        it "attaches each handler once however often the view is refreshed" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Layout");
            render_all(&mut canvas, commands);
            let layout = main_child(&canvas);

            for _ in 0..3 {
                let refresh = canvas.refresh().expect("refresh");
                render_all(&mut canvas, vec![refresh]);
            }

            let el = canvas.element_of(&layout).expect("layout element");
            assert_eq!(canvas.document().listener_count(el), 1);
            for slot in ["main", "sidebar"] {
                let target = canvas.placeholder(&layout, slot).expect("slot target");
                assert_eq!(canvas.document().listener_count(target), 4);
            }
        }

        it "routes clicks inside a node to that node" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Layout");
            render_all(&mut canvas, commands);
            let layout = main_child(&canvas);
            let commands = drop_into(&mut canvas, &layout, "sidebar", "Button");
            render_all(&mut canvas, commands);
            let button = canvas.tree().child(&layout, "sidebar").cloned().expect("button");

            let el = canvas.element_of(&button).expect("button element");
            let out = canvas.dispatch(el, DomEvent::Click, Instant::now()).expect("click");

            assert_eq!(out.commands, vec![Command::FetchEditor("Button".to_string())]);
            assert!(canvas.active_editor().is_none());
        }
    }

    describe "editing" {
        it "commits three quick keystrokes once with the last value" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Button");
            render_all(&mut canvas, commands);
            let id = main_child(&canvas);
            open_button_editor(&mut canvas, &id);
            let input = canvas.field_element("Button", "label").expect("label field");

            let t0 = Instant::now();
            let mut issued = Vec::new();
            for (offset, value) in [(0, "G"), (600, "Go"), (1200, "Go!")] {
                let out = canvas
                    .dispatch(
                        input,
                        DomEvent::KeyUp { value: value.to_string() },
                        t0 + Duration::from_millis(offset),
                    )
                    .expect("keyup");
                issued.extend(out.commands);
            }
            assert!(issued.is_empty());

            issued.extend(canvas.flush_due(t0 + Duration::from_millis(3199)).expect("flush"));
            assert!(issued.is_empty());
            issued.extend(canvas.flush_due(t0 + Duration::from_millis(3200)).expect("flush"));
            issued.extend(canvas.flush_due(t0 + Duration::from_millis(9000)).expect("flush"));

            assert_eq!(issued.len(), 1);
            assert_eq!(
                canvas.tree().get(&id).expect("node").properties.get("label"),
                Some(&json!("Go!"))
            );
        }

        it "lets the last clicked node of a type steal the editor" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Layout");
            render_all(&mut canvas, commands);
            let layout = main_child(&canvas);
            let commands = drop_into(&mut canvas, &layout, "main", "Button");
            render_all(&mut canvas, commands);
            let commands = drop_into(&mut canvas, &layout, "sidebar", "Button");
            render_all(&mut canvas, commands);
            let first = canvas.tree().child(&layout, "main").cloned().expect("first");
            let second = canvas.tree().child(&layout, "sidebar").cloned().expect("second");

            open_button_editor(&mut canvas, &first);
            assert!(canvas.open_editor(&second).expect("rebind").is_empty());
            assert_eq!(
                canvas.active_editor().and_then(|s| s.bound_node()),
                Some(&second)
            );

            let select = canvas.field_element("Button", "scheme").expect("scheme field");
            let out = canvas
                .dispatch(select, DomEvent::Change { value: "danger".to_string() }, Instant::now())
                .expect("change");

            assert_eq!(out.commands.len(), 1);
            assert!(canvas.tree().get(&first).expect("first").properties.is_empty());
            assert_eq!(
                canvas.tree().get(&second).expect("second").properties.get("scheme"),
                Some(&json!("danger"))
            );
        }

        it "drops pending edits for a node that was replaced" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let commands = drop_into(&mut canvas, &root, MAIN_SLOT, "Button");
            render_all(&mut canvas, commands);
            let id = main_child(&canvas);
            open_button_editor(&mut canvas, &id);
            let input = canvas.field_element("Button", "label").expect("label field");
            let t0 = Instant::now();
            canvas
                .dispatch(input, DomEvent::KeyUp { value: "Gone".to_string() }, t0)
                .expect("keyup");

            canvas.drop_component(&root, MAIN_SLOT, "Button").expect("replace");

            assert!(canvas.next_deadline().is_none());
            assert!(canvas.flush_due(t0 + Duration::from_secs(5)).expect("flush").is_empty());
            assert!(canvas.active_editor().and_then(|s| s.bound_node()).is_none());
        }
    }

    describe "out-of-order responses" {
        it "shows the response that arrived last by default" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let placed = drop_into(&mut canvas, &root, MAIN_SLOT, "Button");
            let (first_seq, first_html) = render_html(&canvas, &placed[0]);
            canvas.apply_render(first_seq, &first_html).expect("apply");
            let id = main_child(&canvas);
            open_button_editor(&mut canvas, &id);

            let select = canvas.field_element("Button", "scheme").expect("scheme field");
            let a = canvas
                .dispatch(select, DomEvent::Change { value: "danger".to_string() }, Instant::now())
                .expect("change");
            let b = canvas
                .dispatch(select, DomEvent::Change { value: "primary".to_string() }, Instant::now())
                .expect("change");
            let (seq_a, html_a) = render_html(&canvas, &a.commands[0]);
            let (seq_b, html_b) = render_html(&canvas, &b.commands[0]);
            assert!(seq_a < seq_b);

            assert!(canvas.apply_render(seq_b, &html_b).expect("apply newer"));
            assert!(canvas.apply_render(seq_a, &html_a).expect("apply older"));

            let el = canvas.element_of(&id).expect("button element");
            let class = canvas.document().attr(el, "class").expect("class");
            assert!(class.contains("btn-danger"));
            assert_eq!(
                canvas.tree().get(&id).expect("node").properties.get("scheme"),
                Some(&json!("primary"))
            );
        }

        it "discards the older response when sequenced" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default().sequenced());
            let placed = drop_into(&mut canvas, &root, MAIN_SLOT, "Button");
            render_all(&mut canvas, placed);
            let id = main_child(&canvas);
            open_button_editor(&mut canvas, &id);

            let select = canvas.field_element("Button", "scheme").expect("scheme field");
            let a = canvas
                .dispatch(select, DomEvent::Change { value: "danger".to_string() }, Instant::now())
                .expect("change");
            let b = canvas
                .dispatch(select, DomEvent::Change { value: "primary".to_string() }, Instant::now())
                .expect("change");
            let (seq_a, html_a) = render_html(&canvas, &a.commands[0]);
            let (seq_b, html_b) = render_html(&canvas, &b.commands[0]);

            assert!(canvas.apply_render(seq_b, &html_b).expect("apply newer"));
            assert!(!canvas.apply_render(seq_a, &html_a).expect("apply older"));

            let el = canvas.element_of(&id).expect("button element");
            let class = canvas.document().attr(el, "class").expect("class");
            assert!(class.contains("btn-primary"));
            assert_eq!(canvas.in_flight(), 0);
        }

        it "follows an older response that lands after a newer one failed" {
            let mut canvas = Canvas::new(manifest.clone(), CanvasConfig::default());
            let placed = drop_into(&mut canvas, &root, MAIN_SLOT, "Button");
            render_all(&mut canvas, placed);
            let id = main_child(&canvas);
            open_button_editor(&mut canvas, &id);

            let select = canvas.field_element("Button", "scheme").expect("scheme field");
            let a = canvas
                .dispatch(select, DomEvent::Change { value: "danger".to_string() }, Instant::now())
                .expect("change");
            let b = canvas
                .dispatch(select, DomEvent::Change { value: "primary".to_string() }, Instant::now())
                .expect("change");
            let (seq_a, html_a) = render_html(&canvas, &a.commands[0]);
            let (seq_b, _) = render_html(&canvas, &b.commands[0]);

            canvas.render_failed(seq_b, &"503 Service Unavailable");
            assert!(canvas.apply_render(seq_a, &html_a).expect("apply older"));

            let el = canvas.element_of(&id).expect("button element");
            let class = canvas.document().attr(el, "class").expect("class");
            assert!(class.contains("btn-danger"));
            assert_eq!(
                canvas.tree().get(&id).expect("node").properties.get("scheme"),
                Some(&json!("danger"))
            );
            assert_eq!(canvas.last_error(), Some("503 Service Unavailable"));
            assert_eq!(canvas.in_flight(), 0);
        }
    }

    describe "driver" {
        it "builds a button end to end" {
            tokio_test::block_on(async {
                let config = CanvasConfig::default().with_debounce(Duration::from_millis(20));
                let mut driver = CanvasDriver::connect(LocalTransport::new(manifest.clone()), config)
                    .await
                    .expect("connect");

                let target = driver.canvas().placeholder(&root, MAIN_SLOT).expect("target");
                let data = driver.canvas().drag_start("Button").expect("payload");
                assert!(driver.dispatch(target, DomEvent::Drop(data)).await.expect("drop"));

                let canvas_el = driver.canvas().root_element();
                assert_eq!(driver.canvas().document().text_content(canvas_el), "Click me!");

                let id = main_child(driver.canvas());
                let button: ElementId = driver.canvas().element_of(&id).expect("button");
                driver.dispatch(button, DomEvent::Click).await.expect("click");

                let input = driver.canvas().field_element("Button", "label").expect("label field");
                driver
                    .dispatch(input, DomEvent::KeyUp { value: "Go".to_string() })
                    .await
                    .expect("keyup");
                assert_eq!(driver.canvas().document().text_content(canvas_el), "Click me!");

                driver.settle().await.expect("settle");

                assert_eq!(driver.canvas().document().text_content(canvas_el), "Go");
                assert_eq!(driver.canvas().in_flight(), 0);
            });
        }

        it "fetches each editor once" {
            tokio_test::block_on(async {
                let mut driver = CanvasDriver::connect(LocalTransport::new(manifest.clone()), CanvasConfig::default())
                    .await
                    .expect("connect");
                let commands = driver
                    .canvas_mut()
                    .drop_component(&root, MAIN_SLOT, "Button")
                    .expect("drop");
                driver.run(commands).await.expect("render");
                let id = main_child(driver.canvas());

                for _ in 0..3 {
                    let button = driver.canvas().element_of(&id).expect("button");
                    driver.dispatch(button, DomEvent::Click).await.expect("click");
                }

                assert_eq!(driver.transport().editor_fetches.load(Ordering::SeqCst), 1);
                assert_eq!(
                    driver.canvas().active_editor().and_then(|s| s.bound_node()),
                    Some(&id)
                );
            });
        }

        it "leaves tree and view alone when the server is unreachable" {
            tokio_test::block_on(async {
                let mut driver = CanvasDriver::connect(LocalTransport::new(manifest.clone()), CanvasConfig::default())
                    .await
                    .expect("connect");
                driver.transport().offline.store(true, Ordering::SeqCst);

                let target = driver.canvas().placeholder(&root, MAIN_SLOT).expect("target");
                let data = driver.canvas().drag_start("Box").expect("payload");
                let result = driver.dispatch(target, DomEvent::Drop(data)).await;

                assert!(matches!(result, Err(CanvasError::Transport(ClientError::Server(_)))));
                assert_eq!(driver.canvas().tree().len(), 1);
                assert!(driver.canvas().placeholder(&root, MAIN_SLOT).is_some());
                assert!(driver.canvas().last_error().is_some());
            });
        }
    }
}
