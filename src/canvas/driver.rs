//! Runs canvas commands against the server.

use std::collections::VecDeque;

use tokio::time::Instant;

use crate::catalog::Manifest;
use crate::client::{BuilderClient, ClientError};
use crate::config::CanvasConfig;
use crate::models::{ManifestEntry, RenderRequest};

use super::dom::ElementId;
use super::{Canvas, CanvasError, Command, DomEvent};

/// The three round-trips the canvas makes.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn manifest(&self) -> Result<Vec<ManifestEntry>, ClientError>;

    async fn render(&self, request: &RenderRequest) -> Result<String, ClientError>;

    async fn fetch_editor(&self, component: &str) -> Result<String, ClientError>;
}

impl Transport for BuilderClient {
    async fn manifest(&self) -> Result<Vec<ManifestEntry>, ClientError> {
        self.get_manifest().await
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, ClientError> {
        BuilderClient::render(self, request).await
    }

    async fn fetch_editor(&self, component: &str) -> Result<String, ClientError> {
        self.get_settings(component).await
    }
}

/// Drives a [`Canvas`] over a [`Transport`].
///
/// Commands run one at a time in issue order, so responses here never
/// arrive out of order.
#[derive(Debug)]
pub struct CanvasDriver<T> {
    transport: T,
    canvas: Canvas,
}

impl<T: Transport> CanvasDriver<T> {
    /// Fetch the manifest and open an empty canvas.
    pub async fn connect(transport: T, config: CanvasConfig) -> anyhow::Result<Self> {
        let entries = transport.manifest().await?;
        let manifest = Manifest::new(entries)?;
        tracing::info!("Canvas connected ({} components)", manifest.entries().len());

        Ok(Self {
            transport,
            canvas: Canvas::new(manifest, config),
        })
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatch an event and run whatever it triggers.
    ///
    /// Returns whether the event's default action was prevented.
    pub async fn dispatch(&mut self, target: ElementId, event: DomEvent) -> Result<bool, CanvasError> {
        let dispatched = self.canvas.dispatch(target, event, Instant::now())?;
        self.run(dispatched.commands).await?;
        Ok(dispatched.default_prevented)
    }

    /// Run commands and any follow-ups they produce.
    ///
    /// A failed round-trip is reported to the canvas and the rest still run;
    /// the first failure is returned.
    pub async fn run(&mut self, commands: Vec<Command>) -> Result<(), CanvasError> {
        let mut queue: VecDeque<Command> = commands.into();
        let mut first_error = None;

        while let Some(command) = queue.pop_front() {
            match command {
                Command::Render(refresh) => match self.transport.render(&refresh.request).await {
                    Ok(html) => {
                        self.canvas.apply_render(refresh.seq, &html)?;
                    }
                    Err(e) => {
                        self.canvas.render_failed(refresh.seq, &e);
                        first_error.get_or_insert(CanvasError::Transport(e));
                    }
                },
                Command::FetchEditor(component) => {
                    match self.transport.fetch_editor(&component).await {
                        Ok(html) => queue.extend(self.canvas.editor_loaded(&component, &html)?),
                        Err(e) => {
                            self.canvas.editor_failed(&component, &e);
                            first_error.get_or_insert(CanvasError::Transport(e));
                        }
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Commit debounced edits that are due now.
    pub async fn tick(&mut self) -> Result<(), CanvasError> {
        let commands = self.canvas.flush_due(Instant::now())?;
        self.run(commands).await
    }

    /// Wait out every pending debounce window.
    pub async fn settle(&mut self) -> Result<(), CanvasError> {
        while let Some(deadline) = self.canvas.next_deadline() {
            tokio::time::sleep_until(deadline).await;
            self.tick().await?;
        }
        Ok(())
    }
}
