use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storybuilder::canvas::CanvasDriver;
use storybuilder::catalog::Manifest;
use storybuilder::client::BuilderClient;
use storybuilder::config::{CanvasConfig, ServerConfig};
use storybuilder::models::{RenderRequest, SerializedNode, MAIN_SLOT};
use storybuilder::render::Renderer;
use storybuilder::tree::NodeId;
use storybuilder::{api, tree};

#[derive(Parser)]
#[command(name = "sb")]
#[command(about = "Drag-and-drop page builder over a component manifest")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the render server
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Component manifest (YAML or JSON)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Print the loaded manifest as JSON
    Manifest {
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Render a serialized tree file to stdout
    Render {
        /// JSON file holding the main node, or a full render request
        tree: PathBuf,

        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Drop every palette component onto a running server's canvas
    Probe {
        /// Server URL (default: STORYBUILDER_URL)
        #[arg(short, long)]
        url: Option<String>,
    },
}

/// Initialize tracing. Logs go to stderr so command output stays clean.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "storybuilder=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_manifest(config: &ServerConfig, path: Option<PathBuf>) -> anyhow::Result<Manifest> {
    let path = path.unwrap_or_else(|| config.manifest_path.clone());
    Manifest::load(&path)
}

async fn probe(client: BuilderClient) -> anyhow::Result<()> {
    let mut driver = CanvasDriver::connect(client, CanvasConfig::from_env()).await?;
    let root = NodeId::root();
    let names: Vec<String> = driver
        .canvas()
        .manifest()
        .entries()
        .iter()
        .map(|e| e.name.clone())
        .collect();

    let mut failed = 0;
    for name in &names {
        let commands = driver.canvas_mut().drop_component(&root, MAIN_SLOT, name)?;
        match driver.run(commands).await {
            Ok(()) => println!("{:<32} ok", name),
            Err(e) => {
                failed += 1;
                println!("{:<32} {}", name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} components failed to render", failed, names.len());
    }
    Ok(())
}

async fn serve(config: ServerConfig, manifest: Manifest) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    tracing::info!("Starting storybuilder server on {}", addr);

    let app = api::create_router(Renderer::new(manifest));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("storybuilder server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            manifest,
        }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            let manifest = load_manifest(&config, manifest)?;
            serve(config, manifest).await?;
        }
        Some(Commands::Manifest { manifest }) => {
            let manifest = load_manifest(&config, manifest)?;
            println!("{}", serde_json::to_string_pretty(manifest.entries())?);
        }
        Some(Commands::Render { tree: path, manifest }) => {
            let manifest = load_manifest(&config, manifest)?;
            let content = std::fs::read_to_string(&path)?;

            let request = match serde_json::from_str::<RenderRequest>(&content) {
                Ok(request) => request,
                Err(_) => {
                    let node: SerializedNode = serde_json::from_str(&content)?;
                    // Validate ids and slots the way the canvas would have built them.
                    tree::ComponentTree::deserialize(&node, &manifest)?;
                    RenderRequest::main(node)
                }
            };

            let html = Renderer::new(manifest).render(&request)?;
            println!("{}", html);
        }
        Some(Commands::Probe { url }) => {
            let client = match url {
                Some(url) => BuilderClient::new(url),
                None => BuilderClient::from_env(),
            };
            tracing::info!("Probing {}", client.base_url());
            probe(client).await?;
        }
        None => {
            // Default: start server
            let manifest = load_manifest(&config, None)?;
            serve(config, manifest).await?;
        }
    }

    Ok(())
}
