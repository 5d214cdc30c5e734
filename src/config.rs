//! Runtime configuration, read from the environment.
//!
//! - `STORYBUILDER_MANIFEST` - Component manifest file (default: `<data dir>/components.yml`)
//! - `STORYBUILDER_HOST` / `STORYBUILDER_PORT` - Listen address (default: `127.0.0.1:3000`)
//! - `STORYBUILDER_DEBOUNCE_MS` - Text edit idle window (default: 2000)
//! - `STORYBUILDER_REFRESH_POLICY` - `last-arrival` (default) or `sequenced`

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub manifest_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let manifest_path = match std::env::var("STORYBUILDER_MANIFEST") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_manifest_path()?,
        };

        let host = std::env::var("STORYBUILDER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());

        let port = std::env::var("STORYBUILDER_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            manifest_path,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `<data dir>/components.yml` for the current platform.
pub fn default_manifest_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "storybuilder")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("components.yml"))
}

/// How the canvas treats render responses that arrive out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Apply every response as it arrives; a slow older response can
    /// overwrite a newer one.
    #[default]
    LastArrival,
    /// Discard responses older than the last one applied.
    Sequenced,
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-arrival" | "last_arrival" => Ok(Self::LastArrival),
            "sequenced" => Ok(Self::Sequenced),
            other => Err(format!("Unknown refresh policy: {}", other)),
        }
    }
}

/// Canvas behaviour.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub debounce: Duration,
    pub refresh_policy: RefreshPolicy,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

impl CanvasConfig {
    pub fn from_env() -> Self {
        let debounce = std::env::var("STORYBUILDER_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        let refresh_policy = match std::env::var("STORYBUILDER_REFRESH_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; using last-arrival", e);
                RefreshPolicy::LastArrival
            }),
            Err(_) => RefreshPolicy::default(),
        };

        Self {
            debounce,
            refresh_policy,
        }
    }

    pub fn sequenced(mut self) -> Self {
        self.refresh_policy = RefreshPolicy::Sequenced;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}
