//! HTTP client for the page-builder server.
//!
//! This is the canvas side of the three round-trips: manifest fetch, tree
//! render and editor markup fetch. Configuration is via environment variables:
//! - `STORYBUILDER_URL` - Base URL (default: `http://127.0.0.1:3000`)

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{HtmlResponse, ManifestEntry, RenderRequest};

/// Default URL for local development.
const DEFAULT_URL: &str = "http://127.0.0.1:3000";

/// Transport failures. The canvas leaves its tree and view untouched on any of these.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    Server(String),
}

#[derive(Debug, Clone)]
pub struct BuilderClient {
    base_url: String,
    client: Client,
}

impl BuilderClient {
    /// Create client from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("STORYBUILDER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(ClientError::BadRequest(body))
                }
                _ => Err(ClientError::Server(format!("{}: {}", status, body))),
            }
        }
    }

    /// Fetch the component manifest.
    pub async fn get_manifest(&self) -> Result<Vec<ManifestEntry>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/components")
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Render the canvas tree; returns the markup for the canvas element.
    pub async fn render(&self, request: &RenderRequest) -> Result<String, ClientError> {
        let response = self
            .request(reqwest::Method::PATCH, "/components/root")
            .json(request)
            .send()
            .await?;
        let body: HtmlResponse = self.handle_response(response).await?;
        Ok(body.html)
    }

    /// Fetch the property-editor markup for a component type.
    pub async fn get_settings(&self, component: &str) -> Result<String, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/settings/{}", component))
            .send()
            .await?;
        let body: HtmlResponse = self.handle_response(response).await?;
        Ok(body.html)
    }
}
