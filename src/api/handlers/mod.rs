use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::models::*;
use crate::render::{RenderError, Renderer};
use crate::settings;

// ============================================================
// Error Handling
// ============================================================

/// Map a render failure to a response.
///
/// Lookup and coercion failures describe the request, so their message goes
/// back to the canvas as 422. Anything else is logged and sanitized.
fn render_error(e: RenderError) -> (StatusCode, String) {
    match e {
        RenderError::Lookup(_) | RenderError::Coercion(_) => {
            let msg = e.to_string();
            tracing::warn!("Rejected render: {}", msg);
            (StatusCode::UNPROCESSABLE_ENTITY, msg)
        }
        RenderError::Component { .. } => {
            tracing::error!("Render failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Manifest
// ============================================================

pub async fn list_components(State(renderer): State<Renderer>) -> Json<Vec<ManifestEntry>> {
    Json(renderer.manifest().entries().to_vec())
}

// ============================================================
// Rendering
// ============================================================

/// Render the canvas tree. The path id is the canvas root and is not used;
/// the request always addresses the `main` slot.
pub async fn render_components(
    State(renderer): State<Renderer>,
    Path(id): Path<String>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<HtmlResponse>, (StatusCode, String)> {
    let nodes = request.main_node().map(|n| n.ids().len()).unwrap_or(0);
    tracing::info!("Rendering canvas {} ({} nodes)", id, nodes);

    renderer
        .render(&request)
        .map(|html| Json(HtmlResponse { html }))
        .map_err(render_error)
}

// ============================================================
// Settings
// ============================================================

pub async fn show_settings(
    State(renderer): State<Renderer>,
    Path(component): Path<String>,
) -> Result<Json<HtmlResponse>, (StatusCode, String)> {
    let entry = renderer.manifest().get(&component).map_err(|e| {
        tracing::warn!("Settings requested for {}: {}", component, e);
        (StatusCode::NOT_FOUND, e.to_string())
    })?;

    let html = settings::editor_form(entry).map_err(|e| {
        tracing::error!("Settings form for {} failed: {}", component, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    })?;

    Ok(Json(HtmlResponse { html }))
}
