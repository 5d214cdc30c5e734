mod handlers;

use axum::{
    routing::{get, patch},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::render::Renderer;

pub fn create_router(renderer: Renderer) -> Router {
    Router::new()
        // Manifest
        .route("/components", get(handlers::list_components))
        // Render round-trip
        .route("/components/{id}", patch(handlers::render_components))
        // Property editors
        .route("/settings/{component}", get(handlers::show_settings))
        // Health
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(renderer)
}
