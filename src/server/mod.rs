pub mod handlers;
pub mod types;

use crate::{Result, config::Config, providers::HttpProviders};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::post,
};
use handlers::AppState;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Builds the application router. Body size is capped by
/// `server.max_body_bytes`; the image cap is enforced by the handler.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/assistant", post(handlers::assistant))
        .route("/api/image", post(handlers::image))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    if config.llm.api_key().is_none() {
        info!("OPENAI_API_KEY not configured; /api/assistant will answer 500");
    }
    if config.image.api_token().is_none() || config.image.model().is_none() {
        info!("Image captioning not fully configured; /api/image will answer 500");
    }

    let app = router(AppState::new(config, HttpProviders));

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
