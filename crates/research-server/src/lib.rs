pub mod routes;
pub mod state;

use research_core::config::AppConfig;
use research_core::tool_registry::ToolRegistry;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::research_routes())
        .merge(routes::history_routes())
        .with_state(state.clone());

    app = app.layer(TraceLayer::new_for_http());

    if state.config.server.cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// Start the HTTP server.
pub async fn serve(config: AppConfig, tools: Arc<ToolRegistry>) -> anyhow::Result<()> {
    let state = AppState::new(config.clone(), tools);
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
