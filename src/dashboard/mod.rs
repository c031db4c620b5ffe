//! Dashboard — Axum web server exposing the engine's read surface.
//!
//! Serves a GET-only REST API and a self-contained HTML page.
//! CORS enabled for local development.

pub mod routes;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    response::Html,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Start the dashboard web server.
///
/// This spawns a background task — it doesn't block.
pub fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "Dashboard server starting on http://localhost:{port}");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind dashboard port");

        axum::serve(listener, app)
            .await
            .expect("Dashboard server error");
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // API routes
        .route("/api/status", get(routes::get_status))
        .route("/api/news", get(routes::list_news))
        .route("/api/news/:id", get(routes::get_news))
        .route("/api/news/:id/pools", get(routes::get_news_pools))
        .route("/api/pools/:id", get(routes::get_pool))
        .route("/api/reputation/:user", get(routes::get_reputation))
        .route("/api/leaderboard", get(routes::get_leaderboard))
        .route("/health", get(routes::health))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
