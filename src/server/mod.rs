use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub mod handlers;
pub mod state;

use self::state::AppState;
use handlers::{browse, images, index_html, script_js, style_css, tag_image, thumbnail};

// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_html))
        .route("/style.css", get(style_css))
        .route("/script.js", get(script_js))
        .route("/api/browse", get(browse))
        .route("/api/images", get(images))
        .route("/api/thumbnail/*filename", get(thumbnail))
        .route("/api/tag", post(tag_image))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Serves until Ctrl+C.
pub async fn start_server(state: AppState, port: u16, open_browser: bool) -> Result<()> {
    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let url = format!("http://{}", addr);
    println!("   ✅ HTTP server started successfully at {}", url);
    info!("Listening on {}", url);

    if open_browser {
        if let Err(e) = crate::utils::open_browser(&url) {
            warn!("Could not open browser: {}", e);
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    println!("\n🛑 Shutting down...");
}
