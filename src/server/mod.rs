//! HTTP ingress for the orchestrator.
//!
//! Three endpoints drive the whole flow: upload an OpenAPI document,
//! generate test cases for selected endpoints, execute a suite against
//! a base URL.
//!
//! # Module Structure
//!
//! - `handlers` - HTTP route handlers
//! - `models` - API request/response types (DTOs)

mod handlers;
mod models;

pub use models::{ExecuteTestsRequest, GenerateTestsRequest, TestRunResponse, UploadResponse};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{routing::post, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::error::Result;
use crate::settings::Settings;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state for the server.
pub struct AppState {
    pub settings: Settings,
}

/// Build the ingress router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/generate-tests", post(handlers::generate_tests))
        .route("/execute-tests", post(handlers::execute_tests))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Start the ingress server and block until it exits.
pub async fn start_server(settings: Settings) -> Result<()> {
    let port = settings.server.port;
    tokio::fs::create_dir_all(&settings.server.upload_dir).await?;

    let state = Arc::new(AppState { settings });
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Torq ingress listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
