//! Object Gateway
//!
//! HTTP facade over a single S3/MinIO bucket: list, view, download, upload
//! and delete objects. Every handler is a thin pass-through to the
//! [`storage::ObjectStore`] the service was started with.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    BoxError, Router,
};
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::handlers::{files, health};
use crate::models::ApiError;
use crate::storage::ObjectStore;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
///
/// Object routes are nested under `config.server.base_path`. The request
/// timeout bounds time to the response head for every route except upload,
/// whose duration depends on the client's upload speed.
///
/// Objects named `upload` or `view-files` shadow the static routes, so those
/// two paths also answer `DELETE`.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES)
        .unwrap_or(usize::MAX);

    let request_timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_route_error))
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    let object_routes = Router::new()
        .route(
            "/view-files",
            get(files::list_files).delete(files::delete_static_name),
        )
        .route("/view/:object_name", get(files::view_file))
        .route("/download/:object_name", get(files::download_file))
        .route("/:object_name", delete(files::delete_file))
        .route("/upload", delete(files::delete_static_name))
        .route_layer(request_timeout)
        .route("/upload", post(files::upload_file));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest(&state.config.server.base_path, object_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_route_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::Timeout("no response from storage within the request timeout".to_string())
    } else {
        ApiError::Internal(err.to_string())
    }
}
