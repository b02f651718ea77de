use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "object-gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "bucket": state.store.bucket(),
        })),
    )
}
