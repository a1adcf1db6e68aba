use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 if the document store answers a listing
/// call, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_provinces().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "store": "ok" }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "store": "fail" },
                "reason": e.to_string()
            })),
        ),
    }
}
