use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe. Always 200; reports whether chat is usable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let provider = if state.advisor.provider_state().is_ready() {
        "ready"
    } else {
        "halted"
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "finbot",
            "version": env!("CARGO_PKG_VERSION"),
            "provider": provider
        })),
    )
}

/// Readiness probe. 503 while the credential is missing or rejected.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.advisor.provider_state().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
