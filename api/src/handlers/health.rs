use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// Liveness probe
#[tracing::instrument]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Health check that also touches the user store
#[tracing::instrument(skip(state))]
pub async fn accounts_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.users.count().await {
        Ok(user_count) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "user_count": user_count,
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected",
                    "error": e.to_string(),
                })),
            )
        }
    }
}
