use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::DatabaseManager;
use crate::error::ApiError;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "status": "success",
        "data": {
            "name": "Tours API (Rust)",
            "version": version,
            "description": "Tour booking REST API built with Rust (Axum)",
            "endpoints": {
                "tours": "/api/v1/tours[/:id] (reads public, writes admin or lead-guide)",
                "aliases": "/api/v1/tours/top-5-tours, /api/v1/tours/tour-stats, /api/v1/tours/monthly-plan/:year",
                "auth": "/api/v1/users/{signup,login,forgot-password,reset-password/:token,update-password/:id}",
                "users": "/api/v1/users[/:id], /api/v1/users/me (protected)",
                "health": "/health",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "data": {
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "Database unavailable",
                    "data": {
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}

/// Catch-all for paths no router claims
pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}
