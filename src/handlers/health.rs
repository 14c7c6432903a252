//! Liveness and dependency health.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.store.health_check().await.is_ok();
    let revocation_ok = state.revocation.health_check().await.is_ok();

    let status = if db_ok && revocation_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if status == StatusCode::OK { "ok" } else { "degraded" },
        "service": state.config.service_name,
        "version": state.config.service_version,
        "dependencies": {
            "database": if db_ok { "up" } else { "down" },
            "revocation": if revocation_ok { "up" } else { "down" },
        },
    });

    (status, Json(body))
}
