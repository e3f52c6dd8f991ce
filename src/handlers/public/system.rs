use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;

/// GET / - Service banner
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Formmaker API",
            "version": version,
            "endpoints": {
                "auth": "/auth/signup, /auth/login, /auth/forgot-password, /auth/reset-password (public)",
                "public": "/public/forms/:formId, /responses/:formId (public)",
                "users": "/api/users/me, /api/users/change-password, /api/users/:userId (protected)",
                "teams": "/api/teams[/:teamId] (protected)",
                "folders": "/api/folders[/:folderId] (protected)",
                "forms": "/api/forms[/:formId] (protected)",
                "responses": "/api/responses/:formId (protected)",
                "events": "/api/events/:room (protected, server-sent events)",
            }
        }
    }))
}

/// GET /health - Store connectivity probe
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if let Err(e) = state.store.health_check().await {
        tracing::warn!(store = state.store.backend_name(), "health check failed: {}", e);
        return Err(ApiError::service_unavailable("store unavailable"));
    }

    Ok(Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "store": state.store.backend_name()
        }
    })))
}
