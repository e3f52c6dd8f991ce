use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::ResponsePage;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::responses_service::ResponseListParams;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseIds {
    pub response_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: u64,
}

/// GET /api/responses/:formId - Filtered, sorted and paged responses
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
    Query(params): Query<ResponseListParams>,
) -> ApiResult<ResponsePage> {
    Ok(ApiResponse::success(state.responses().list(auth.user_id, form_id, params).await?))
}

/// DELETE /api/responses/:formId - Delete several responses at once
pub async fn remove_many(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
    Json(body): Json<ResponseIds>,
) -> ApiResult<Removed> {
    let removed = state.responses().delete_many(auth.user_id, form_id, &body.response_ids).await?;
    Ok(ApiResponse::success(Removed { removed }).with_message("Responses deleted"))
}

/// DELETE /api/responses/:formId/:responseId
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, response_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Removed> {
    state.responses().delete_response(auth.user_id, form_id, response_id).await?;
    Ok(ApiResponse::success(Removed { removed: 1 }).with_message("Response deleted"))
}
