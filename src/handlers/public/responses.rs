use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{NewResponse, Response};
use crate::middleware::{ApiResponse, ApiResult};

/// POST /responses/:formId - Submit an anonymous response
pub async fn submit(
    State(state): State<AppState>,
    Path(form_id): Path<Uuid>,
    Json(body): Json<NewResponse>,
) -> ApiResult<Response> {
    let response = state.responses().submit(form_id, body).await?;
    Ok(ApiResponse::created(response).with_message("Response recorded"))
}
