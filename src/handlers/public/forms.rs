use axum::extract::{Path, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::PublicForm;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /public/forms/:formId - The form as shown to respondents
pub async fn show(State(state): State<AppState>, Path(form_id): Path<Uuid>) -> ApiResult<PublicForm> {
    Ok(ApiResponse::success(state.forms().public_view(form_id).await?))
}
