use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{User, UserChanges};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::cascade::DeleteReport;
use crate::services::users_service::ChangePasswordRequest;

/// GET /api/users/me - The caller's profile
pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users().me(auth.user_id).await?))
}

/// PATCH /api/users/me - Update username or avatar
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UserChanges>,
) -> ApiResult<User> {
    let user = state.users().update(auth.user_id, body).await?;
    Ok(ApiResponse::success(user).with_message("Profile updated"))
}

/// PATCH /api/users/change-password - Replace the password after checking the current one
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    state.users().change_password(auth.user_id, body).await?;
    Ok(ApiResponse::success(()).with_message("Password changed"))
}

/// DELETE /api/users/:user_id - Delete the caller's own account
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<DeleteReport> {
    let report = state.users().delete_account(auth.user_id, user_id).await?;
    Ok(ApiResponse::success(report).with_message("Account deleted"))
}
