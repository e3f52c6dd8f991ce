use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Folder, FolderChanges, FolderDetails};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::cascade::DeleteReport;
use crate::services::folders_service::NewFolder;

/// POST /api/folders - Create a personal folder, or a team folder when `teamId` is given
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewFolder>,
) -> ApiResult<Folder> {
    let folder = state.folders().create(auth.user_id, body).await?;
    Ok(ApiResponse::created(folder).with_message("Folder created"))
}

/// GET /api/folders/independent - The caller's personal folders
pub async fn independent(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Vec<Folder>> {
    Ok(ApiResponse::success(state.folders().independent_folders(auth.user_id).await?))
}

/// GET /api/folders/team/:teamId - Folders owned by a team
pub async fn of_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<Folder>> {
    Ok(ApiResponse::success(state.folders().team_folders(auth.user_id, team_id).await?))
}

/// GET /api/folders/:folderId - Folder with the forms the caller can see
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(folder_id): Path<Uuid>,
) -> ApiResult<FolderDetails> {
    Ok(ApiResponse::success(state.folders().details(auth.user_id, folder_id).await?))
}

/// PATCH /api/folders/:folderId
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(folder_id): Path<Uuid>,
    Json(body): Json<FolderChanges>,
) -> ApiResult<Folder> {
    Ok(ApiResponse::success(state.folders().update(auth.user_id, folder_id, body).await?))
}

/// DELETE /api/folders/:folderId - Delete the folder, its forms and their responses
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(folder_id): Path<Uuid>,
) -> ApiResult<DeleteReport> {
    let report = state.folders().delete(auth.user_id, folder_id).await?;
    Ok(ApiResponse::success(report).with_message("Folder deleted"))
}
