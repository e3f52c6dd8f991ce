use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{
    DisabledOnDate, Form, FormChanges, FormDetails, FormDraft, FormListPage, FormMember,
};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::forms_service::{FavouriteToggle, FormDeletion, FormListParams};

#[derive(Debug, Deserialize)]
pub struct MemberEmail {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberId {
    pub member_id: Uuid,
}

/// GET /api/forms - Paged listing: owned, trashed, favourites or shared-with-me
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<FormListParams>,
) -> ApiResult<FormListPage> {
    Ok(ApiResponse::success(state.forms().list(auth.user_id, params).await?))
}

/// POST /api/forms - Create a personal form
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<FormDraft>,
) -> ApiResult<Form> {
    let form = state.forms().create_personal(auth.user_id, body).await?;
    Ok(ApiResponse::created(form).with_message("Form created"))
}

/// POST /api/forms/team/:teamId - Create a form owned by a team
pub async fn create_in_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<FormDraft>,
) -> ApiResult<Form> {
    let form = state.forms().create_in_team(auth.user_id, team_id, body).await?;
    Ok(ApiResponse::created(form).with_message("Form created"))
}

/// POST /api/forms/folder/:folderId - Create a form in a personal folder
pub async fn create_in_folder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(folder_id): Path<Uuid>,
    Json(body): Json<FormDraft>,
) -> ApiResult<Form> {
    let form = state.forms().create_in_folder(auth.user_id, folder_id, body).await?;
    Ok(ApiResponse::created(form).with_message("Form created"))
}

/// POST /api/forms/folder/:folderId/team/:teamId - Create a form in a team folder
pub async fn create_in_team_folder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((folder_id, team_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<FormDraft>,
) -> ApiResult<Form> {
    let form = state
        .forms()
        .create_in_team_folder(auth.user_id, folder_id, team_id, body)
        .await?;
    Ok(ApiResponse::created(form).with_message("Form created"))
}

/// GET /api/forms/:formId
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<FormDetails> {
    Ok(ApiResponse::success(state.forms().details(auth.user_id, form_id).await?))
}

/// PATCH /api/forms/:formId - Update title, logo, settings or elements
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
    Json(body): Json<FormChanges>,
) -> ApiResult<Form> {
    let form = state.forms().update(auth.user_id, form_id, body).await?;
    Ok(ApiResponse::success(form).with_message("Form updated"))
}

/// DELETE /api/forms/:formId - Trash the form, or remove it if already trashed
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<FormDeletion> {
    let outcome = state.forms().delete(auth.user_id, form_id).await?;
    let message = match outcome {
        FormDeletion::Trashed { .. } => "Form moved to trash",
        FormDeletion::Deleted { .. } => "Form deleted",
    };
    Ok(ApiResponse::success(outcome).with_message(message))
}

/// POST /api/forms/:formId/restore - Take the form out of the trash
pub async fn restore(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<Form> {
    let form = state.forms().restore(auth.user_id, form_id).await?;
    Ok(ApiResponse::success(form).with_message("Form restored"))
}

/// POST /api/forms/:formId/favourites - Toggle the caller's favourite flag
pub async fn toggle_favourite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<FavouriteToggle> {
    Ok(ApiResponse::success(state.forms().toggle_favourite(auth.user_id, form_id).await?))
}

/// GET /api/forms/:formId/members
pub async fn members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<Vec<FormMember>> {
    Ok(ApiResponse::success(state.forms().members(auth.user_id, form_id).await?))
}

/// POST /api/forms/:formId/invite-member - Share the form by e-mail
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
    Json(body): Json<MemberEmail>,
) -> ApiResult<FormMember> {
    let member = state.forms().invite_member(auth.user_id, form_id, &body.email).await?;
    Ok(ApiResponse::success(member).with_message("Member invited"))
}

/// POST /api/forms/:formId/remove-member
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
    Json(body): Json<MemberId>,
) -> ApiResult<()> {
    state.forms().remove_member(auth.user_id, form_id, body.member_id).await?;
    Ok(ApiResponse::success(()).with_message("Member removed"))
}

/// PATCH /api/forms/:formId/disabled/:disabled
pub async fn set_disabled(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, disabled)): Path<(Uuid, bool)>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.forms().set_disabled(auth.user_id, form_id, disabled).await?))
}

/// PATCH /api/forms/:formId/disabled-on-date - Close the form at a given time
pub async fn set_disabled_on_date(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(form_id): Path<Uuid>,
    Json(body): Json<DisabledOnDate>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.forms().set_disabled_on_date(auth.user_id, form_id, body).await?))
}

/// PATCH /api/forms/:formId/disabled-notification/:flag - Mute response e-mails
pub async fn set_disabled_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, flag)): Path<(Uuid, bool)>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(
        state.forms().set_disabled_notification(auth.user_id, form_id, flag).await?,
    ))
}

/// PATCH /api/forms/:formId/folder/:folderId/add
pub async fn add_to_folder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, folder_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.forms().add_to_folder(auth.user_id, form_id, folder_id).await?))
}

/// PATCH /api/forms/:formId/folder/:folderId/remove
pub async fn remove_from_folder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, folder_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(
        state.forms().remove_from_folder(auth.user_id, form_id, folder_id).await?,
    ))
}

/// PATCH /api/forms/:formId/team/:teamId/add - Hand the form to a team
pub async fn move_to_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, team_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Form> {
    let form = state.forms().move_to_team(auth.user_id, form_id, team_id).await?;
    Ok(ApiResponse::success(form).with_message("Form moved to team"))
}

/// PATCH /api/forms/:formId/team/:teamId/remove - Take the form back as personal
pub async fn move_back_to_personal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((form_id, team_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Form> {
    let form = state.forms().move_back_to_personal(auth.user_id, form_id, team_id).await?;
    Ok(ApiResponse::success(form).with_message("Form moved to personal"))
}
