use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Team, TeamChanges, TeamDetails};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::cascade::DeleteReport;
use crate::services::teams_service::{Invitation, NewTeam};

#[derive(Debug, Deserialize)]
pub struct MemberEmail {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberIds {
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationToken {
    pub token: String,
}

/// GET /api/teams - Teams the caller belongs to
pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Vec<TeamDetails>> {
    Ok(ApiResponse::success(state.teams().my_teams(auth.user_id).await?))
}

/// POST /api/teams - Create a team
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewTeam>,
) -> ApiResult<TeamDetails> {
    let team = state.teams().create(auth.user_id, body).await?;
    Ok(ApiResponse::created(team).with_message("Team created"))
}

/// GET /api/teams/:teamId - Team with members and folders
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<TeamDetails> {
    Ok(ApiResponse::success(state.teams().details(auth.user_id, team_id).await?))
}

/// PATCH /api/teams/:teamId - Rename or change the logo
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<TeamChanges>,
) -> ApiResult<Team> {
    Ok(ApiResponse::success(state.teams().update(auth.user_id, team_id, body).await?))
}

/// DELETE /api/teams/:teamId - Delete the team and everything it owns
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<DeleteReport> {
    let report = state.teams().delete(auth.user_id, team_id).await?;
    Ok(ApiResponse::success(report).with_message("Team deleted"))
}

/// POST /api/teams/:teamId/add-member - Add an existing user by e-mail
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<MemberEmail>,
) -> ApiResult<TeamDetails> {
    let team = state.teams().add_member(auth.user_id, team_id, &body.email).await?;
    Ok(ApiResponse::success(team).with_message("Member added"))
}

/// POST /api/teams/:teamId/invite-member - E-mail an invitation link
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<MemberEmail>,
) -> ApiResult<Invitation> {
    let invitation = state.teams().invite_member(auth.user_id, team_id, &body.email).await?;
    Ok(ApiResponse::success(invitation).with_message("Invitation sent"))
}

/// POST /api/teams/invitations/accept - Join a team with an invitation token
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<InvitationToken>,
) -> ApiResult<TeamDetails> {
    let team = state.teams().accept_invitation(auth.user_id, &body.token).await?;
    Ok(ApiResponse::success(team).with_message("Invitation accepted"))
}

/// POST /api/teams/:teamId/remove-member - Remove members from the team
pub async fn remove_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<MemberIds>,
) -> ApiResult<TeamDetails> {
    let team = state.teams().remove_members(auth.user_id, team_id, &body.member_ids).await?;
    Ok(ApiResponse::success(team).with_message("Members removed"))
}
