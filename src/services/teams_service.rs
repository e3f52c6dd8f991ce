use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::cascade::{DeletePlan, DeleteReport};
use super::error::{ServiceError, ServiceResult};
use super::{authorize, load_team, membership, require_name, ServiceContext};
use crate::auth::{self, InviteClaims};
use crate::database::models::{normalize_email, Team, TeamChanges, TeamDetails, User};
use crate::database::StoreTx;
use crate::notify::{mailer, Notification};
use crate::permissions::{can_edit, can_view, PermissionMap, ResourceRef};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeam {
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub team_id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TeamsService {
    ctx: ServiceContext,
}

impl TeamsService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a team; the creator becomes its first member with full rights
    pub async fn create(&self, user_id: Uuid, request: NewTeam) -> ServiceResult<TeamDetails> {
        require_name(&request.name, "team name")?;
        let team = Team::new(&request.name, request.logo_url, user_id);

        let mut tx = self.ctx.store.begin().await?;
        tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;
        tx.insert_team(&team).await?;
        tx.add_team_member(team.id, user_id).await?;
        tx.replace_permissions(ResourceRef::team(team.id), &PermissionMap::owned_by(user_id))
            .await?;
        let details = details_of(tx.as_mut(), team).await?;
        tx.commit().await?;

        info!(team_id = %details.team.id, %user_id, "team created");
        Ok(details)
    }

    /// Teams the user belongs to, with members and folders
    pub async fn my_teams(&self, user_id: Uuid) -> ServiceResult<Vec<TeamDetails>> {
        let mut tx = self.ctx.store.begin().await?;
        let teams = tx.teams_of_user(user_id).await?;
        let mut out = Vec::with_capacity(teams.len());
        for team in teams {
            out.push(details_of(tx.as_mut(), team).await?);
        }
        Ok(out)
    }

    pub async fn details(&self, user_id: Uuid, team_id: Uuid) -> ServiceResult<TeamDetails> {
        let mut tx = self.ctx.store.begin().await?;
        let team = load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_view, "view").await?;
        details_of(tx.as_mut(), team).await
    }

    /// Operator read used by the admin CLI; no caller to authorize.
    pub async fn inspect(&self, team_id: Uuid) -> ServiceResult<TeamDetails> {
        let mut tx = self.ctx.store.begin().await?;
        let team = load_team(tx.as_mut(), team_id).await?;
        details_of(tx.as_mut(), team).await
    }

    pub async fn update(&self, user_id: Uuid, team_id: Uuid, changes: TeamChanges) -> ServiceResult<Team> {
        let mut tx = self.ctx.store.begin().await?;
        let mut team = load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;

        if let Some(name) = changes.name {
            require_name(&name, "team name")?;
            team.name = name.trim().to_string();
        }
        if let Some(logo_url) = changes.logo_url {
            team.logo_url = Some(logo_url);
        }
        team.updated_at = chrono::Utc::now();

        tx.update_team(&team).await?;
        tx.commit().await?;
        Ok(team)
    }

    /// Delete the team with every form, response and folder it owns. Creator only.
    pub async fn delete(&self, user_id: Uuid, team_id: Uuid) -> ServiceResult<DeleteReport> {
        let mut tx = self.ctx.store.begin().await?;
        let team = load_team(tx.as_mut(), team_id).await?;
        if team.creator_id != user_id {
            return Err(ServiceError::access_denied("only the team creator can delete the team"));
        }

        let form_ids = tx.forms_of_team(team_id).await?.iter().map(|f| f.id).collect();
        let folder_ids = tx.folders_of_team(team_id).await?.iter().map(|f| f.id).collect();
        let report = DeletePlan::team(team_id, form_ids, folder_ids).execute(tx.as_mut()).await?;
        tx.commit().await?;

        info!(%team_id, %user_id, "team deleted");
        Ok(report)
    }

    /// Add an existing user to the team by e-mail
    pub async fn add_member(&self, user_id: Uuid, team_id: Uuid, email: &str) -> ServiceResult<TeamDetails> {
        let mut tx = self.ctx.store.begin().await?;
        let team = load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;

        let member = find_user(tx.as_mut(), email).await?;
        join(tx.as_mut(), &team, &member).await?;
        let details = details_of(tx.as_mut(), team).await?;
        tx.commit().await?;

        self.ctx.notifier.notify(Notification::TeamMembersChanged { team_id });
        Ok(details)
    }

    /// E-mail a signed invitation link. The invitee need not have an account yet.
    pub async fn invite_member(&self, user_id: Uuid, team_id: Uuid, email: &str) -> ServiceResult<Invitation> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(ServiceError::validation("email is not valid"));
        }

        let mut tx = self.ctx.store.begin().await?;
        let team = load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;
        let inviter = tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;
        if let Some(existing) = tx.user_by_email(&email).await? {
            if tx.team_member_ids(team_id).await?.contains(&existing.id) {
                return Err(ServiceError::conflict("user is already a member of this team"));
            }
        }
        drop(tx);

        let security = &self.ctx.config.security;
        let claims = InviteClaims::new(team_id, email.clone(), user_id, security.invite_expiry_hours);
        let token = auth::generate_invite_token(security, &claims)?;

        let link = format!(
            "{}/teams/invitations/accept?token={}",
            self.ctx.config.server.front_end_url, token
        );
        self.ctx
            .notifier
            .notify(Notification::Mail(mailer::team_invitation(&email, &team.name, &inviter.username, &link)));

        info!(%team_id, invited_by = %user_id, "team invitation sent");
        Ok(Invitation { team_id, email, token })
    }

    /// Join a team using an invitation addressed to the caller's own e-mail
    pub async fn accept_invitation(&self, user_id: Uuid, token: &str) -> ServiceResult<TeamDetails> {
        let claims = auth::validate_invite_token(&self.ctx.config.security, token)?;

        let mut tx = self.ctx.store.begin().await?;
        let user = tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;
        if user.email != normalize_email(&claims.email) {
            return Err(ServiceError::access_denied("this invitation was sent to a different email"));
        }
        let team = load_team(tx.as_mut(), claims.team_id).await?;
        join(tx.as_mut(), &team, &user).await?;
        let details = details_of(tx.as_mut(), team).await?;
        tx.commit().await?;

        self.ctx.notifier.notify(Notification::TeamMembersChanged { team_id: claims.team_id });
        Ok(details)
    }

    /// Remove members from the team and from every form and folder it owns
    pub async fn remove_members(&self, user_id: Uuid, team_id: Uuid, member_ids: &[Uuid]) -> ServiceResult<TeamDetails> {
        if member_ids.is_empty() {
            return Err(ServiceError::validation("no members to remove"));
        }

        let mut tx = self.ctx.store.begin().await?;
        let team = load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;

        if member_ids.contains(&team.creator_id) {
            return Err(ServiceError::conflict("the team creator cannot be removed"));
        }
        let current = tx.team_member_ids(team_id).await?;
        let known = tx.users_by_ids(member_ids).await?;
        for id in member_ids {
            if !known.iter().any(|user| user.id == *id) {
                return Err(ServiceError::not_found("User"));
            }
            if !current.contains(id) {
                return Err(ServiceError::conflict(format!("user {} is not a member of this team", id)));
            }
        }

        membership::remove_members(tx.as_mut(), &team, member_ids).await?;
        let details = details_of(tx.as_mut(), team).await?;
        tx.commit().await?;

        info!(%team_id, removed = member_ids.len(), "team members removed");
        self.ctx.notifier.notify(Notification::TeamMembersChanged { team_id });
        Ok(details)
    }
}

async fn find_user(tx: &mut dyn StoreTx, email: &str) -> ServiceResult<User> {
    tx.user_by_email(&normalize_email(email))
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))
}

async fn join(tx: &mut dyn StoreTx, team: &Team, member: &User) -> ServiceResult<()> {
    if tx.team_member_ids(team.id).await?.contains(&member.id) {
        return Err(ServiceError::conflict("user is already a member of this team"));
    }
    membership::add_member(tx, team, member.id).await?;
    info!(team_id = %team.id, member_id = %member.id, "team member added");
    Ok(())
}

async fn details_of(tx: &mut dyn StoreTx, team: Team) -> ServiceResult<TeamDetails> {
    let member_ids = tx.team_member_ids(team.id).await?;
    let members = tx
        .users_by_ids(&member_ids)
        .await?
        .iter()
        .map(User::summary)
        .collect();
    let folders = tx.folders_of_team(team.id).await?;
    let permissions = tx.permissions(ResourceRef::team(team.id)).await?;
    Ok(TeamDetails { team, members, folders, permissions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::FailPoint;
    use crate::permissions::{can_delete, ResourceKind};
    use crate::testing::TestContext;

    #[tokio::test]
    async fn creator_gets_full_rights() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let details = ctx.team(owner.id, "Ops").await;

        assert!(can_delete(&owner.id, Some(&details.permissions)));
        assert_eq!(details.members.len(), 1);
        assert_eq!(ctx.state.teams().my_teams(owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_member_requires_edit_and_existing_user() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let outsider = ctx.user("outsider@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let teams = ctx.state.teams();

        let err = teams.add_member(outsider.id, team.id, "owner@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let err = teams.add_member(owner.id, team.id, "ghost@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        teams.add_member(owner.id, team.id, "OUTSIDER@example.com").await.unwrap();
        let err = teams.add_member(owner.id, team.id, "outsider@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn creator_cannot_be_removed() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let member = ctx.user("member@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let teams = ctx.state.teams();
        teams.add_member(owner.id, team.id, "member@example.com").await.unwrap();

        let err = teams.remove_members(owner.id, team.id, &[member.id, owner.id]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let details = teams.details(owner.id, team.id).await.unwrap();
        assert_eq!(details.members.len(), 2);
    }

    #[tokio::test]
    async fn removing_unknown_or_non_member_fails() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let stranger = ctx.user("stranger@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let teams = ctx.state.teams();

        let err = teams.remove_members(owner.id, team.id, &[Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = teams.remove_members(owner.id, team.id, &[stranger.id]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err = teams.remove_members(owner.id, team.id, &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn removal_strips_direct_invites_too() {
        let ctx = TestContext::new();
        let u1 = ctx.user("u1@example.com").await;
        let u2 = ctx.user("u2@example.com").await;
        let team = ctx.team(u1.id, "T1").await.team;
        let form = ctx.team_form(u1.id, team.id, "F1").await;
        let teams = ctx.state.teams();
        let forms = ctx.state.forms();

        forms.invite_member(u1.id, form.id, "u2@example.com").await.unwrap();
        teams.add_member(u1.id, team.id, "u2@example.com").await.unwrap();
        assert!(can_delete(&u2.id, Some(&forms.details(u2.id, form.id).await.unwrap().permissions)));

        teams.remove_members(u1.id, team.id, &[u2.id]).await.unwrap();

        let err = forms.details(u2.id, form.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
        let err = teams.details(u2.id, team.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let events: Vec<_> = ctx
            .notifications()
            .into_iter()
            .filter(|n| matches!(n, Notification::TeamMembersChanged { .. }))
            .collect();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn failed_propagation_rolls_back() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let member = ctx.user("member@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        ctx.team_folder(owner.id, team.id, "Q1").await;
        let form = ctx.team_form(owner.id, team.id, "Intake").await;

        ctx.store.fail_on(FailPoint::Permissions(ResourceKind::Folder));
        let teams = ctx.state.teams();
        assert!(teams.add_member(owner.id, team.id, "member@example.com").await.is_err());
        ctx.store.clear_fail_points();

        let details = teams.details(owner.id, team.id).await.unwrap();
        assert_eq!(details.members.len(), 1);
        assert!(!details.permissions.contains_user(&member.id));
        let form = ctx.state.forms().details(owner.id, form.id).await.unwrap();
        assert!(!form.permissions.contains_user(&member.id));
    }

    #[tokio::test]
    async fn invitation_round_trip() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let invitee = ctx.user("invitee@example.com").await;
        let other = ctx.user("other@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let teams = ctx.state.teams();

        let invitation = teams.invite_member(owner.id, team.id, "Invitee@example.com").await.unwrap();
        let mails: Vec<_> = ctx
            .notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Mail(email) => Some(email),
                _ => None,
            })
            .collect();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].to, "invitee@example.com");
        assert!(mails[0].body.contains(&invitation.token));

        let err = teams.accept_invitation(other.id, &invitation.token).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let details = teams.accept_invitation(invitee.id, &invitation.token).await.unwrap();
        assert!(details.members.iter().any(|m| m.id == invitee.id));

        let err = teams.accept_invitation(invitee.id, "garbage").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn delete_cascades_and_is_creator_only() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let member = ctx.user("member@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let folder = ctx.team_folder(owner.id, team.id, "Q1").await;
        let form = ctx.team_form(owner.id, team.id, "Intake").await;
        ctx.submit(form.id, 2).await;
        let teams = ctx.state.teams();
        teams.add_member(owner.id, team.id, "member@example.com").await.unwrap();

        let err = teams.delete(member.id, team.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let report = teams.delete(owner.id, team.id).await.unwrap();
        assert_eq!(report, DeleteReport { responses: 2, forms: 1, folders: 1, teams: 1, users: 0 });

        let err = teams.details(owner.id, team.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = ctx.state.folders().details(owner.id, folder.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
