use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::cascade::{DeletePlan, DeleteReport};
use super::error::{ServiceError, ServiceResult};
use super::{authorize, load_folder, load_form, load_team, membership, require_name, ServiceContext};
use crate::database::models::{
    normalize_email, DisabledOnDate, Form, FormChanges, FormDetails, FormDraft, FormListItem, FormListPage,
    FormMember, Placement, PublicForm,
};
use crate::database::StoreTx;
use crate::filter::{FilterOrder, FormQuery, FormScope, Page};
use crate::notify::{mailer, Notification};
use crate::permissions::{can_delete, can_edit, can_view, CapabilitySet, PermissionMap, ResourceRef};

/// Query-string parameters of a form listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormListParams {
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub folder_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub favourite: bool,
    #[serde(default)]
    pub shared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FavouriteToggle {
    Added,
    Removed,
}

/// Outcome of a delete request: the first one trashes, the second one removes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FormDeletion {
    Trashed { form: Form },
    Deleted { report: DeleteReport },
}

pub struct FormsService {
    ctx: ServiceContext,
}

impl FormsService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    // ─────────────────────────── Creation ───────────────────────────

    pub async fn create_personal(&self, user_id: Uuid, draft: FormDraft) -> ServiceResult<Form> {
        require_name(&draft.title, "form title")?;
        let form = Form::new(draft, user_id, Placement::Personal);

        let mut tx = self.ctx.store.begin().await?;
        insert(tx.as_mut(), &form, &PermissionMap::owned_by(user_id)).await?;
        tx.commit().await?;

        info!(form_id = %form.id, %user_id, "personal form created");
        Ok(form)
    }

    /// Create a form owned by the team; every current member gets full rights
    pub async fn create_in_team(&self, user_id: Uuid, team_id: Uuid, draft: FormDraft) -> ServiceResult<Form> {
        require_name(&draft.title, "form title")?;

        let mut tx = self.ctx.store.begin().await?;
        load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;

        let form = Form::new(draft, user_id, Placement::Team(team_id));
        let snapshot = membership::team_snapshot(tx.as_mut(), team_id).await?;
        insert(tx.as_mut(), &form, &snapshot).await?;
        tx.commit().await?;

        info!(form_id = %form.id, %team_id, %user_id, "team form created");
        Ok(form)
    }

    /// Create a form inside one of the caller's personal folders
    pub async fn create_in_folder(&self, user_id: Uuid, folder_id: Uuid, draft: FormDraft) -> ServiceResult<Form> {
        require_name(&draft.title, "form title")?;

        let mut tx = self.ctx.store.begin().await?;
        let folder = load_folder(tx.as_mut(), folder_id).await?;
        authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_edit, "edit").await?;
        if !folder.is_personal() {
            return Err(ServiceError::conflict("folder belongs to a team; create the form in the team folder"));
        }

        let form = Form::new(draft, user_id, Placement::PersonalFolder(folder_id));
        insert(tx.as_mut(), &form, &PermissionMap::owned_by(user_id)).await?;
        tx.commit().await?;

        info!(form_id = %form.id, %folder_id, %user_id, "folder form created");
        Ok(form)
    }

    pub async fn create_in_team_folder(
        &self,
        user_id: Uuid,
        folder_id: Uuid,
        team_id: Uuid,
        draft: FormDraft,
    ) -> ServiceResult<Form> {
        require_name(&draft.title, "form title")?;

        let mut tx = self.ctx.store.begin().await?;
        load_team(tx.as_mut(), team_id).await?;
        let folder = load_folder(tx.as_mut(), folder_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;
        authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_edit, "edit").await?;
        if folder.team_id != Some(team_id) {
            return Err(ServiceError::conflict("folder does not belong to this team"));
        }

        let form = Form::new(draft, user_id, Placement::TeamFolder { team_id, folder_id });
        let snapshot = membership::team_snapshot(tx.as_mut(), team_id).await?;
        insert(tx.as_mut(), &form, &snapshot).await?;
        tx.commit().await?;

        info!(form_id = %form.id, %team_id, %folder_id, %user_id, "team folder form created");
        Ok(form)
    }

    // ─────────────────────────── Reading ────────────────────────────

    pub async fn list(&self, user_id: Uuid, params: FormListParams) -> ServiceResult<FormListPage> {
        let pagination = &self.ctx.config.pagination;
        let page = Page::new(params.page, params.page_size, pagination.default_page_size, pagination.max_page_size)?;
        let order = FilterOrder::forms(params.sort_by.as_deref(), params.sort_order.as_deref())?;

        let mut tx = self.ctx.store.begin().await?;
        if let Some(folder_id) = params.folder_id {
            load_folder(tx.as_mut(), folder_id).await?;
        }
        if let Some(team_id) = params.team_id {
            load_team(tx.as_mut(), team_id).await?;
            authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_view, "view").await?;
        }

        let scope = if params.shared {
            FormScope::Shared
        } else {
            FormScope::Owned {
                folder_id: params.folder_id,
                team_id: params.team_id,
                deleted: params.deleted,
                favourite: params.favourite,
            }
        };
        let query = FormQuery { user_id, scope, search: params.search, order, page };

        let found = tx.list_forms(&query).await?;
        let ids: Vec<Uuid> = found.forms.iter().map(|form| form.id).collect();
        let favourites = tx.favourite_form_ids(user_id, &ids).await?;
        let forms = found
            .forms
            .into_iter()
            .map(|form| FormListItem { is_favourite: favourites.contains(&form.id), form })
            .collect();

        Ok(FormListPage {
            forms,
            page: page.page,
            page_size: page.page_size,
            total_forms: found.total,
            total_pages: page.total_pages(found.total),
        })
    }

    pub async fn details(&self, user_id: Uuid, form_id: Uuid) -> ServiceResult<FormDetails> {
        let mut tx = self.ctx.store.begin().await?;
        let form = load_form(tx.as_mut(), form_id).await?;
        let permissions = authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_view, "view").await?;
        let is_favourite = tx.is_favourite(form_id, user_id).await?;
        Ok(FormDetails { form, is_favourite, permissions })
    }

    /// What an anonymous respondent sees. Trashed forms are hidden.
    pub async fn public_view(&self, form_id: Uuid) -> ServiceResult<PublicForm> {
        let mut tx = self.ctx.store.begin().await?;
        let form = load_form(tx.as_mut(), form_id).await?;
        if form.is_deleted() {
            return Err(ServiceError::not_found("Form"));
        }
        Ok(PublicForm::from(&form))
    }

    pub async fn members(&self, user_id: Uuid, form_id: Uuid) -> ServiceResult<Vec<FormMember>> {
        let mut tx = self.ctx.store.begin().await?;
        load_form(tx.as_mut(), form_id).await?;
        let map = authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_view, "view").await?;

        let ids: Vec<Uuid> = map.user_ids().copied().collect();
        let users = tx.users_by_ids(&ids).await?;
        Ok(users
            .iter()
            .filter_map(|user| {
                map.get(&user.id).map(|caps| FormMember { user: user.summary(), permissions: caps.clone() })
            })
            .collect())
    }

    /// Real-time rooms are keyed by form or team id; the caller must be able to view it.
    pub async fn authorize_room(&self, user_id: Uuid, room: Uuid) -> ServiceResult<()> {
        let mut tx = self.ctx.store.begin().await?;
        let resource = if tx.form(room).await?.is_some() {
            ResourceRef::form(room)
        } else if tx.team(room).await?.is_some() {
            ResourceRef::team(room)
        } else {
            return Err(ServiceError::not_found("Room"));
        };
        authorize(tx.as_mut(), resource, user_id, can_view, "watch").await?;
        Ok(())
    }

    // ─────────────────────── Editing and deleting ───────────────────────

    pub async fn update(&self, user_id: Uuid, form_id: Uuid, changes: FormChanges) -> ServiceResult<Form> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;

        if let Some(title) = changes.title {
            require_name(&title, "form title")?;
            form.title = title.trim().to_string();
        }
        if let Some(logo_url) = changes.logo_url {
            form.logo_url = Some(logo_url);
        }
        if let Some(settings) = changes.settings {
            form.settings = settings;
        }
        if let Some(elements) = changes.elements {
            form.elements = elements;
        }

        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;
        Ok(form)
    }

    /// First call moves the form to the trash; a second call on a trashed form
    /// removes it together with its responses.
    pub async fn delete(&self, user_id: Uuid, form_id: Uuid) -> ServiceResult<FormDeletion> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_delete, "delete").await?;

        let outcome = if form.is_deleted() {
            let report = DeletePlan::form(form_id).execute(tx.as_mut()).await?;
            info!(%form_id, %user_id, responses = report.responses, "form deleted");
            FormDeletion::Deleted { report }
        } else {
            form.deleted_at = Some(Utc::now());
            save(tx.as_mut(), &mut form).await?;
            info!(%form_id, %user_id, "form trashed");
            FormDeletion::Trashed { form }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn restore(&self, user_id: Uuid, form_id: Uuid) -> ServiceResult<Form> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_delete, "restore").await?;
        if !form.is_deleted() {
            return Err(ServiceError::conflict("form is not in the trash"));
        }

        form.deleted_at = None;
        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;
        Ok(form)
    }

    pub async fn set_disabled(&self, user_id: Uuid, form_id: Uuid, disabled: bool) -> ServiceResult<Form> {
        self.creator_update(user_id, form_id, |form| {
            form.disabled = disabled;
            Ok(())
        })
        .await
    }

    pub async fn set_disabled_on_date(&self, user_id: Uuid, form_id: Uuid, request: DisabledOnDate) -> ServiceResult<Form> {
        if request.disabled_on_specific_date && request.disabled_on_date.is_none() {
            return Err(ServiceError::validation("disabledOnDate is required when disabledOnSpecificDate is set"));
        }
        self.creator_update(user_id, form_id, |form| {
            form.disabled_on_specific_date = request.disabled_on_specific_date;
            form.disabled_on_date = request.disabled_on_date;
            Ok(())
        })
        .await
    }

    pub async fn set_disabled_notification(&self, user_id: Uuid, form_id: Uuid, disabled: bool) -> ServiceResult<Form> {
        self.creator_update(user_id, form_id, |form| {
            form.disabled_notification = disabled;
            Ok(())
        })
        .await
    }

    async fn creator_update<F>(&self, user_id: Uuid, form_id: Uuid, apply: F) -> ServiceResult<Form>
    where
        F: FnOnce(&mut Form) -> ServiceResult<()> + Send,
    {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        if form.creator_id != user_id {
            return Err(ServiceError::access_denied("only the form creator can change this setting"));
        }
        apply(&mut form)?;
        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;
        Ok(form)
    }

    // ──────────────────── Favourites and members ────────────────────

    pub async fn toggle_favourite(&self, user_id: Uuid, form_id: Uuid) -> ServiceResult<FavouriteToggle> {
        let mut tx = self.ctx.store.begin().await?;
        load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_view, "view").await?;

        let now_favourite = !tx.is_favourite(form_id, user_id).await?;
        tx.set_favourite(form_id, user_id, now_favourite).await?;
        tx.commit().await?;

        Ok(if now_favourite { FavouriteToggle::Added } else { FavouriteToggle::Removed })
    }

    /// Share the form with an existing user. Never touches the owning team.
    pub async fn invite_member(&self, user_id: Uuid, form_id: Uuid, email: &str) -> ServiceResult<FormMember> {
        let mut tx = self.ctx.store.begin().await?;
        let form = load_form(tx.as_mut(), form_id).await?;
        let map = authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;

        let invitee = tx
            .user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        if map.contains_user(&invitee.id) {
            return Err(ServiceError::conflict("user already has access to this form"));
        }
        let inviter = tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;

        let capabilities = CapabilitySet::collaborator();
        tx.grant(ResourceRef::form(form_id), invitee.id, &capabilities).await?;
        tx.commit().await?;

        let link = format!("{}/forms/{}", self.ctx.config.server.front_end_url, form_id);
        self.ctx.notifier.notify(Notification::Mail(mailer::form_invitation(
            &invitee.email,
            &form.title,
            &inviter.username,
            &link,
        )));
        self.ctx.notifier.notify(Notification::FormMembersChanged { form_id });

        info!(%form_id, member_id = %invitee.id, "form member invited");
        Ok(FormMember { user: invitee.summary(), permissions: capabilities })
    }

    pub async fn remove_member(&self, user_id: Uuid, form_id: Uuid, member_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.ctx.store.begin().await?;
        let form = load_form(tx.as_mut(), form_id).await?;
        let map = authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;

        if member_id == form.creator_id {
            return Err(ServiceError::conflict("the form creator cannot be removed"));
        }
        if !map.contains_user(&member_id) {
            return Err(ServiceError::conflict("user is not a member of this form"));
        }
        tx.revoke(ResourceRef::form(form_id), &[member_id]).await?;
        tx.commit().await?;

        self.ctx.notifier.notify(Notification::FormMembersChanged { form_id });
        info!(%form_id, %member_id, "form member removed");
        Ok(())
    }

    // ─────────────────────────── Placement ──────────────────────────

    pub async fn add_to_folder(&self, user_id: Uuid, form_id: Uuid, folder_id: Uuid) -> ServiceResult<Form> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        let folder = load_folder(tx.as_mut(), folder_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;
        authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_edit, "edit").await?;
        if folder.team_id != form.team_id {
            return Err(ServiceError::conflict("form and folder belong to different teams"));
        }

        form.folder_id = Some(folder_id);
        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;
        Ok(form)
    }

    pub async fn remove_from_folder(&self, user_id: Uuid, form_id: Uuid, folder_id: Uuid) -> ServiceResult<Form> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        load_folder(tx.as_mut(), folder_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;
        authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_edit, "edit").await?;
        if form.folder_id != Some(folder_id) {
            return Err(ServiceError::conflict("form is not in this folder"));
        }

        form.folder_id = None;
        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;
        Ok(form)
    }

    /// Hand the form to a team. Its map becomes exactly the team's members at full rights.
    pub async fn move_to_team(&self, user_id: Uuid, form_id: Uuid, team_id: Uuid) -> ServiceResult<Form> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;
        if !tx.team_member_ids(team_id).await?.contains(&user_id) {
            return Err(ServiceError::access_denied("you are not a member of this team"));
        }

        let snapshot = membership::team_snapshot(tx.as_mut(), team_id).await?;
        tx.replace_permissions(ResourceRef::form(form_id), &snapshot).await?;
        form.team_id = Some(team_id);
        form.folder_id = None;
        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;

        info!(%form_id, %team_id, %user_id, "form moved to team");
        Ok(form)
    }

    /// Take a team form back as a personal form. Creator only.
    pub async fn move_back_to_personal(&self, user_id: Uuid, form_id: Uuid, team_id: Uuid) -> ServiceResult<Form> {
        let mut tx = self.ctx.store.begin().await?;
        let mut form = load_form(tx.as_mut(), form_id).await?;
        if form.creator_id != user_id {
            return Err(ServiceError::access_denied("only the form creator can take the form back"));
        }
        if form.team_id != Some(team_id) {
            return Err(ServiceError::conflict("form does not belong to this team"));
        }

        let members = tx.team_member_ids(team_id).await?;
        tx.revoke(ResourceRef::form(form_id), &members).await?;
        tx.grant(ResourceRef::form(form_id), user_id, &CapabilitySet::full()).await?;
        form.team_id = None;
        form.folder_id = None;
        save(tx.as_mut(), &mut form).await?;
        tx.commit().await?;

        info!(%form_id, %team_id, %user_id, "form moved back to personal");
        Ok(form)
    }
}

async fn insert(tx: &mut dyn StoreTx, form: &Form, map: &PermissionMap) -> ServiceResult<()> {
    tx.insert_form(form).await?;
    tx.replace_permissions(ResourceRef::form(form.id), map).await?;
    Ok(())
}

async fn save(tx: &mut dyn StoreTx, form: &mut Form) -> ServiceResult<()> {
    form.updated_at = Utc::now();
    tx.update_form(form).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notification;
    use crate::testing::TestContext;
    use chrono::Duration;

    #[tokio::test]
    async fn delete_twice_removes_form_and_responses() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.personal_form(owner.id, "Survey").await;
        ctx.submit(form.id, 2).await;
        let forms = ctx.state.forms();

        let first = forms.delete(owner.id, form.id).await.unwrap();
        assert!(matches!(first, FormDeletion::Trashed { .. }));
        let trashed = forms.details(owner.id, form.id).await.unwrap();
        assert!(trashed.form.deleted_at.is_some());

        let second = forms.delete(owner.id, form.id).await.unwrap();
        match second {
            FormDeletion::Deleted { report } => {
                assert_eq!(report.forms, 1);
                assert_eq!(report.responses, 2);
            }
            other => panic!("expected hard delete, got {:?}", other),
        }

        let err = forms.restore(owner.id, form.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn restore_clears_trash() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.personal_form(owner.id, "Survey").await;
        let forms = ctx.state.forms();

        let err = forms.restore(owner.id, form.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        forms.delete(owner.id, form.id).await.unwrap();
        let err = forms.public_view(form.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let restored = forms.restore(owner.id, form.id).await.unwrap();
        assert!(restored.deleted_at.is_none());
        assert!(forms.public_view(form.id).await.unwrap().accepts_responses);
    }

    #[tokio::test]
    async fn favourite_toggle_round_trips() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let stranger = ctx.user("stranger@example.com").await;
        let form = ctx.personal_form(owner.id, "Survey").await;
        let forms = ctx.state.forms();

        assert_eq!(forms.toggle_favourite(owner.id, form.id).await.unwrap(), FavouriteToggle::Added);
        assert!(forms.details(owner.id, form.id).await.unwrap().is_favourite);
        assert_eq!(forms.toggle_favourite(owner.id, form.id).await.unwrap(), FavouriteToggle::Removed);
        assert!(!forms.details(owner.id, form.id).await.unwrap().is_favourite);

        let err = forms.toggle_favourite(stranger.id, form.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn move_to_team_replaces_map_with_members() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let member = ctx.user("member@example.com").await;
        let guest = ctx.user("guest@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        ctx.state.teams().add_member(owner.id, team.id, "member@example.com").await.unwrap();
        let form = ctx.personal_form(owner.id, "Survey").await;
        let forms = ctx.state.forms();
        forms.invite_member(owner.id, form.id, "guest@example.com").await.unwrap();

        let err = forms.move_to_team(guest.id, form.id, team.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let moved = forms.move_to_team(owner.id, form.id, team.id).await.unwrap();
        assert_eq!(moved.team_id, Some(team.id));
        assert_eq!(moved.folder_id, None);

        let map = forms.details(owner.id, form.id).await.unwrap().permissions;
        let mut holders: Vec<_> = map.user_ids().copied().collect();
        holders.sort();
        let mut expected = vec![owner.id, member.id];
        expected.sort();
        assert_eq!(holders, expected);
        assert!(map.iter().all(|(_, caps)| *caps == CapabilitySet::full()));
        assert!(!map.contains_user(&guest.id));
    }

    #[tokio::test]
    async fn move_back_to_personal_is_creator_only() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let member = ctx.user("member@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let other_team = ctx.team(owner.id, "Other").await.team;
        ctx.state.teams().add_member(owner.id, team.id, "member@example.com").await.unwrap();
        let form = ctx.team_form(owner.id, team.id, "Survey").await;
        let forms = ctx.state.forms();

        let err = forms.move_back_to_personal(member.id, form.id, team.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
        let err = forms.move_back_to_personal(owner.id, form.id, other_team.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let personal = forms.move_back_to_personal(owner.id, form.id, team.id).await.unwrap();
        assert_eq!(personal.placement(), Placement::Personal);
        let map = forms.details(owner.id, form.id).await.unwrap().permissions;
        assert_eq!(map.len(), 1);
        assert!(can_delete(&owner.id, Some(&map)));
    }

    #[tokio::test]
    async fn folder_placement_respects_team_boundaries() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let team_folder = ctx.team_folder(owner.id, team.id, "Q1").await;
        let personal_folder = ctx.state.folders().create_personal(owner.id, "Mine", None).await.unwrap();
        let form = ctx.personal_form(owner.id, "Survey").await;
        let forms = ctx.state.forms();

        let err = forms.add_to_folder(owner.id, form.id, team_folder.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let placed = forms.add_to_folder(owner.id, form.id, personal_folder.id).await.unwrap();
        assert_eq!(placed.placement(), Placement::PersonalFolder(personal_folder.id));

        let err = forms.remove_from_folder(owner.id, form.id, team_folder.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let unplaced = forms.remove_from_folder(owner.id, form.id, personal_folder.id).await.unwrap();
        assert_eq!(unplaced.placement(), Placement::Personal);

        let err = forms
            .create_in_folder(owner.id, team_folder.id, FormDraft { title: "X".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let other_team = ctx.team(owner.id, "Other").await.team;
        let err = forms
            .create_in_team_folder(owner.id, team_folder.id, other_team.id, FormDraft { title: "X".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let nested = forms
            .create_in_team_folder(owner.id, team_folder.id, team.id, FormDraft { title: "Y".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(nested.placement(), Placement::TeamFolder { team_id: team.id, folder_id: team_folder.id });
    }

    #[tokio::test]
    async fn listing_separates_owned_shared_and_trash() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let guest = ctx.user("guest@example.com").await;
        let forms = ctx.state.forms();
        ctx.personal_form(owner.id, "customer survey").await;
        let shared = ctx.personal_form(owner.id, "Team Retro").await;
        let binned = ctx.personal_form(owner.id, "old poll").await;
        forms.invite_member(owner.id, shared.id, "guest@example.com").await.unwrap();
        forms.delete(owner.id, binned.id).await.unwrap();

        let owned = forms.list(owner.id, FormListParams::default()).await.unwrap();
        assert_eq!(owned.total_forms, 2);

        let trash = forms
            .list(owner.id, FormListParams { deleted: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(trash.forms.len(), 1);
        assert_eq!(trash.forms[0].form.id, binned.id);

        let guest_view = forms
            .list(guest.id, FormListParams { shared: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(guest_view.forms.len(), 1);
        assert_eq!(guest_view.forms[0].form.id, shared.id);

        let searched = forms
            .list(owner.id, FormListParams { search: Some("survey".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(searched.total_forms, 1);

        let paged = forms
            .list(
                owner.id,
                FormListParams { page: Some(2), page_size: Some(1), sort_by: Some("title".into()), sort_order: Some("asc".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(paged.total_pages, 2);
        assert_eq!(paged.forms[0].form.title, "customer survey");

        let err = forms
            .list(owner.id, FormListParams { sort_by: Some("creator".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn settings_are_creator_only() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let editor = ctx.user("editor@example.com").await;
        let form = ctx.personal_form(owner.id, "Survey").await;
        let forms = ctx.state.forms();
        forms.invite_member(owner.id, form.id, "editor@example.com").await.unwrap();

        let err = forms.set_disabled(editor.id, form.id, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
        assert!(forms.set_disabled(owner.id, form.id, true).await.unwrap().disabled);

        let err = forms
            .set_disabled_on_date(owner.id, form.id, DisabledOnDate { disabled_on_specific_date: true, disabled_on_date: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let closes = Utc::now() + Duration::days(3);
        let dated = forms
            .set_disabled_on_date(owner.id, form.id, DisabledOnDate { disabled_on_specific_date: true, disabled_on_date: Some(closes) })
            .await
            .unwrap();
        assert_eq!(dated.disabled_on_date, Some(closes));

        assert!(forms.set_disabled_notification(owner.id, form.id, true).await.unwrap().disabled_notification);
    }

    #[tokio::test]
    async fn form_members_are_resource_local() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let guest = ctx.user("guest@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        let form = ctx.team_form(owner.id, team.id, "Survey").await;
        let forms = ctx.state.forms();

        let err = forms.invite_member(owner.id, form.id, "nobody@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let member = forms.invite_member(owner.id, form.id, "guest@example.com").await.unwrap();
        assert_eq!(member.permissions, CapabilitySet::collaborator());
        assert_eq!(forms.members(guest.id, form.id).await.unwrap().len(), 2);
        let team_details = ctx.state.teams().details(owner.id, team.id).await.unwrap();
        assert!(!team_details.permissions.contains_user(&guest.id));

        let err = forms.remove_member(owner.id, form.id, owner.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        forms.remove_member(owner.id, form.id, guest.id).await.unwrap();
        let err = forms.remove_member(owner.id, form.id, guest.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let mail_count = ctx
            .notifications()
            .iter()
            .filter(|n| matches!(n, Notification::Mail(_)))
            .count();
        assert_eq!(mail_count, 1);
    }
}
