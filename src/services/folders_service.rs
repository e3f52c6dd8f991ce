use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::cascade::{DeletePlan, DeleteReport};
use super::error::{ServiceError, ServiceResult};
use super::{authorize, load_folder, load_team, membership, require_name, ServiceContext};
use crate::database::models::{Folder, FolderChanges, FolderDetails};
use crate::permissions::{can_delete, can_edit, can_view, PermissionMap, ResourceRef};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFolder {
    pub name: String,
    pub color: Option<String>,
    /// Create the folder inside this team instead of as a personal folder.
    pub team_id: Option<Uuid>,
}

pub struct FoldersService {
    ctx: ServiceContext,
}

impl FoldersService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, user_id: Uuid, request: NewFolder) -> ServiceResult<Folder> {
        match request.team_id {
            Some(team_id) => self.create_in_team(user_id, team_id, &request.name, request.color).await,
            None => self.create_personal(user_id, &request.name, request.color).await,
        }
    }

    pub async fn create_personal(&self, user_id: Uuid, name: &str, color: Option<String>) -> ServiceResult<Folder> {
        require_name(name, "folder name")?;
        let folder = Folder::new(name, color, user_id, None);

        let mut tx = self.ctx.store.begin().await?;
        tx.insert_folder(&folder).await?;
        tx.replace_permissions(ResourceRef::folder(folder.id), &PermissionMap::owned_by(user_id))
            .await?;
        tx.commit().await?;

        info!(folder_id = %folder.id, %user_id, "personal folder created");
        Ok(folder)
    }

    /// Create a folder owned by the team; every current member gets full rights
    pub async fn create_in_team(
        &self,
        user_id: Uuid,
        team_id: Uuid,
        name: &str,
        color: Option<String>,
    ) -> ServiceResult<Folder> {
        require_name(name, "folder name")?;

        let mut tx = self.ctx.store.begin().await?;
        load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_edit, "edit").await?;

        let folder = Folder::new(name, color, user_id, Some(team_id));
        let snapshot = membership::team_snapshot(tx.as_mut(), team_id).await?;
        tx.insert_folder(&folder).await?;
        tx.replace_permissions(ResourceRef::folder(folder.id), &snapshot).await?;
        tx.commit().await?;

        info!(folder_id = %folder.id, %team_id, %user_id, "team folder created");
        Ok(folder)
    }

    /// Personal folders created by the caller
    pub async fn independent_folders(&self, user_id: Uuid) -> ServiceResult<Vec<Folder>> {
        let mut tx = self.ctx.store.begin().await?;
        Ok(tx.personal_folders(user_id).await?)
    }

    pub async fn team_folders(&self, user_id: Uuid, team_id: Uuid) -> ServiceResult<Vec<Folder>> {
        let mut tx = self.ctx.store.begin().await?;
        load_team(tx.as_mut(), team_id).await?;
        authorize(tx.as_mut(), ResourceRef::team(team_id), user_id, can_view, "view").await?;
        Ok(tx.folders_of_team(team_id).await?)
    }

    /// The folder with the live forms inside it that the caller can view
    pub async fn details(&self, user_id: Uuid, folder_id: Uuid) -> ServiceResult<FolderDetails> {
        let mut tx = self.ctx.store.begin().await?;
        let folder = load_folder(tx.as_mut(), folder_id).await?;
        let permissions = authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_view, "view").await?;

        let mut forms = Vec::new();
        for form in tx.forms_in_folder(folder_id).await? {
            if form.is_deleted() {
                continue;
            }
            let map = tx.permissions(ResourceRef::form(form.id)).await?;
            if can_view(&user_id, Some(&map)) {
                forms.push(form);
            }
        }

        Ok(FolderDetails { folder, forms, permissions })
    }

    pub async fn update(&self, user_id: Uuid, folder_id: Uuid, changes: FolderChanges) -> ServiceResult<Folder> {
        let mut tx = self.ctx.store.begin().await?;
        let mut folder = load_folder(tx.as_mut(), folder_id).await?;
        authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_edit, "edit").await?;

        if let Some(name) = changes.name {
            require_name(&name, "folder name")?;
            folder.name = name.trim().to_string();
        }
        if let Some(color) = changes.color {
            folder.color = Some(color);
        }
        folder.updated_at = chrono::Utc::now();

        tx.update_folder(&folder).await?;
        tx.commit().await?;
        Ok(folder)
    }

    /// Delete the folder together with its forms and their responses. The
    /// caller needs DELETE on the folder and on every form inside it.
    pub async fn delete(&self, user_id: Uuid, folder_id: Uuid) -> ServiceResult<DeleteReport> {
        let mut tx = self.ctx.store.begin().await?;
        load_folder(tx.as_mut(), folder_id).await?;
        authorize(tx.as_mut(), ResourceRef::folder(folder_id), user_id, can_delete, "delete").await?;

        let form_ids: Vec<Uuid> = tx.forms_in_folder(folder_id).await?.iter().map(|f| f.id).collect();
        for form_id in &form_ids {
            let map = tx.permissions(ResourceRef::form(*form_id)).await?;
            if !can_delete(&user_id, Some(&map)) {
                return Err(ServiceError::access_denied(
                    "you are not allowed to delete every form in this folder",
                ));
            }
        }
        let report = DeletePlan::folder(folder_id, form_ids).execute(tx.as_mut()).await?;
        tx.commit().await?;

        info!(%folder_id, %user_id, forms = report.forms, "folder deleted");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn personal_folder_lifecycle() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let other = ctx.user("other@example.com").await;
        let folders = ctx.state.folders();

        let folder = folders.create_personal(owner.id, "Drafts", Some("#ff0000".into())).await.unwrap();
        assert!(folder.is_personal());
        assert_eq!(folders.independent_folders(owner.id).await.unwrap().len(), 1);
        assert!(folders.independent_folders(other.id).await.unwrap().is_empty());

        let err = folders
            .update(other.id, folder.id, FolderChanges { name: Some("Mine".into()), color: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let renamed = folders
            .update(owner.id, folder.id, FolderChanges { name: Some("Archive".into()), color: None })
            .await
            .unwrap();
        assert_eq!(renamed.name, "Archive");
        assert_eq!(renamed.color.as_deref(), Some("#ff0000"));
    }

    #[tokio::test]
    async fn team_folder_snapshots_members() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let member = ctx.user("member@example.com").await;
        let outsider = ctx.user("outsider@example.com").await;
        let team = ctx.team(owner.id, "Ops").await.team;
        ctx.state.teams().add_member(owner.id, team.id, "member@example.com").await.unwrap();
        let folders = ctx.state.folders();

        let err = folders.create_in_team(outsider.id, team.id, "Nope", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let folder = folders.create_in_team(member.id, team.id, "Q1", None).await.unwrap();
        let details = folders.details(owner.id, folder.id).await.unwrap();
        assert_eq!(details.permissions.len(), 2);
        assert_eq!(folders.team_folders(member.id, team.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn details_hide_deleted_and_foreign_forms() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let folder = ctx.state.folders().create_personal(owner.id, "Box", None).await.unwrap();
        let kept = ctx.folder_form(owner.id, folder.id, "Kept").await;
        let binned = ctx.folder_form(owner.id, folder.id, "Binned").await;
        ctx.state.forms().delete(owner.id, binned.id).await.unwrap();

        let details = ctx.state.folders().details(owner.id, folder.id).await.unwrap();
        let ids: Vec<_> = details.forms.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![kept.id]);
    }

    #[tokio::test]
    async fn delete_cascades_to_forms_and_responses() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let folder = ctx.state.folders().create_personal(owner.id, "Box", None).await.unwrap();
        let form = ctx.folder_form(owner.id, folder.id, "Survey").await;
        ctx.submit(form.id, 3).await;

        let report = ctx.state.folders().delete(owner.id, folder.id).await.unwrap();
        assert_eq!(report, DeleteReport { responses: 3, forms: 1, folders: 1, teams: 0, users: 0 });

        let err = ctx.state.forms().details(owner.id, form.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_refuses_forms_the_caller_cannot_delete() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let guest = ctx.user("guest@example.com").await;
        let form = ctx.personal_form(owner.id, "Owner survey").await;
        ctx.submit(form.id, 3).await;
        ctx.state.forms().invite_member(owner.id, form.id, "guest@example.com").await.unwrap();

        let folder = ctx.state.folders().create_personal(guest.id, "Mine", None).await.unwrap();
        ctx.state.forms().add_to_folder(guest.id, form.id, folder.id).await.unwrap();

        let err = ctx.state.folders().delete(guest.id, folder.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let details = ctx.state.forms().details(owner.id, form.id).await.unwrap();
        assert_eq!(details.form.total_submissions, 3);
        assert_eq!(ctx.state.folders().details(guest.id, folder.id).await.unwrap().forms.len(), 1);
    }
}
