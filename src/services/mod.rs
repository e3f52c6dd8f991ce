//! Business operations. Each public method runs in exactly one store
//! transaction: load, authorize, write, commit, then enqueue notifications.

pub mod cascade;
pub mod error;
pub mod folders_service;
pub mod forms_service;
pub mod membership;
pub mod responses_service;
pub mod teams_service;
pub mod users_service;

use std::sync::Arc;
use uuid::Uuid;

pub use error::{ServiceError, ServiceResult};
pub use folders_service::FoldersService;
pub use forms_service::FormsService;
pub use responses_service::ResponsesService;
pub use teams_service::TeamsService;
pub use users_service::UsersService;

use crate::config::AppConfig;
use crate::database::models::{Folder, Form, Team};
use crate::database::{Store, StoreTx};
use crate::notify::Notifier;
use crate::permissions::{PermissionMap, ResourceRef};

/// What every service is built from.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
    pub config: Arc<AppConfig>,
}

/// A permission predicate from [`crate::permissions`].
pub type Check = fn(&Uuid, Option<&PermissionMap>) -> bool;

/// Loads the resource's map inside `tx` and runs `check` for `user_id`.
pub(crate) async fn authorize(
    tx: &mut dyn StoreTx,
    resource: ResourceRef,
    user_id: Uuid,
    check: Check,
    action: &str,
) -> ServiceResult<PermissionMap> {
    let map = tx.permissions(resource).await?;
    if check(&user_id, Some(&map)) {
        Ok(map)
    } else {
        Err(ServiceError::access_denied(format!(
            "you are not allowed to {} this {}",
            action,
            resource.kind.as_str()
        )))
    }
}

pub(crate) async fn load_team(tx: &mut dyn StoreTx, team_id: Uuid) -> ServiceResult<Team> {
    tx.team(team_id).await?.ok_or_else(|| ServiceError::not_found("Team"))
}

pub(crate) async fn load_folder(tx: &mut dyn StoreTx, folder_id: Uuid) -> ServiceResult<Folder> {
    tx.folder(folder_id).await?.ok_or_else(|| ServiceError::not_found("Folder"))
}

pub(crate) async fn load_form(tx: &mut dyn StoreTx, form_id: Uuid) -> ServiceResult<Form> {
    tx.form(form_id).await?.ok_or_else(|| ServiceError::not_found("Form"))
}

pub(crate) fn require_name(value: &str, what: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{} must not be empty", what)));
    }
    Ok(())
}
