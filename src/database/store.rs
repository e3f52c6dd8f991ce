//! Transactional storage interface shared by the PostgreSQL and in-memory backends.
//!
//! Every service operation opens one [`StoreTx`], performs its reads, checks and
//! writes through it, and commits. Dropping a transaction without committing
//! discards all of its writes.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use super::models::{Folder, Form, Response, Team, User};
use crate::filter::FormQuery;
use crate::permissions::{CapabilitySet, PermissionMap, ResourceRef};

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// One page of a form listing plus the unpaged match count.
#[derive(Debug, Clone)]
pub struct FormPage {
    pub forms: Vec<Form>,
    pub total: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub trait StoreTx: Send {
    // ───────────────────────────── Users ─────────────────────────────

    /// Fails with `Conflict` when the e-mail is taken.
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    async fn users_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    async fn update_user(&mut self, user: &User) -> Result<(), StoreError>;
    /// Removes the user row with its memberships, favourites and permission
    /// entries. Teams, folders and forms created by the user must already be gone.
    async fn delete_user(&mut self, id: Uuid) -> Result<(), StoreError>;

    // ───────────────────────────── Teams ─────────────────────────────

    async fn insert_team(&mut self, team: &Team) -> Result<(), StoreError>;
    async fn team(&mut self, id: Uuid) -> Result<Option<Team>, StoreError>;
    async fn update_team(&mut self, team: &Team) -> Result<(), StoreError>;
    /// Removes the team row, its member links and its permission map.
    async fn delete_team(&mut self, id: Uuid) -> Result<(), StoreError>;
    async fn teams_of_user(&mut self, user_id: Uuid) -> Result<Vec<Team>, StoreError>;
    async fn team_member_ids(&mut self, team_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
    async fn add_team_member(&mut self, team_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
    async fn remove_team_members(&mut self, team_id: Uuid, user_ids: &[Uuid]) -> Result<u64, StoreError>;

    // ──────────────────────────── Folders ────────────────────────────

    async fn insert_folder(&mut self, folder: &Folder) -> Result<(), StoreError>;
    async fn folder(&mut self, id: Uuid) -> Result<Option<Folder>, StoreError>;
    async fn update_folder(&mut self, folder: &Folder) -> Result<(), StoreError>;
    /// Removes the folders and their permission maps.
    async fn delete_folders(&mut self, ids: &[Uuid]) -> Result<u64, StoreError>;
    async fn folders_of_team(&mut self, team_id: Uuid) -> Result<Vec<Folder>, StoreError>;
    /// Personal folders created by the user.
    async fn personal_folders(&mut self, user_id: Uuid) -> Result<Vec<Folder>, StoreError>;
    /// Personal and team folders whose creator is the user.
    async fn folders_created_by(&mut self, user_id: Uuid) -> Result<Vec<Folder>, StoreError>;

    // ───────────────────────────── Forms ─────────────────────────────

    async fn insert_form(&mut self, form: &Form) -> Result<(), StoreError>;
    /// Returns soft-deleted forms too.
    async fn form(&mut self, id: Uuid) -> Result<Option<Form>, StoreError>;
    /// Writes every column except `total_submissions`, which only
    /// [`StoreTx::adjust_submissions`] changes.
    async fn update_form(&mut self, form: &Form) -> Result<(), StoreError>;
    /// Removes the forms, their favourites and their permission maps. Responses
    /// must already be gone.
    async fn delete_forms(&mut self, ids: &[Uuid]) -> Result<u64, StoreError>;
    async fn forms_of_team(&mut self, team_id: Uuid) -> Result<Vec<Form>, StoreError>;
    async fn forms_in_folder(&mut self, folder_id: Uuid) -> Result<Vec<Form>, StoreError>;
    /// Every form the user created, trashed ones included.
    async fn forms_created_by(&mut self, user_id: Uuid) -> Result<Vec<Form>, StoreError>;
    async fn list_forms(&mut self, query: &FormQuery) -> Result<FormPage, StoreError>;
    /// Adds `delta` to the submission counter and returns the new value. The
    /// row stays locked until the transaction ends.
    async fn adjust_submissions(&mut self, form_id: Uuid, delta: i32) -> Result<i32, StoreError>;

    // ─────────────────────────── Favourites ──────────────────────────

    async fn is_favourite(&mut self, form_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    async fn set_favourite(&mut self, form_id: Uuid, user_id: Uuid, favourite: bool) -> Result<(), StoreError>;
    /// The subset of `form_ids` the user has favourited.
    async fn favourite_form_ids(&mut self, user_id: Uuid, form_ids: &[Uuid]) -> Result<HashSet<Uuid>, StoreError>;

    // ────────────────────────── Permissions ──────────────────────────

    /// Empty map when nothing is stored for the resource.
    async fn permissions(&mut self, resource: ResourceRef) -> Result<PermissionMap, StoreError>;
    async fn replace_permissions(&mut self, resource: ResourceRef, map: &PermissionMap) -> Result<(), StoreError>;
    /// Sets the user's entry on the resource, overwriting any previous entry.
    async fn grant(&mut self, resource: ResourceRef, user_id: Uuid, capabilities: &CapabilitySet) -> Result<(), StoreError>;
    /// Drops the users' entries on the resource; returns how many rows went away.
    async fn revoke(&mut self, resource: ResourceRef, user_ids: &[Uuid]) -> Result<u64, StoreError>;

    async fn grant_all(
        &mut self,
        resources: &[ResourceRef],
        user_id: Uuid,
        capabilities: &CapabilitySet,
    ) -> Result<(), StoreError> {
        for resource in resources {
            self.grant(*resource, user_id, capabilities).await?;
        }
        Ok(())
    }

    async fn revoke_all(&mut self, resources: &[ResourceRef], user_ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut removed = 0;
        for resource in resources {
            removed += self.revoke(*resource, user_ids).await?;
        }
        Ok(removed)
    }

    // ─────────────────────────── Responses ───────────────────────────

    async fn insert_response(&mut self, response: &Response) -> Result<(), StoreError>;
    async fn response(&mut self, id: Uuid) -> Result<Option<Response>, StoreError>;
    async fn responses_of_form(&mut self, form_id: Uuid) -> Result<Vec<Response>, StoreError>;
    /// Deletes only ids that belong to the form; returns how many were removed.
    async fn delete_responses(&mut self, form_id: Uuid, ids: &[Uuid]) -> Result<u64, StoreError>;
    async fn delete_responses_of_forms(&mut self, form_ids: &[Uuid]) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
