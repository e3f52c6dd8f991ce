//! In-memory store used by tests and `STORE_BACKEND=memory` runs.
//!
//! A transaction takes the state lock for its whole lifetime and works on a
//! copy; commit swaps the copy in. Transactions are therefore serialized.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::models::{Folder, Form, Response, Team, User};
use super::store::{FormPage, Store, StoreError, StoreTx};
use crate::filter::{FormQuery, FormScope, FormSortField};
use crate::permissions::{
    can_delete, can_edit, can_view, CapabilitySet, PermissionMap, ResourceKind, ResourceRef,
};

/// Store paths that can be made to fail, for exercising rollback and
/// degraded health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Any permission write on resources of this kind.
    Permissions(ResourceKind),
    Commit,
    HealthCheck,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<Uuid, User>,
    teams: BTreeMap<Uuid, Team>,
    // (team_id, user_id)
    team_members: BTreeSet<(Uuid, Uuid)>,
    folders: BTreeMap<Uuid, Folder>,
    forms: BTreeMap<Uuid, Form>,
    // (form_id, user_id)
    favourites: BTreeSet<(Uuid, Uuid)>,
    permissions: BTreeMap<ResourceRef, PermissionMap>,
    responses: BTreeMap<Uuid, Response>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_points: Arc<StdMutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }

    pub fn clear_fail_points(&self) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.clear();
        }
    }

    fn armed_fail_points(&self) -> HashSet<FailPoint> {
        self.fail_points
            .lock()
            .map(|points| points.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_points: self.armed_fail_points(),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.armed_fail_points().contains(&FailPoint::HealthCheck) {
            return Err(StoreError::Backend("injected health check failure".to_string()));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_points: HashSet<FailPoint>,
}

impl MemoryTx {
    fn check_permission_write(&self, resource: &ResourceRef) -> Result<(), StoreError> {
        if self.fail_points.contains(&FailPoint::Permissions(resource.kind)) {
            return Err(StoreError::Backend(format!(
                "injected failure writing {} permissions",
                resource.kind.as_str()
            )));
        }
        Ok(())
    }

    fn permission_map(&self, resource: &ResourceRef) -> Option<&PermissionMap> {
        self.working.permissions.get(resource)
    }

    fn form_in_scope(&self, form: &Form, query: &FormQuery) -> bool {
        let map = self.permission_map(&ResourceRef::form(form.id));
        let user = &query.user_id;
        match &query.scope {
            FormScope::Owned { folder_id, team_id, deleted, favourite } => {
                can_view(user, map)
                    && can_edit(user, map)
                    && can_delete(user, map)
                    && form.team_id == *team_id
                    && folder_id.map_or(true, |id| form.folder_id == Some(id))
                    && form.is_deleted() == *deleted
                    && (!*favourite || self.working.favourites.contains(&(form.id, *user)))
            }
            FormScope::Shared => can_view(user, map) && !can_delete(user, map) && !form.is_deleted(),
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        if self.working.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.values().find(|u| u.email == email).cloned())
    }

    async fn users_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.working.users.get(id).cloned()).collect())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        match self.working.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_user(&mut self, id: Uuid) -> Result<(), StoreError> {
        if self.working.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.working.team_members.retain(|(_, user)| *user != id);
        self.working.favourites.retain(|(_, user)| *user != id);
        for map in self.working.permissions.values_mut() {
            map.revoke(&[id]);
        }
        Ok(())
    }

    async fn insert_team(&mut self, team: &Team) -> Result<(), StoreError> {
        self.working.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn team(&mut self, id: Uuid) -> Result<Option<Team>, StoreError> {
        Ok(self.working.teams.get(&id).cloned())
    }

    async fn update_team(&mut self, team: &Team) -> Result<(), StoreError> {
        match self.working.teams.get_mut(&team.id) {
            Some(existing) => {
                *existing = team.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_team(&mut self, id: Uuid) -> Result<(), StoreError> {
        if self.working.forms.values().any(|f| f.team_id == Some(id))
            || self.working.folders.values().any(|f| f.team_id == Some(id))
        {
            return Err(StoreError::Conflict("team still owns forms or folders".to_string()));
        }
        self.working.teams.remove(&id).ok_or(StoreError::NotFound)?;
        self.working.team_members.retain(|(team_id, _)| *team_id != id);
        self.working.permissions.remove(&ResourceRef::team(id));
        Ok(())
    }

    async fn teams_of_user(&mut self, user_id: Uuid) -> Result<Vec<Team>, StoreError> {
        let mut teams: Vec<Team> = self
            .working
            .team_members
            .iter()
            .filter(|(_, member)| *member == user_id)
            .filter_map(|(team_id, _)| self.working.teams.get(team_id).cloned())
            .collect();
        teams.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(teams)
    }

    async fn team_member_ids(&mut self, team_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .working
            .team_members
            .iter()
            .filter(|(team, _)| *team == team_id)
            .map(|(_, user)| *user)
            .collect())
    }

    async fn add_team_member(&mut self, team_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        if !self.working.teams.contains_key(&team_id) {
            return Err(StoreError::NotFound);
        }
        if !self.working.team_members.insert((team_id, user_id)) {
            return Err(StoreError::Conflict("user is already a member".to_string()));
        }
        Ok(())
    }

    async fn remove_team_members(&mut self, team_id: Uuid, user_ids: &[Uuid]) -> Result<u64, StoreError> {
        let removed = user_ids
            .iter()
            .filter(|user| self.working.team_members.remove(&(team_id, **user)))
            .count();
        Ok(removed as u64)
    }

    async fn insert_folder(&mut self, folder: &Folder) -> Result<(), StoreError> {
        self.working.folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn folder(&mut self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        Ok(self.working.folders.get(&id).cloned())
    }

    async fn update_folder(&mut self, folder: &Folder) -> Result<(), StoreError> {
        match self.working.folders.get_mut(&folder.id) {
            Some(existing) => {
                *existing = folder.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_folders(&mut self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if self
            .working
            .forms
            .values()
            .any(|form| form.folder_id.map_or(false, |folder| ids.contains(&folder)))
        {
            return Err(StoreError::Conflict("folder still holds forms".to_string()));
        }
        let mut removed = 0;
        for id in ids {
            if self.working.folders.remove(id).is_some() {
                removed += 1;
            }
            self.working.permissions.remove(&ResourceRef::folder(*id));
        }
        Ok(removed)
    }

    async fn folders_of_team(&mut self, team_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let mut folders: Vec<Folder> = self
            .working
            .folders
            .values()
            .filter(|f| f.team_id == Some(team_id))
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(folders)
    }

    async fn personal_folders(&mut self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let mut folders: Vec<Folder> = self
            .working
            .folders
            .values()
            .filter(|f| f.team_id.is_none() && f.creator_id == user_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(folders)
    }

    async fn folders_created_by(&mut self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        Ok(self
            .working
            .folders
            .values()
            .filter(|f| f.creator_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_form(&mut self, form: &Form) -> Result<(), StoreError> {
        self.working.forms.insert(form.id, form.clone());
        Ok(())
    }

    async fn form(&mut self, id: Uuid) -> Result<Option<Form>, StoreError> {
        Ok(self.working.forms.get(&id).cloned())
    }

    async fn update_form(&mut self, form: &Form) -> Result<(), StoreError> {
        match self.working.forms.get_mut(&form.id) {
            Some(existing) => {
                let total_submissions = existing.total_submissions;
                *existing = Form { total_submissions, ..form.clone() };
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_forms(&mut self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if self.working.responses.values().any(|r| ids.contains(&r.form_id)) {
            return Err(StoreError::Conflict("form still has responses".to_string()));
        }
        let mut removed = 0;
        for id in ids {
            if self.working.forms.remove(id).is_some() {
                removed += 1;
            }
            self.working.permissions.remove(&ResourceRef::form(*id));
        }
        self.working.favourites.retain(|(form_id, _)| !ids.contains(form_id));
        Ok(removed)
    }

    async fn forms_of_team(&mut self, team_id: Uuid) -> Result<Vec<Form>, StoreError> {
        Ok(self
            .working
            .forms
            .values()
            .filter(|f| f.team_id == Some(team_id))
            .cloned()
            .collect())
    }

    async fn forms_in_folder(&mut self, folder_id: Uuid) -> Result<Vec<Form>, StoreError> {
        Ok(self
            .working
            .forms
            .values()
            .filter(|f| f.folder_id == Some(folder_id))
            .cloned()
            .collect())
    }

    async fn forms_created_by(&mut self, user_id: Uuid) -> Result<Vec<Form>, StoreError> {
        Ok(self
            .working
            .forms
            .values()
            .filter(|f| f.creator_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_forms(&mut self, query: &FormQuery) -> Result<FormPage, StoreError> {
        let mut forms: Vec<Form> = self
            .working
            .forms
            .values()
            .filter(|form| self.form_in_scope(form, query) && query.title_matches(&form.title))
            .cloned()
            .collect();

        let sort = query.order.sort;
        forms.sort_by(|a, b| {
            let ordering = match query.order.field {
                FormSortField::Title => a.title.cmp(&b.title),
                FormSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                FormSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            sort.apply(ordering).then(a.id.cmp(&b.id))
        });

        let total = forms.len() as u64;
        Ok(FormPage {
            forms: query.page.slice(forms),
            total,
        })
    }

    async fn adjust_submissions(&mut self, form_id: Uuid, delta: i32) -> Result<i32, StoreError> {
        let form = self.working.forms.get_mut(&form_id).ok_or(StoreError::NotFound)?;
        form.total_submissions = (form.total_submissions + delta).max(0);
        Ok(form.total_submissions)
    }

    async fn is_favourite(&mut self, form_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.working.favourites.contains(&(form_id, user_id)))
    }

    async fn set_favourite(&mut self, form_id: Uuid, user_id: Uuid, favourite: bool) -> Result<(), StoreError> {
        if favourite {
            self.working.favourites.insert((form_id, user_id));
        } else {
            self.working.favourites.remove(&(form_id, user_id));
        }
        Ok(())
    }

    async fn favourite_form_ids(&mut self, user_id: Uuid, form_ids: &[Uuid]) -> Result<HashSet<Uuid>, StoreError> {
        Ok(form_ids
            .iter()
            .filter(|form_id| self.working.favourites.contains(&(**form_id, user_id)))
            .copied()
            .collect())
    }

    async fn permissions(&mut self, resource: ResourceRef) -> Result<PermissionMap, StoreError> {
        Ok(self.permission_map(&resource).cloned().unwrap_or_default())
    }

    async fn replace_permissions(&mut self, resource: ResourceRef, map: &PermissionMap) -> Result<(), StoreError> {
        self.check_permission_write(&resource)?;
        self.working.permissions.insert(resource, map.clone());
        Ok(())
    }

    async fn grant(&mut self, resource: ResourceRef, user_id: Uuid, capabilities: &CapabilitySet) -> Result<(), StoreError> {
        self.check_permission_write(&resource)?;
        self.working
            .permissions
            .entry(resource)
            .or_default()
            .grant(user_id, capabilities.clone());
        Ok(())
    }

    async fn revoke(&mut self, resource: ResourceRef, user_ids: &[Uuid]) -> Result<u64, StoreError> {
        self.check_permission_write(&resource)?;
        let removed = self
            .working
            .permissions
            .get_mut(&resource)
            .map(|map| map.revoke(user_ids))
            .unwrap_or(0);
        Ok(removed as u64)
    }

    async fn insert_response(&mut self, response: &Response) -> Result<(), StoreError> {
        if !self.working.forms.contains_key(&response.form_id) {
            return Err(StoreError::NotFound);
        }
        self.working.responses.insert(response.id, response.clone());
        Ok(())
    }

    async fn response(&mut self, id: Uuid) -> Result<Option<Response>, StoreError> {
        Ok(self.working.responses.get(&id).cloned())
    }

    async fn responses_of_form(&mut self, form_id: Uuid) -> Result<Vec<Response>, StoreError> {
        let mut responses: Vec<Response> = self
            .working
            .responses
            .values()
            .filter(|r| r.form_id == form_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.index);
        Ok(responses)
    }

    async fn delete_responses(&mut self, form_id: Uuid, ids: &[Uuid]) -> Result<u64, StoreError> {
        let before = self.working.responses.len();
        self.working
            .responses
            .retain(|id, r| !(r.form_id == form_id && ids.contains(id)));
        Ok((before - self.working.responses.len()) as u64)
    }

    async fn delete_responses_of_forms(&mut self, form_ids: &[Uuid]) -> Result<u64, StoreError> {
        let before = self.working.responses.len();
        self.working.responses.retain(|_, r| !form_ids.contains(&r.form_id));
        Ok((before - self.working.responses.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_points.contains(&FailPoint::Commit) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        debug!("memory transaction committed");
        Ok(())
    }
}
