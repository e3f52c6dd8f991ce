//! Team membership propagation.
//!
//! A team's member set is mirrored into the permission maps of the team and of
//! every form and folder it owns. These functions perform that rewrite inside
//! the caller's transaction; they do not authorize and do not commit. Callers
//! check preconditions first and commit afterwards, so a failure anywhere
//! leaves every map as it was.
//!
//! Per-resource grants carry no origin. A member who was also invited to a team
//! form directly loses that entry on removal like any other team grant.

use tracing::debug;
use uuid::Uuid;

use super::error::ServiceResult;
use crate::database::models::Team;
use crate::database::StoreTx;
use crate::permissions::{CapabilitySet, PermissionMap, ResourceRef};

/// Counts of resources touched by one propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    pub forms: usize,
    pub folders: usize,
}

/// Every form and folder the team owns.
async fn owned_resources(tx: &mut dyn StoreTx, team_id: Uuid) -> ServiceResult<(Vec<ResourceRef>, Vec<ResourceRef>)> {
    let forms = tx
        .forms_of_team(team_id)
        .await?
        .iter()
        .map(|form| ResourceRef::form(form.id))
        .collect();
    let folders = tx
        .folders_of_team(team_id)
        .await?
        .iter()
        .map(|folder| ResourceRef::folder(folder.id))
        .collect();
    Ok((forms, folders))
}

/// Joins `member_id` to the team: {VIEW, EDIT} on the team record and
/// {VIEW, EDIT, DELETE} on every owned form and folder.
pub async fn add_member(tx: &mut dyn StoreTx, team: &Team, member_id: Uuid) -> ServiceResult<Propagation> {
    tx.add_team_member(team.id, member_id).await?;
    tx.grant(ResourceRef::team(team.id), member_id, &CapabilitySet::collaborator()).await?;

    let (forms, folders) = owned_resources(tx, team.id).await?;
    let full = CapabilitySet::full();
    tx.grant_all(&forms, member_id, &full).await?;
    tx.grant_all(&folders, member_id, &full).await?;

    debug!(team_id = %team.id, %member_id, forms = forms.len(), folders = folders.len(), "member propagated");
    Ok(Propagation { forms: forms.len(), folders: folders.len() })
}

/// Removes the members from the team and strips their entries from the team
/// and from every owned form and folder.
pub async fn remove_members(tx: &mut dyn StoreTx, team: &Team, member_ids: &[Uuid]) -> ServiceResult<Propagation> {
    tx.remove_team_members(team.id, member_ids).await?;
    tx.revoke(ResourceRef::team(team.id), member_ids).await?;

    let (forms, folders) = owned_resources(tx, team.id).await?;
    tx.revoke_all(&forms, member_ids).await?;
    tx.revoke_all(&folders, member_ids).await?;

    debug!(team_id = %team.id, removed = member_ids.len(), forms = forms.len(), folders = folders.len(), "members stripped");
    Ok(Propagation { forms: forms.len(), folders: folders.len() })
}

/// Map giving every current team member full rights, used when a form or
/// folder is created in or moved into the team.
pub async fn team_snapshot(tx: &mut dyn StoreTx, team_id: Uuid) -> ServiceResult<PermissionMap> {
    let members = tx.team_member_ids(team_id).await?;
    Ok(PermissionMap::uniform(members.iter(), CapabilitySet::full()))
}
