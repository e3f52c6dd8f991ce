//! Per-resource capability sets and the three authorization predicates.
//!
//! Teams, folders and forms each carry their own [`PermissionMap`]. The
//! predicates here are the only authorization primitives in the crate; every
//! service operation that mutates a resource runs one of them against the map
//! it read inside the same transaction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single permitted action on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Capability {
    View,
    Edit,
    Delete,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::View, Capability::Edit, Capability::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::View => "VIEW",
            Capability::Edit => "EDIT",
            Capability::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEW" => Ok(Capability::View),
            "EDIT" => Ok(Capability::Edit),
            "DELETE" => Ok(Capability::Delete),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Unordered set of capabilities one user holds on one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// {VIEW, EDIT, DELETE}: creators, and team members on team-owned forms/folders.
    pub fn full() -> Self {
        Self(Capability::ALL.into_iter().collect())
    }

    /// {VIEW, EDIT}: team members on the team record, and individually invited members.
    pub fn collaborator() -> Self {
        Self([Capability::View, Capability::Edit].into_iter().collect())
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Mapping from user id to the capabilities that user holds on a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<Uuid, CapabilitySet>);

impl PermissionMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Map holding a single user at full rights.
    pub fn owned_by(user_id: Uuid) -> Self {
        let mut map = Self::new();
        map.grant(user_id, CapabilitySet::full());
        map
    }

    /// Map granting every listed user the same capability set.
    pub fn uniform<'a>(user_ids: impl IntoIterator<Item = &'a Uuid>, capabilities: CapabilitySet) -> Self {
        Self(
            user_ids
                .into_iter()
                .map(|id| (*id, capabilities.clone()))
                .collect(),
        )
    }

    pub fn get(&self, user_id: &Uuid) -> Option<&CapabilitySet> {
        self.0.get(user_id)
    }

    /// Overwrites the user's entry.
    pub fn grant(&mut self, user_id: Uuid, capabilities: CapabilitySet) {
        self.0.insert(user_id, capabilities);
    }

    /// Drops the entries of every listed user; returns how many were present.
    pub fn revoke(&mut self, user_ids: &[Uuid]) -> usize {
        user_ids
            .iter()
            .filter(|id| self.0.remove(id).is_some())
            .count()
    }

    pub fn contains_user(&self, user_id: &Uuid) -> bool {
        self.0.contains_key(user_id)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &CapabilitySet)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens the map into `(user, capability)` pairs, the shape of the side table.
    pub fn rows(&self) -> Vec<(Uuid, Capability)> {
        self.0
            .iter()
            .flat_map(|(user, caps)| caps.iter().map(move |cap| (*user, cap)))
            .collect()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (Uuid, Capability)>) -> Self {
        let mut map: BTreeMap<Uuid, CapabilitySet> = BTreeMap::new();
        for (user, cap) in rows {
            map.entry(user).or_default().insert(cap);
        }
        Self(map)
    }
}

fn holds(user_id: &Uuid, map: Option<&PermissionMap>, capability: Capability) -> bool {
    map.and_then(|m| m.get(user_id))
        .map(|caps| caps.contains(capability))
        .unwrap_or(false)
}

pub fn can_view(user_id: &Uuid, map: Option<&PermissionMap>) -> bool {
    holds(user_id, map, Capability::View)
}

pub fn can_edit(user_id: &Uuid, map: Option<&PermissionMap>) -> bool {
    holds(user_id, map, Capability::Edit)
}

pub fn can_delete(user_id: &Uuid, map: Option<&PermissionMap>) -> bool {
    holds(user_id, map, Capability::Delete)
}

/// The kind of resource a permission row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Team,
    Folder,
    Form,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Team => "team",
            ResourceKind::Folder => "folder",
            ResourceKind::Form => "form",
        }
    }
}

/// Address of one permission map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: Uuid,
}

impl ResourceRef {
    pub fn team(id: Uuid) -> Self {
        Self { kind: ResourceKind::Team, id }
    }

    pub fn folder(id: Uuid) -> Self {
        Self { kind: ResourceKind::Folder, id }
    }

    pub fn form(id: Uuid) -> Self {
        Self { kind: ResourceKind::Form, id }
    }
}
