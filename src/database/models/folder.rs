use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::form::Form;
use crate::permissions::PermissionMap;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub creator_id: Uuid,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(name: &str, color: Option<String>, creator_id: Uuid, team_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            color,
            creator_id,
            team_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_personal(&self) -> bool {
        self.team_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderChanges {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDetails {
    #[serde(flatten)]
    pub folder: Folder,
    pub forms: Vec<Form>,
    pub permissions: PermissionMap,
}
