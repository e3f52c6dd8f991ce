use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use super::user::UserSummary;
use crate::permissions::PermissionMap;

/// Element and field identifiers arrive from the form editor as either numbers
/// or strings. The original representation is kept so stored forms round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementId {
    Number(i64),
    Text(String),
}

impl ElementId {
    /// Canonical string key, used for lookups and filter expressions.
    pub fn key(&self) -> String {
        match self {
            ElementId::Number(n) => n.to_string(),
            ElementId::Text(s) => s.clone(),
        }
    }

    pub fn matches(&self, other: &ElementId) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Number(n) => write!(f, "{}", n),
            ElementId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSize {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementField {
    pub id: ElementId,
    pub name: String,
}

/// One typed element of a form. Unknown editor keys are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub fields: Vec<ElementField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<GridSize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormElement {
    /// The label shown for this element: the first config key containing `fieldLabel`.
    pub fn label(&self) -> Option<String> {
        if let Some(value) = self.config.get("fieldLabel") {
            return Some(value_text(value));
        }
        self.config
            .iter()
            .find(|(key, _)| key.contains("fieldLabel"))
            .map(|(_, value)| value_text(value))
    }

    pub fn field_name(&self, field_id: &ElementId) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.id.matches(field_id))
            .map(|field| field.name.as_str())
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Where a form lives. Exactly one of these holds for every stored form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Personal,
    PersonalFolder(Uuid),
    Team(Uuid),
    TeamFolder { team_id: Uuid, folder_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: Uuid,
    pub title: String,
    pub logo_url: Option<String>,
    pub settings: Value,
    pub elements: Vec<FormElement>,
    pub creator_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub disabled_on_specific_date: bool,
    pub disabled_on_date: Option<DateTime<Utc>>,
    pub disabled_notification: bool,
    pub total_submissions: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    pub fn new(draft: FormDraft, creator_id: Uuid, placement: Placement) -> Self {
        let now = Utc::now();
        let (team_id, folder_id) = match placement {
            Placement::Personal => (None, None),
            Placement::PersonalFolder(folder_id) => (None, Some(folder_id)),
            Placement::Team(team_id) => (Some(team_id), None),
            Placement::TeamFolder { team_id, folder_id } => (Some(team_id), Some(folder_id)),
        };
        Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            logo_url: draft.logo_url,
            settings: draft.settings.unwrap_or_else(|| Value::Object(Map::new())),
            elements: draft.elements,
            creator_id,
            folder_id,
            team_id,
            deleted_at: None,
            disabled: false,
            disabled_on_specific_date: false,
            disabled_on_date: None,
            disabled_notification: false,
            total_submissions: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn placement(&self) -> Placement {
        match (self.team_id, self.folder_id) {
            (None, None) => Placement::Personal,
            (None, Some(folder_id)) => Placement::PersonalFolder(folder_id),
            (Some(team_id), None) => Placement::Team(team_id),
            (Some(team_id), Some(folder_id)) => Placement::TeamFolder { team_id, folder_id },
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// False when the form is disabled, soft-deleted or past its closing date.
    pub fn accepts_responses(&self, now: DateTime<Utc>) -> bool {
        if self.disabled || self.is_deleted() {
            return false;
        }
        match (self.disabled_on_specific_date, self.disabled_on_date) {
            (true, Some(closes_at)) => now < closes_at,
            _ => true,
        }
    }

    pub fn element(&self, element_id: &ElementId) -> Option<&FormElement> {
        self.elements.iter().find(|element| element.id.matches(element_id))
    }

    pub fn element_keys(&self) -> Vec<String> {
        self.elements.iter().map(|element| element.id.key()).collect()
    }
}

/// Fields a client supplies when creating a form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    pub title: String,
    pub logo_url: Option<String>,
    pub settings: Option<Value>,
    #[serde(default)]
    pub elements: Vec<FormElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormChanges {
    pub title: Option<String>,
    pub logo_url: Option<String>,
    pub settings: Option<Value>,
    pub elements: Option<Vec<FormElement>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisabledOnDate {
    pub disabled_on_specific_date: bool,
    pub disabled_on_date: Option<DateTime<Utc>>,
}

/// A listed form, decorated with the caller's favourite flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormListItem {
    #[serde(flatten)]
    pub form: Form,
    pub is_favourite: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormListPage {
    pub forms: Vec<FormListItem>,
    pub page: u32,
    pub page_size: u32,
    pub total_forms: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDetails {
    #[serde(flatten)]
    pub form: Form,
    pub is_favourite: bool,
    pub permissions: PermissionMap,
}

/// The projection served to anonymous respondents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicForm {
    pub id: Uuid,
    pub title: String,
    pub logo_url: Option<String>,
    pub settings: Value,
    pub elements: Vec<FormElement>,
    pub accepts_responses: bool,
}

impl From<&Form> for PublicForm {
    fn from(form: &Form) -> Self {
        Self {
            id: form.id,
            title: form.title.clone(),
            logo_url: form.logo_url.clone(),
            settings: form.settings.clone(),
            elements: form.elements.clone(),
            accepts_responses: form.accepts_responses(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMember {
    #[serde(flatten)]
    pub user: UserSummary,
    pub permissions: crate::permissions::CapabilitySet,
}
