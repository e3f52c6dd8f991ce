use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::form::ElementId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub field_id: ElementId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAnswer {
    pub element_id: ElementId,
    pub answers: Vec<Answer>,
}

/// A submission. Never updated; only removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: Uuid,
    pub form_id: Uuid,
    pub index: i32,
    pub form_answers: Vec<ElementAnswer>,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn new(form_id: Uuid, index: i32, form_answers: Vec<ElementAnswer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_id,
            index,
            form_answers,
            created_at: Utc::now(),
        }
    }

    /// Text of every answer, in submission order.
    pub fn answer_texts(&self) -> impl Iterator<Item = &str> {
        self.form_answers
            .iter()
            .flat_map(|element| element.answers.iter().map(|answer| answer.text.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResponse {
    pub form_answers: Vec<ElementAnswer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelledAnswer {
    pub field_id: ElementId,
    pub text: String,
    pub field_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelledElementAnswer {
    pub element_id: ElementId,
    pub element_name: String,
    pub answers: Vec<LabelledAnswer>,
}

/// A response with field and element names resolved against its form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelledResponse {
    pub id: Uuid,
    pub index: i32,
    pub created_at: DateTime<Utc>,
    pub form_answers: Vec<LabelledElementAnswer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLabel {
    pub element_id: ElementId,
    pub element_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePage {
    pub element_id_and_name_list: Vec<ElementLabel>,
    pub responses: Vec<LabelledResponse>,
    pub page: u32,
    pub page_size: u32,
    pub total_responses: u64,
    pub total_pages: u64,
}
