//! Ordered cascading deletes.
//!
//! Responses go first, then forms, then folders, then the team or user. The plan is
//! built from ids gathered inside the transaction that executes it.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::error::ServiceResult;
use crate::database::StoreTx;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStep {
    ResponsesOfForms(Vec<Uuid>),
    Forms(Vec<Uuid>),
    Folders(Vec<Uuid>),
    Team(Uuid),
    User(Uuid),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub responses: u64,
    pub forms: u64,
    pub folders: u64,
    pub teams: u64,
    pub users: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    steps: Vec<DeleteStep>,
}

impl DeletePlan {
    pub fn form(form_id: Uuid) -> Self {
        Self {
            steps: vec![
                DeleteStep::ResponsesOfForms(vec![form_id]),
                DeleteStep::Forms(vec![form_id]),
            ],
        }
    }

    pub fn folder(folder_id: Uuid, form_ids: Vec<Uuid>) -> Self {
        Self {
            steps: vec![
                DeleteStep::ResponsesOfForms(form_ids.clone()),
                DeleteStep::Forms(form_ids),
                DeleteStep::Folders(vec![folder_id]),
            ],
        }
    }

    pub fn team(team_id: Uuid, form_ids: Vec<Uuid>, folder_ids: Vec<Uuid>) -> Self {
        Self {
            steps: vec![
                DeleteStep::ResponsesOfForms(form_ids.clone()),
                DeleteStep::Forms(form_ids),
                DeleteStep::Folders(folder_ids),
                DeleteStep::Team(team_id),
            ],
        }
    }

    /// A user's personal forms and folders, then the user row itself.
    pub fn account(user_id: Uuid, form_ids: Vec<Uuid>, folder_ids: Vec<Uuid>) -> Self {
        Self {
            steps: vec![
                DeleteStep::ResponsesOfForms(form_ids.clone()),
                DeleteStep::Forms(form_ids),
                DeleteStep::Folders(folder_ids),
                DeleteStep::User(user_id),
            ],
        }
    }

    pub fn steps(&self) -> &[DeleteStep] {
        &self.steps
    }

    /// Runs every step in order. Nothing is committed here.
    pub async fn execute(&self, tx: &mut dyn StoreTx) -> ServiceResult<DeleteReport> {
        let mut report = DeleteReport::default();
        for step in &self.steps {
            match step {
                DeleteStep::ResponsesOfForms(ids) if !ids.is_empty() => {
                    report.responses += tx.delete_responses_of_forms(ids).await?;
                }
                DeleteStep::Forms(ids) if !ids.is_empty() => {
                    report.forms += tx.delete_forms(ids).await?;
                }
                DeleteStep::Folders(ids) if !ids.is_empty() => {
                    report.folders += tx.delete_folders(ids).await?;
                }
                DeleteStep::Team(id) => {
                    tx.delete_team(*id).await?;
                    report.teams += 1;
                }
                DeleteStep::User(id) => {
                    tx.delete_user(*id).await?;
                    report.users += 1;
                }
                _ => {}
            }
        }
        info!(
            responses = report.responses,
            forms = report.forms,
            folders = report.folders,
            teams = report.teams,
            users = report.users,
            "delete plan executed"
        );
        Ok(report)
    }
}
