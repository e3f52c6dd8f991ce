use chrono::Utc;
use serde::Deserialize;
use std::cmp::Ordering;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::{authorize, load_form, ServiceContext};
use crate::database::models::{
    ElementLabel, Form, LabelledAnswer, LabelledElementAnswer, LabelledResponse, NewResponse, Response,
    ResponsePage,
};
use crate::filter::{FieldFilter, FilterOrder, Page, ResponseQuery};
use crate::notify::{mailer, Notification};
use crate::permissions::{can_edit, can_view, ResourceRef};

/// Query-string parameters of a response listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseListParams {
    pub search: Option<String>,
    /// Comma-separated `elementId:fieldName:value` or `elementId:fieldName:from:to`.
    pub filters: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ResponsesService {
    ctx: ServiceContext,
}

impl ResponsesService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Record an anonymous submission and bump the form's counter
    pub async fn submit(&self, form_id: Uuid, submission: NewResponse) -> ServiceResult<Response> {
        let mut tx = self.ctx.store.begin().await?;
        let form = load_form(tx.as_mut(), form_id).await?;
        if !form.accepts_responses(Utc::now()) {
            return Err(ServiceError::conflict("this form is not accepting responses"));
        }
        for element in &submission.form_answers {
            if form.element(&element.element_id).is_none() {
                return Err(ServiceError::validation(format!(
                    "element {} does not exist on this form",
                    element.element_id
                )));
            }
        }

        let index = tx.adjust_submissions(form_id, 1).await?;
        let response = Response::new(form_id, index, submission.form_answers);
        tx.insert_response(&response).await?;
        let creator = if form.disabled_notification {
            None
        } else {
            tx.user(form.creator_id).await?
        };
        tx.commit().await?;

        info!(%form_id, response_id = %response.id, index, "response recorded");
        self.ctx.notifier.notify(Notification::ResponseSubmitted { form_id, response_id: response.id });
        match creator {
            Some(creator) => {
                let link = format!("{}/responses/{}", self.ctx.config.server.front_end_url, form_id);
                self.ctx.notifier.notify(Notification::Mail(mailer::response_notification(
                    &creator.email,
                    &form.title,
                    &link,
                    &response,
                    &element_labels(&form),
                )));
            }
            None => debug!(%form_id, "response mail skipped"),
        }
        Ok(response)
    }

    pub async fn list(&self, user_id: Uuid, form_id: Uuid, params: ResponseListParams) -> ServiceResult<ResponsePage> {
        let mut tx = self.ctx.store.begin().await?;
        let form = load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_view, "view").await?;

        let pagination = &self.ctx.config.pagination;
        let query = ResponseQuery {
            search: params.search,
            filters: match params.filters.as_deref() {
                Some(expressions) => FieldFilter::parse_list(expressions, &form)?,
                None => Vec::new(),
            },
            order: FilterOrder::responses(params.sort_by.as_deref(), params.sort_order.as_deref())?,
            page: Page::new(params.page, params.page_size, pagination.default_page_size, pagination.max_page_size)?,
        };

        let (responses, total) = query.apply(tx.responses_of_form(form_id).await?);
        Ok(ResponsePage {
            element_id_and_name_list: element_labels(&form),
            responses: responses.iter().map(|response| label(&form, response)).collect(),
            page: query.page.page,
            page_size: query.page.page_size,
            total_responses: total,
            total_pages: query.page.total_pages(total),
        })
    }

    pub async fn delete_response(&self, user_id: Uuid, form_id: Uuid, response_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.ctx.store.begin().await?;
        load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;

        let response = tx
            .response(response_id)
            .await?
            .filter(|response| response.form_id == form_id)
            .ok_or_else(|| ServiceError::not_found("Response"))?;
        tx.delete_responses(form_id, &[response.id]).await?;
        tx.adjust_submissions(form_id, -1).await?;
        tx.commit().await?;

        info!(%form_id, %response_id, "response deleted");
        Ok(())
    }

    /// Remove the listed responses; ids of other forms are ignored. Returns the count removed.
    pub async fn delete_many(&self, user_id: Uuid, form_id: Uuid, response_ids: &[Uuid]) -> ServiceResult<u64> {
        if response_ids.is_empty() {
            return Err(ServiceError::validation("no responses to delete"));
        }

        let mut tx = self.ctx.store.begin().await?;
        load_form(tx.as_mut(), form_id).await?;
        authorize(tx.as_mut(), ResourceRef::form(form_id), user_id, can_edit, "edit").await?;

        let removed = tx.delete_responses(form_id, response_ids).await?;
        if removed > 0 {
            let delta = i32::try_from(removed).map_err(|_| ServiceError::validation("too many responses"))?;
            tx.adjust_submissions(form_id, -delta).await?;
        }
        tx.commit().await?;

        info!(%form_id, removed, "responses deleted");
        Ok(removed)
    }
}

/// Labelled elements ordered top to bottom by grid position.
fn element_labels(form: &Form) -> Vec<ElementLabel> {
    let mut elements: Vec<_> = form
        .elements
        .iter()
        .filter_map(|element| element.label().map(|name| (element, name)))
        .collect();
    elements.sort_by(|(a, _), (b, _)| {
        let ay = a.grid_size.map(|g| g.y).unwrap_or(f64::MAX);
        let by = b.grid_size.map(|g| g.y).unwrap_or(f64::MAX);
        ay.partial_cmp(&by).unwrap_or(Ordering::Equal)
    });
    elements
        .into_iter()
        .map(|(element, name)| ElementLabel { element_id: element.id.clone(), element_name: name })
        .collect()
}

fn label(form: &Form, response: &Response) -> LabelledResponse {
    let form_answers = response
        .form_answers
        .iter()
        .map(|element_answer| {
            let element = form.element(&element_answer.element_id);
            LabelledElementAnswer {
                element_id: element_answer.element_id.clone(),
                element_name: element.and_then(|e| e.label()).unwrap_or_default(),
                answers: element_answer
                    .answers
                    .iter()
                    .map(|answer| LabelledAnswer {
                        field_id: answer.field_id.clone(),
                        text: answer.text.clone(),
                        field_name: element.and_then(|e| e.field_name(&answer.field_id)).map(str::to_string),
                    })
                    .collect(),
            }
        })
        .collect();

    LabelledResponse {
        id: response.id,
        index: response.index,
        created_at: response.created_at,
        form_answers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Answer, ElementAnswer, ElementId, FormDraft};
    use crate::testing::TestContext;
    use serde_json::json;

    fn draft() -> FormDraft {
        FormDraft {
            title: "Signup".into(),
            elements: serde_json::from_value(json!([
                {"id": 2, "type": "Email", "config": {"fieldLabel": "Email"},
                 "fields": [{"id": 21, "name": "email"}], "gridSize": {"x": 0, "y": 4, "w": 6, "h": 1}},
                {"id": 1, "type": "FullName", "config": {"fieldLabel": "Name"},
                 "fields": [{"id": 11, "name": "first"}, {"id": 12, "name": "last"}],
                 "gridSize": {"x": 0, "y": 0, "w": 6, "h": 1}}
            ]))
            .unwrap(),
            ..Default::default()
        }
    }

    fn answers(first: &str, email: &str) -> NewResponse {
        NewResponse {
            form_answers: vec![
                ElementAnswer {
                    element_id: ElementId::Number(1),
                    answers: vec![Answer { field_id: ElementId::Number(11), text: first.into() }],
                },
                ElementAnswer {
                    element_id: ElementId::Number(2),
                    answers: vec![Answer { field_id: ElementId::Number(21), text: email.into() }],
                },
            ],
        }
    }

    #[tokio::test]
    async fn submit_indexes_and_notifies_creator() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.state.forms().create_personal(owner.id, draft()).await.unwrap();
        let responses = ctx.state.responses();

        let first = responses.submit(form.id, answers("Ada", "ada@example.com")).await.unwrap();
        let second = responses.submit(form.id, answers("Bo", "bo@example.com")).await.unwrap();
        assert_eq!((first.index, second.index), (1, 2));
        assert_eq!(ctx.state.forms().details(owner.id, form.id).await.unwrap().form.total_submissions, 2);

        let notes = ctx.notifications();
        let mails: Vec<_> = notes
            .iter()
            .filter_map(|n| match n {
                Notification::Mail(email) => Some(email),
                _ => None,
            })
            .collect();
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].to, "owner@example.com");
        assert!(mails[0].body.contains("Name: Ada"));
        assert!(notes.iter().any(|n| matches!(n, Notification::ResponseSubmitted { .. })));
    }

    #[tokio::test]
    async fn muted_form_sends_no_mail() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.state.forms().create_personal(owner.id, draft()).await.unwrap();
        ctx.state.forms().set_disabled_notification(owner.id, form.id, true).await.unwrap();

        ctx.state.responses().submit(form.id, answers("Ada", "a@example.com")).await.unwrap();
        assert!(!ctx.notifications().iter().any(|n| matches!(n, Notification::Mail(_))));
    }

    #[tokio::test]
    async fn disabled_form_rejects_without_counting() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.state.forms().create_personal(owner.id, draft()).await.unwrap();
        ctx.state.forms().set_disabled(owner.id, form.id, true).await.unwrap();

        let err = ctx.state.responses().submit(form.id, answers("Ada", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let details = ctx.state.forms().details(owner.id, form.id).await.unwrap();
        assert_eq!(details.form.total_submissions, 0);
    }

    #[tokio::test]
    async fn unknown_element_is_rejected() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.state.forms().create_personal(owner.id, draft()).await.unwrap();

        let bogus = NewResponse {
            form_answers: vec![ElementAnswer { element_id: ElementId::Text("99".into()), answers: vec![] }],
        };
        let err = ctx.state.responses().submit(form.id, bogus).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = ctx.state.responses().submit(Uuid::new_v4(), answers("A", "b")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_three_of_ten_leaves_seven() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let form = ctx.state.forms().create_personal(owner.id, draft()).await.unwrap();
        let responses = ctx.state.responses();

        let mut ids = Vec::new();
        for i in 0..10 {
            let r = responses.submit(form.id, answers(&format!("user{}", i), "x@example.com")).await.unwrap();
            ids.push(r.id);
        }

        let removed = responses.delete_many(owner.id, form.id, &ids[..3]).await.unwrap();
        assert_eq!(removed, 3);

        let page = responses.list(owner.id, form.id, ResponseListParams::default()).await.unwrap();
        assert_eq!(page.total_responses, 7);
        let details = ctx.state.forms().details(owner.id, form.id).await.unwrap();
        assert_eq!(details.form.total_submissions, 7);

        responses.delete_response(owner.id, form.id, ids[5]).await.unwrap();
        let err = responses.delete_response(owner.id, form.id, ids[5]).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_filters_and_labels() {
        let ctx = TestContext::new();
        let owner = ctx.user("owner@example.com").await;
        let stranger = ctx.user("stranger@example.com").await;
        let form = ctx.state.forms().create_personal(owner.id, draft()).await.unwrap();
        let responses = ctx.state.responses();
        responses.submit(form.id, answers("Ada", "ada@example.com")).await.unwrap();
        responses.submit(form.id, answers("Bo", "bo@corp.test")).await.unwrap();
        responses.submit(form.id, answers("Adele", "adele@corp.test")).await.unwrap();

        let page = responses
            .list(
                owner.id,
                form.id,
                ResponseListParams { filters: Some("1:first:ad".into()), sort_by: Some("index".into()), sort_order: Some("desc".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(page.total_responses, 2);
        assert_eq!(page.responses[0].index, 3);
        assert_eq!(page.responses[0].form_answers[0].element_name, "Name");
        assert_eq!(page.responses[0].form_answers[0].answers[0].field_name.as_deref(), Some("first"));

        let names: Vec<_> = page.element_id_and_name_list.iter().map(|l| l.element_name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Email"]);

        let searched = responses
            .list(owner.id, form.id, ResponseListParams { search: Some("CORP".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(searched.total_responses, 2);

        let err = responses
            .list(owner.id, form.id, ResponseListParams { filters: Some("7:first:x".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = responses.list(stranger.id, form.id, ResponseListParams::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
    }
}
