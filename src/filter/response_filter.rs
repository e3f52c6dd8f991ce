use chrono::{DateTime, NaiveDate};

use super::error::FilterError;
use super::filter_order::{FilterOrderInfo, ResponseSortField};
use super::types::Page;
use crate::database::models::{ElementId, Form, Response};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// Answer text contains the value, ignoring case.
    Contains(String),
    /// Answer text is a date inside the inclusive range.
    DateRange { from: NaiveDate, to: NaiveDate },
}

/// One `elementId:fieldName:value` or `elementId:fieldName:from:to` expression,
/// resolved against the form's elements.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub element_id: ElementId,
    pub field_id: ElementId,
    pub condition: FieldCondition,
}

impl FieldFilter {
    /// Parses a comma-separated list of expressions.
    pub fn parse_list(expressions: &str, form: &Form) -> Result<Vec<FieldFilter>, FilterError> {
        expressions
            .split(',')
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
            .map(|expr| Self::parse(expr, form))
            .collect()
    }

    pub fn parse(expression: &str, form: &Form) -> Result<FieldFilter, FilterError> {
        let parts: Vec<&str> = expression.split(':').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(FilterError::InvalidFieldFilter(expression.to_string()));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(FilterError::InvalidFieldFilter(expression.to_string()));
        }

        let element_key = ElementId::Text(parts[0].to_string());
        let element = form
            .element(&element_key)
            .ok_or_else(|| FilterError::UnknownElement(parts[0].to_string()))?;
        let field = element
            .fields
            .iter()
            .find(|field| field.name == parts[1])
            .ok_or_else(|| FilterError::InvalidFieldFilter(expression.to_string()))?;

        let condition = if parts.len() == 3 {
            FieldCondition::Contains(parts[2].to_lowercase())
        } else {
            let from = parse_date(parts[2]).ok_or_else(|| FilterError::InvalidDate(parts[2].to_string()))?;
            let to = parse_date(parts[3]).ok_or_else(|| FilterError::InvalidDate(parts[3].to_string()))?;
            if from > to {
                return Err(FilterError::InvalidFieldFilter(expression.to_string()));
            }
            FieldCondition::DateRange { from, to }
        };

        Ok(FieldFilter {
            element_id: element.id.clone(),
            field_id: field.id.clone(),
            condition,
        })
    }

    pub fn matches(&self, response: &Response) -> bool {
        response
            .form_answers
            .iter()
            .filter(|element| element.element_id.matches(&self.element_id))
            .flat_map(|element| element.answers.iter())
            .filter(|answer| answer.field_id.matches(&self.field_id))
            .any(|answer| match &self.condition {
                FieldCondition::Contains(value) => answer.text.to_lowercase().contains(value.as_str()),
                FieldCondition::DateRange { from, to } => parse_date(&answer.text)
                    .map(|date| date >= *from && date <= *to)
                    .unwrap_or(false),
            })
    }
}

/// Accepts `YYYY-MM-DD`, `MM/DD/YYYY` and RFC 3339 timestamps.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

#[derive(Debug, Clone)]
pub struct ResponseQuery {
    pub search: Option<String>,
    pub filters: Vec<FieldFilter>,
    pub order: FilterOrderInfo<ResponseSortField>,
    pub page: Page,
}

impl ResponseQuery {
    fn matches(&self, response: &Response) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => {
                let needle = search.to_lowercase();
                response.answer_texts().any(|text| text.to_lowercase().contains(&needle))
            }
            _ => true,
        };
        search_ok && self.filters.iter().all(|filter| filter.matches(response))
    }

    /// Filters, sorts and pages the responses of one form. Returns the page and
    /// the number of responses that matched before paging.
    pub fn apply(&self, mut responses: Vec<Response>) -> (Vec<Response>, u64) {
        responses.retain(|response| self.matches(response));
        let total = responses.len() as u64;
        let sort = self.order.sort;
        match self.order.field {
            ResponseSortField::CreatedAt => responses.sort_by(|a, b| {
                sort.apply(a.created_at.cmp(&b.created_at).then(a.index.cmp(&b.index)))
            }),
            ResponseSortField::Index => responses.sort_by(|a, b| sort.apply(a.index.cmp(&b.index))),
        }
        (self.page.slice(responses), total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Answer, ElementAnswer, FormDraft, Placement};
    use crate::filter::filter_order::FilterOrder;
    use crate::filter::types::SortDirection;
    use serde_json::json;
    use uuid::Uuid;

    fn form() -> Form {
        let elements = serde_json::from_value(json!([
            {"id": 1, "type": "FullName", "config": {"fieldLabel": "Name"},
             "fields": [{"id": 11, "name": "first"}, {"id": 12, "name": "last"}]},
            {"id": "2", "type": "Date", "config": {"fieldLabel": "Birthday"},
             "fields": [{"id": 21, "name": "date"}]}
        ]))
        .unwrap();
        Form::new(
            FormDraft { title: "People".into(), elements, ..Default::default() },
            Uuid::new_v4(),
            Placement::Personal,
        )
    }

    fn response(form: &Form, index: i32, first: &str, date: &str) -> Response {
        Response::new(
            form.id,
            index,
            vec![
                ElementAnswer {
                    element_id: ElementId::Number(1),
                    answers: vec![Answer { field_id: ElementId::Number(11), text: first.into() }],
                },
                ElementAnswer {
                    element_id: ElementId::Text("2".into()),
                    answers: vec![Answer { field_id: ElementId::Number(21), text: date.into() }],
                },
            ],
        )
    }

    fn query(filters: Vec<FieldFilter>, search: Option<&str>) -> ResponseQuery {
        ResponseQuery {
            search: search.map(str::to_string),
            filters,
            order: FilterOrder::responses(Some("index"), Some("desc")).unwrap(),
            page: Page { page: 1, page_size: 10 },
        }
    }

    #[test]
    fn parses_contains_and_date_ranges() {
        let form = form();
        let filters = FieldFilter::parse_list("1:first:ann, 2:date:2024-01-01:2024-12-31", &form).unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].condition, FieldCondition::Contains("ann".into()));
        assert!(matches!(filters[1].condition, FieldCondition::DateRange { .. }));
    }

    #[test]
    fn rejects_unknown_elements_and_malformed_expressions() {
        let form = form();
        assert_eq!(
            FieldFilter::parse("9:first:ann", &form),
            Err(FilterError::UnknownElement("9".into()))
        );
        assert!(matches!(FieldFilter::parse("1:first", &form), Err(FilterError::InvalidFieldFilter(_))));
        assert!(matches!(FieldFilter::parse("1:middle:x", &form), Err(FilterError::InvalidFieldFilter(_))));
        assert!(matches!(
            FieldFilter::parse("2:date:yesterday:today", &form),
            Err(FilterError::InvalidDate(_))
        ));
    }

    #[test]
    fn applies_filters_search_sort_and_paging() {
        let form = form();
        let responses = vec![
            response(&form, 1, "Anna", "2024-03-01"),
            response(&form, 2, "Joanne", "2023-03-01"),
            response(&form, 3, "Bob", "2024-06-30"),
            response(&form, 4, "Hannah", "06/15/2024"),
        ];

        let filters = FieldFilter::parse_list("1:first:ANN,2:date:2024-01-01:2024-12-31", &form).unwrap();
        let (page, total) = query(filters, None).apply(responses.clone());
        assert_eq!(total, 2);
        assert_eq!(page.iter().map(|r| r.index).collect::<Vec<_>>(), vec![4, 1]);

        let (page, total) = query(Vec::new(), Some("bob")).apply(responses);
        assert_eq!(total, 1);
        assert_eq!(page[0].index, 3);
    }

    #[test]
    fn created_at_sort_is_stable_on_index() {
        let form = form();
        let a = response(&form, 1, "A", "2024-01-01");
        let mut b = response(&form, 2, "B", "2024-01-01");
        b.created_at = a.created_at;
        let mut q = query(Vec::new(), None);
        q.order = FilterOrder::responses(None, None).unwrap();
        assert_eq!(q.order.sort, SortDirection::Asc);
        let (page, _) = q.apply(vec![b, a]);
        assert_eq!(page.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 2]);
    }
}
