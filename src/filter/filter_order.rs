use super::error::FilterError;
use super::types::SortDirection;

/// Whitelisted sort columns for form listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSortField {
    Title,
    CreatedAt,
    UpdatedAt,
}

impl FormSortField {
    pub fn column(&self) -> &'static str {
        match self {
            FormSortField::Title => "title",
            FormSortField::CreatedAt => "created_at",
            FormSortField::UpdatedAt => "updated_at",
        }
    }
}

/// Whitelisted sort columns for response listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSortField {
    CreatedAt,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOrderInfo<F> {
    pub field: F,
    pub sort: SortDirection,
}

pub struct FilterOrder;

impl FilterOrder {
    /// Forms default to newest first.
    pub fn forms(field: Option<&str>, direction: Option<&str>) -> Result<FilterOrderInfo<FormSortField>, FilterError> {
        let field = match field.map(str::trim) {
            None | Some("") | Some("createdAt") => FormSortField::CreatedAt,
            Some("title") => FormSortField::Title,
            Some("updatedAt") => FormSortField::UpdatedAt,
            Some(other) => return Err(FilterError::InvalidSortField(other.to_string())),
        };
        let sort = Self::direction(direction, SortDirection::Desc)?;
        Ok(FilterOrderInfo { field, sort })
    }

    /// Responses default to submission order.
    pub fn responses(field: Option<&str>, direction: Option<&str>) -> Result<FilterOrderInfo<ResponseSortField>, FilterError> {
        let field = match field.map(str::trim) {
            None | Some("") | Some("createdAt") => ResponseSortField::CreatedAt,
            Some("index") => ResponseSortField::Index,
            Some(other) => return Err(FilterError::InvalidSortField(other.to_string())),
        };
        let sort = Self::direction(direction, SortDirection::Asc)?;
        Ok(FilterOrderInfo { field, sort })
    }

    fn direction(direction: Option<&str>, default: SortDirection) -> Result<SortDirection, FilterError> {
        match direction.map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) => SortDirection::parse(value),
        }
    }

    pub fn generate(info: &FilterOrderInfo<FormSortField>) -> String {
        format!("ORDER BY f.{} {}, f.id ASC", info.field.column(), info.sort.to_sql())
    }
}
