use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid sort field: {0}")]
    InvalidSortField(String),

    #[error("Invalid sort direction: {0}")]
    InvalidSortDirection(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(String),

    #[error("Invalid field filter: {0}")]
    InvalidFieldFilter(String),

    #[error("Unknown element in field filter: {0}")]
    UnknownElement(String),

    #[error("Invalid date in field filter: {0}")]
    InvalidDate(String),
}
