pub mod error;
pub mod filter_order;
pub mod form_query;
pub mod response_filter;
pub mod types;

pub use error::FilterError;
pub use filter_order::{FilterOrder, FilterOrderInfo, FormSortField, ResponseSortField};
pub use form_query::{FormQuery, FormScope};
pub use response_filter::{FieldCondition, FieldFilter, ResponseQuery};
pub use types::{Page, SortDirection};
