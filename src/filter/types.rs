use serde::{Deserialize, Serialize};

use super::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(value: &str) -> Result<Self, FilterError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidSortDirection(other.to_string())),
        }
    }

    /// Applies this direction to an ascending comparison.
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Page request after validation. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32, max_size: u32) -> Result<Self, FilterError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(FilterError::InvalidPage("page starts at 1".to_string()));
        }
        let page_size = page_size.unwrap_or(default_size);
        if page_size == 0 || page_size > max_size {
            return Err(FilterError::InvalidPageSize(format!(
                "page size must be between 1 and {}",
                max_size
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size as u64)
    }

    /// Slices an already filtered and sorted collection.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit() as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_total_pages() {
        let page = Page::new(Some(3), Some(10), 10, 100).unwrap();
        assert_eq!(page.offset(), 20);
        assert_eq!(page.total_pages(21), 3);
        assert_eq!(page.total_pages(20), 2);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn rejects_out_of_range_pages() {
        assert!(matches!(Page::new(Some(0), None, 10, 100), Err(FilterError::InvalidPage(_))));
        assert!(matches!(Page::new(None, Some(0), 10, 100), Err(FilterError::InvalidPageSize(_))));
        assert!(matches!(Page::new(None, Some(101), 10, 100), Err(FilterError::InvalidPageSize(_))));
        assert_eq!(Page::new(None, None, 10, 100).unwrap(), Page { page: 1, page_size: 10 });
    }

    #[test]
    fn slice_takes_requested_window() {
        let page = Page::new(Some(2), Some(3), 10, 100).unwrap();
        assert_eq!(page.slice((1..=10).collect()), vec![4, 5, 6]);
    }

    #[test]
    fn direction_parse_is_case_insensitive() {
        assert_eq!(SortDirection::parse("DESC").unwrap(), SortDirection::Desc);
        assert!(SortDirection::parse("down").is_err());
    }
}
