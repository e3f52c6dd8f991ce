use uuid::Uuid;

use super::filter_order::{FilterOrderInfo, FormSortField};
use super::types::Page;

/// Which slice of the caller's forms a listing returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormScope {
    /// Forms the caller holds VIEW, EDIT and DELETE on.
    Owned {
        folder_id: Option<Uuid>,
        /// `None` lists personal forms only.
        team_id: Option<Uuid>,
        deleted: bool,
        favourite: bool,
    },
    /// Live forms the caller can view but not delete.
    Shared,
}

#[derive(Debug, Clone)]
pub struct FormQuery {
    pub user_id: Uuid,
    pub scope: FormScope,
    pub search: Option<String>,
    pub order: FilterOrderInfo<FormSortField>,
    pub page: Page,
}

impl FormQuery {
    /// Title variants matched as substrings: as typed, Capitalized, UPPER, lower.
    pub fn title_variants(&self) -> Vec<String> {
        match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => title_variants(search),
            _ => Vec::new(),
        }
    }

    pub fn title_matches(&self, title: &str) -> bool {
        let variants = self.title_variants();
        variants.is_empty() || variants.iter().any(|v| title.contains(v.as_str()))
    }
}

pub fn title_variants(search: &str) -> Vec<String> {
    let mut chars = search.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    };
    let variants = [
        search.to_string(),
        capitalized,
        search.to_uppercase(),
        search.to_lowercase(),
    ];
    let mut unique = Vec::with_capacity(variants.len());
    for v in variants {
        if !unique.contains(&v) {
            unique.push(v);
        }
    }
    unique
}

/// Escapes LIKE wildcards so a search term matches literally.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_order::FilterOrder;

    #[test]
    fn variants_cover_four_casings() {
        assert_eq!(
            title_variants("cUstomer"),
            vec!["cUstomer", "Customer", "CUSTOMER", "customer"]
        );
        assert_eq!(title_variants("abc"), vec!["abc", "Abc", "ABC"]);
    }

    #[test]
    fn title_matching_is_variant_based() {
        let query = FormQuery {
            user_id: Uuid::new_v4(),
            scope: FormScope::Shared,
            search: Some("survey".into()),
            order: FilterOrder::forms(None, None).unwrap(),
            page: Page { page: 1, page_size: 10 },
        };
        assert!(query.title_matches("Survey 2024"));
        assert!(query.title_matches("customer SURVEY"));
        assert!(!query.title_matches("sUrvey"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
