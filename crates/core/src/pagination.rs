//! Page parameters and paginated responses.

use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Maximum page size.
pub const MAX_PER_PAGE: u32 = 100;

/// A 1-based page request.
///
/// Deserializes from query strings; missing or out-of-range values are
/// clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Page {
    /// Clamp to valid bounds.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// `LIMIT` value.
    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.normalized().per_page)
    }

    /// `OFFSET` value.
    #[must_use]
    pub fn offset(self) -> i64 {
        let p = self.normalized();
        i64::from(p.page - 1) * i64::from(p.per_page)
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    /// Wrap a page of items.
    #[must_use]
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        let page = page.normalized();
        let per_page = i64::from(page.per_page);
        Self {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
            total_pages: (total.max(0) + per_page - 1) / per_page,
        }
    }

    /// Convert every item.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let page = Page {
            page: 3,
            per_page: 10,
        };
        assert_eq!(page.limit(), 10);
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn test_clamping() {
        let page = Page {
            page: 0,
            per_page: 1000,
        };
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), 100);
    }

    #[test]
    fn test_defaults_from_empty_query() {
        let page: Page = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_total_pages() {
        let p = Paginated::new(vec![1, 2], Page::default(), 41);
        assert_eq!(p.total_pages, 3);
        assert_eq!(Paginated::<i32>::new(vec![], Page::default(), 0).total_pages, 0);
    }
}
