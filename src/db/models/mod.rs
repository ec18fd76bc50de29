use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub mod transaction;
pub mod user;

#[inline]
const fn default_page() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

impl Pagination {
    /// Clamped `(limit, offset)` pair for a `LIMIT .. OFFSET ..` query
    pub fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        let page = self.page.max(0);
        (limit, page.saturating_mul(limit))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            page: default_page(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_items: i64, page_size: i64, page: i64) -> Self {
        let total_pages = (total_items + page_size - 1) / page_size;
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination { limit: 10, page: 3 };
        assert_eq!(p.bounds(), (10, 30));

        let p = Pagination { limit: 0, page: -2 };
        assert_eq!(p.bounds(), (1, 0));

        let p = Pagination { limit: 10_000, page: 1 };
        assert_eq!(p.bounds(), (MAX_PAGE_SIZE, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_pagination_bounds_saturate() {
        let p = Pagination {
            limit: MAX_PAGE_SIZE,
            page: i64::MAX,
        };
        assert_eq!(p.bounds(), (MAX_PAGE_SIZE, i64::MAX));
    }

    #[test]
    fn test_total_pages() {
        let r = PaginatedResponse::<()>::new(Vec::new(), 101, 50, 0);
        assert_eq!(r.total_pages, 3);

        let r = PaginatedResponse::<()>::new(Vec::new(), 0, 50, 0);
        assert_eq!(r.total_pages, 0);
    }
}
