//! Page arithmetic.

use super::pipeline::ListQuery;
use super::types::{PageDescriptor, Pagination};

/// Page used when `page` is absent or invalid.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when `limit` is absent or invalid.
pub const DEFAULT_LIMIT: u64 = 25;

/// Validated page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Parse raw `page` and `limit`. Anything that is not a positive
    /// integer falls back to the default instead of failing.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT),
        }
    }

    /// Index of the first record on this page.
    pub fn start_index(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Index one past the last record on this page.
    pub fn end_index(&self) -> u64 {
        self.page.saturating_mul(self.limit)
    }

    /// Adjacent page descriptors given the filtered total.
    pub fn pagination(&self, total: u64) -> Pagination {
        let next = (self.end_index() < total).then(|| PageDescriptor {
            page: self.page + 1,
            limit: self.limit,
        });
        let prev = (self.start_index() > 0).then(|| PageDescriptor {
            page: self.page - 1,
            limit: self.limit,
        });
        Pagination { next, prev }
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|n| *n >= 1)
}

/// Apply skip/limit for `page` and derive the descriptors from `total`,
/// the count of every record matching the filter.
pub fn paginate(query: ListQuery, page: PageRequest, total: u64) -> (ListQuery, Pagination) {
    let query = query.with_window(page.start_index(), page.limit);
    (query, page.pagination(total))
}
