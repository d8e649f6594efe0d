//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Raw pagination query parameters.
///
/// Kept as strings so a malformed value degrades to the default instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PaginationParams {
    pub fn to_request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.per_page.as_deref())
    }
}

/// Validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE_NUMBER,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Page below 1 becomes 1, page size is kept within `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(DEFAULT_PAGE_NUMBER),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Non-integer or non-positive pages resolve to the first page.
    pub fn parse(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p as u64)
            .unwrap_or(DEFAULT_PAGE_NUMBER);
        let per_page = per_page
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self::new(page, per_page)
    }

    /// Clamp to the last existing page; an empty set has one empty page.
    pub fn resolve(&self, total: u64) -> Self {
        let last = total_pages(total, self.per_page);
        Self {
            page: self.page.min(last),
            per_page: self.per_page,
        }
    }

    /// Calculate offset for database query
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.per_page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }
}

/// Number of pages, never below one: an empty set is a single empty page.
fn total_pages(total: u64, per_page: u64) -> u64 {
    total.div_ceil(per_page.max(1)).max(1)
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    /// Create new paginated response
    pub fn new(data: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
                total_pages: total_pages(total, per_page),
            },
        }
    }

    /// Slice an already filtered and ordered collection.
    pub fn from_items(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let page = request.resolve(total);
        let data = items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Self::new(data, page.page, page.per_page, total)
    }

    /// Convert every item, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
