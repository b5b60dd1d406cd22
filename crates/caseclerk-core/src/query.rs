//! # Query Module
//!
//! Paging and ordering shared by every list operation.
//!
//! Pages start at 1. A page past the end is not an error: it comes back
//! empty with the real totals so clients can correct themselves.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{CoreError, CoreResult};

/// Items per page when the client does not ask.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Upper bound on the page size a client may request.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> CoreResult<Option<Self>> {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") => Ok(None),
            Some("asc") | Some("ascending") => Ok(Some(Self::Asc)),
            Some("desc") | Some("descending") => Ok(Some(Self::Desc)),
            Some(other) => Err(CoreError::validation(
                "order",
                format!("expected 'asc' or 'desc', got '{}'", other),
            )),
        }
    }

    /// Flips an ascending comparison when the order is descending.
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Paging and sorting requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: u64,
    pub limit: u64,
    pub sort_by: Option<String>,
    /// `None` lets each list pick its natural order.
    pub order: Option<SortOrder>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort_by: None,
            order: None,
        }
    }
}

impl ListParams {
    /// Validates raw query values.
    pub fn new(
        page: Option<u64>,
        limit: Option<u64>,
        sort_by: Option<String>,
        order: Option<&str>,
    ) -> CoreResult<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(CoreError::validation("page", "pages start at 1"));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(CoreError::validation(
                "limit",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        Ok(Self {
            page,
            limit,
            sort_by,
            order: SortOrder::parse(order)?,
        })
    }

    pub fn order_or(&self, fallback: SortOrder) -> SortOrder {
        self.order.unwrap_or(fallback)
    }

    /// Cuts one page out of an already filtered and sorted list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let offset = (self.page - 1).saturating_mul(self.limit);
        let items: Vec<T> = items
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX))
            .collect();
        Page {
            pagination: Pagination::new(self.page, self.limit, total),
            items,
        }
    }
}

/// Navigation data returned with every list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = total.div_ceil(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1 && total > 0,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
