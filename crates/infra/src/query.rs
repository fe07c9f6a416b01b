//! Pagination and search filters for order listings.
//!
//! A filter never becomes SQL text directly: it compiles into structured
//! [`Condition`]s, which each store renders in its own way (bound parameters
//! for Postgres, direct evaluation for the in-memory store).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult};
use orderdesk_sales::OrderHeader;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 5;
/// Upper bound on page size.
pub const MAX_LIMIT: u32 = 1000;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Both `page` and `limit` must be at least 1. `limit` is capped at
    /// [`MAX_LIMIT`].
    pub fn new(page: u32, limit: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if limit == 0 {
            return Err(DomainError::validation("limit must be at least 1"));
        }
        Ok(Self {
            page,
            limit: limit.min(MAX_LIMIT),
        })
    }

    /// Build from optional query parameters, falling back to the defaults.
    pub fn from_query(page: Option<u32>, limit: Option<u32>) -> DomainResult<Self> {
        Self::new(
            page.unwrap_or(DEFAULT_PAGE),
            limit.unwrap_or(DEFAULT_LIMIT),
        )
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Zero-based number of rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `ceil(total / limit)`.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

/// One page of results plus what a caller needs to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    /// Number of rows matching the query across all pages.
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        Self {
            items,
            page: pagination.page(),
            limit: pagination.limit(),
            total,
            total_pages: pagination.total_pages(total),
        }
    }
}

/// Search criteria. Each field is optional and independent of the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    /// Case-insensitive substring of the order number or the customer.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Calendar day of the order date; time of day is ignored.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl OrderFilter {
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Compile into the conditions a matching order must satisfy (all of them).
    ///
    /// A blank keyword is treated as absent.
    pub fn conditions(&self) -> Vec<Condition> {
        let mut conditions = Vec::with_capacity(2);

        if let Some(keyword) = self.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                conditions.push(Condition::NumberOrCustomerContains(keyword.to_string()));
            }
        }

        if let Some(date) = self.date {
            conditions.push(Condition::OnDay(date));
        }

        conditions
    }

    pub fn matches(&self, header: &OrderHeader) -> bool {
        self.conditions().iter().all(|c| c.matches(header))
    }
}

/// A single search predicate over the order header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    NumberOrCustomerContains(String),
    OnDay(NaiveDate),
}

impl Condition {
    pub fn matches(&self, header: &OrderHeader) -> bool {
        match self {
            Condition::NumberOrCustomerContains(keyword) => {
                let needle = keyword.to_lowercase();
                header.number.to_lowercase().contains(&needle)
                    || header.customer.to_lowercase().contains(&needle)
            }
            Condition::OnDay(day) => header.date.date() == *day,
        }
    }
}

/// `%keyword%` with LIKE wildcards in the keyword escaped (backslash escape).
pub fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
