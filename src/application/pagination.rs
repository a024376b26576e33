//! Shared offset pagination helpers.

use thiserror::Error;

use crate::domain::types::SortOrder;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page numbers start at 1, got {0}")]
    InvalidPage(u32),
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidPageSize(u32),
}

/// Page selection for a listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
    pub order: SortOrder,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            order: SortOrder::Desc,
        }
    }
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32, order: SortOrder) -> Self {
        Self {
            page,
            page_size,
            order,
        }
    }

    pub fn validate(&self) -> Result<(), PaginationError> {
        if self.page == 0 {
            return Err(PaginationError::InvalidPage(self.page));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(PaginationError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }

    /// Number of items preceding this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }
}

/// One page of a filtered, ordered result set.
///
/// `total_pages` is always `ceil(total_items / page_size)` and `items` never
/// holds more than `page_size` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub order: SortOrder,
}

impl<T> PaginatedResult<T> {
    pub fn new(mut items: Vec<T>, query: PageQuery, total_items: u64) -> Self {
        items.truncate(query.page_size as usize);
        Self {
            items,
            page: query.page,
            page_size: query.page_size,
            total_items,
            total_pages: total_pages(total_items, query.page_size),
            order: query.order,
        }
    }

    pub fn empty(query: PageQuery) -> Self {
        Self::new(Vec::new(), query, 0)
    }

    pub fn query(&self) -> PageQuery {
        PageQuery::new(self.page, self.page_size, self.order)
    }

    /// Whether the page-count and page-size invariants hold.
    pub fn is_consistent(&self) -> bool {
        self.items.len() <= self.page_size as usize
            && self.total_pages == total_pages(self.total_items, self.page_size)
    }
}

pub fn total_pages(total_items: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn new_truncates_to_page_size() {
        let page = PaginatedResult::new(vec![1, 2, 3], PageQuery::new(1, 2, SortOrder::Asc), 3);
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total_pages, 2);
        assert!(page.is_consistent());
    }

    #[test]
    fn inconsistent_totals_are_detected() {
        let mut page = PaginatedResult::new(vec![1], PageQuery::new(1, 10, SortOrder::Desc), 1);
        page.total_pages = 4;
        assert!(!page.is_consistent());
    }

    #[test]
    fn validate_rejects_page_zero_and_oversized_pages() {
        assert_eq!(
            PageQuery::new(0, 10, SortOrder::Desc).validate(),
            Err(PaginationError::InvalidPage(0))
        );
        assert_eq!(
            PageQuery::new(1, MAX_PAGE_SIZE + 1, SortOrder::Desc).validate(),
            Err(PaginationError::InvalidPageSize(MAX_PAGE_SIZE + 1))
        );
        assert!(PageQuery::default().validate().is_ok());
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PageQuery::new(3, 10, SortOrder::Asc).offset(), 20);
        assert_eq!(PageQuery::new(1, 10, SortOrder::Asc).offset(), 0);
    }
}
