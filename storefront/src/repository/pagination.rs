//! Ordering, pagination and paginated result types
//!
//! # Example
//!
//! ```rust
//! use storefront::repository::{OrderDirection, Page, Pagination};
//!
//! let window = Pagination::page(3, 5);
//! assert_eq!(window.offset, 10);
//!
//! let direction = OrderDirection::parse_or_default("sideways");
//! assert_eq!(direction, OrderDirection::Descending);
//!
//! let page = Page::new(vec!["a", "b"], 3, 5, 12);
//! assert_eq!(page.total_page, 3);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction for ordering results
///
/// Anything other than a case-insensitive `asc`/`desc` falls back to
/// [`OrderDirection::Descending`], which is also the default.
///
/// ```rust
/// use storefront::repository::OrderDirection;
///
/// assert_eq!(OrderDirection::parse_or_default("ASC").as_sql(), "ASC");
/// assert_eq!(OrderDirection::parse_or_default(" desc ").as_sql(), "DESC");
/// assert_eq!(OrderDirection::parse_or_default("; DROP TABLE").as_sql(), "DESC");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[default]
    Descending,
}

impl OrderDirection {
    /// Parse a user-supplied direction, falling back to descending
    pub fn parse_or_default(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("asc") {
            Self::Ascending
        } else {
            Self::Descending
        }
    }

    /// SQL keyword for this direction
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Offset/limit window derived from a 1-indexed page number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create pagination for a specific page number (1-indexed)
    ///
    /// Page `0` is treated as page `1`.
    ///
    /// ```rust
    /// use storefront::repository::Pagination;
    ///
    /// let page3 = Pagination::page(3, 20);
    /// assert_eq!(page3.offset, 40);
    /// assert_eq!(page3.limit, 20);
    /// ```
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }
}

/// One page of a filtered listing plus the totals needed to navigate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Requested page number (1-indexed)
    pub page: u64,
    /// Requested page size
    pub limit: u64,
    /// Total matching items across all pages
    pub total_item: u64,
    /// `ceil(total_item / limit)`
    pub total_page: u64,
    /// Items on this page
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap a data slice with its totals
    #[must_use]
    pub fn new(data: Vec<T>, page: u64, limit: u64, total_item: u64) -> Self {
        Self {
            page,
            limit,
            total_item,
            total_page: calculate_total_pages(total_item, limit),
            data,
        }
    }

    /// Whether a later page exists
    pub fn has_next(&self) -> bool {
        self.page < self.total_page
    }
}

/// Ceiling division; a zero page size yields zero pages
fn calculate_total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_direction_default_is_descending() {
        assert_eq!(OrderDirection::default(), OrderDirection::Descending);
        assert_eq!(OrderDirection::parse_or_default(""), OrderDirection::Descending);
        assert_eq!(OrderDirection::parse_or_default("aSc"), OrderDirection::Ascending);
    }

    #[test]
    fn test_order_direction_display() {
        assert_eq!(format!("{}", OrderDirection::Ascending), "asc");
        assert_eq!(format!("{}", OrderDirection::Descending), "desc");
    }

    #[test]
    fn test_pagination_offsets() {
        let window = Pagination::page(1, 5);
        assert_eq!((window.offset, window.limit), (0, 5));
        let window = Pagination::page(3, 5);
        assert_eq!((window.offset, window.limit), (10, 5));
        let window = Pagination::page(0, 5);
        assert_eq!((window.offset, window.limit), (0, 5));
    }

    #[test]
    fn test_page_totals() {
        let page: Page<u8> = Page::new(vec![], 4, 5, 12);
        assert_eq!(page.total_page, 3);
        assert!(!page.has_next());

        let exact: Page<u8> = Page::new(vec![], 1, 5, 10);
        assert_eq!(exact.total_page, 2);
        assert!(exact.has_next());

        let empty: Page<u8> = Page::new(vec![], 1, 5, 0);
        assert_eq!(empty.total_page, 0);
    }

    #[test]
    fn test_zero_limit_does_not_divide_by_zero() {
        let page: Page<u8> = Page::new(vec![], 1, 0, 7);
        assert_eq!(page.total_page, 0);
    }

    #[test]
    fn test_page_serializes_with_flat_field_names() {
        let page = Page::new(vec![1, 2], 1, 5, 2);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total_item"], 2);
        assert_eq!(json["total_page"], 1);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
