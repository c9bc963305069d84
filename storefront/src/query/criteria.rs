//! Filter criteria for listing queries

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar-day format accepted for date-range bounds
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Immutable input to a single find/count build
///
/// Blank strings behave like absent values. Page size is expected to be
/// enforced by the caller; [`normalize`](Self::normalize) applies the usual
/// defaults for callers that want them.
///
/// ```rust
/// use storefront::query::FilterCriteria;
///
/// let criteria = FilterCriteria::new(2, 10)
///     .with_search("bangkok")
///     .with_status("paid")
///     .with_date_range("2024-01-01", "2024-01-31")
///     .sorted_by("created_at", "desc");
/// assert_eq!(criteria.page, 2);
/// assert_eq!(criteria.status.as_deref(), Some("paid"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Case-insensitive substring matched against the shape's text columns
    pub search: String,
    /// Exact, case-insensitive status
    pub status: Option<String>,
    /// Category id (products only)
    pub category_id: Option<i64>,
    /// Inclusive start day, `%Y-%m-%d`
    pub start_date: Option<String>,
    /// Inclusive end day, `%Y-%m-%d`
    pub end_date: Option<String>,
    /// Sort key; unknown keys fall back to the primary key
    pub order_by: String,
    /// `asc` or `desc`; anything else means `desc`
    pub sort: String,
    /// 1-indexed page number
    pub page: u64,
    /// Page size
    pub limit: u64,
}

impl FilterCriteria {
    /// Criteria for one page with no filters
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, order_by: impl Into<String>, sort: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self.sort = sort.into();
        self
    }

    /// Apply listing defaults: page below 1 becomes 1, page size below
    /// `min_page_size` becomes `min_page_size`
    ///
    /// ```rust
    /// use storefront::query::FilterCriteria;
    ///
    /// let criteria = FilterCriteria::new(0, 2).normalize(5);
    /// assert_eq!((criteria.page, criteria.limit), (1, 5));
    /// ```
    #[must_use]
    pub fn normalize(mut self, min_page_size: u64) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.max(min_page_size);
        self
    }

    /// Trimmed search term, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        non_blank(Some(&self.search))
    }

    /// Trimmed status, `None` when absent or blank
    pub fn status_value(&self) -> Option<&str> {
        non_blank(self.status.as_deref())
    }

    /// Parsed inclusive date range
    ///
    /// `Ok(None)` unless both bounds are present. A bound that does not parse,
    /// or a start after the end, is an error message for the caller to wrap.
    pub fn date_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, String> {
        let (Some(start), Some(end)) = (
            non_blank(self.start_date.as_deref()),
            non_blank(self.end_date.as_deref()),
        ) else {
            return Ok(None);
        };

        let start = parse_day(start)?;
        let end = parse_day(end)?;
        if start > end {
            return Err(format!("start date {start} is after end date {end}"));
        }
        Ok(Some((start, end)))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| format!("invalid date {raw:?}, expected YYYY-MM-DD: {e}"))
}
