//! Clause accumulation with positional placeholder bookkeeping
//!
//! Fragments are written with `$?` markers. [`ClauseAccumulator::append`]
//! numbers each marker from the accumulator's running index, so callers never
//! compute `$n` by hand.

use chrono::NaiveDate;
use sqlx::postgres::PgArguments;
use sqlx::Arguments;

/// Marker replaced by the next `$n` placeholder on append
pub const MARKER: &str = "$?";

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Text value
    Text(String),
    /// 64-bit integer value
    Integer(i64),
    /// Double precision value
    Float(f64),
    /// Calendar date
    Date(NaiveDate),
    /// JSON document, bound as `jsonb`
    Json(serde_json::Value),
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// A clause template plus the values for its markers
///
/// ```rust
/// use storefront::query::{ClauseAccumulator, Fragment};
///
/// let query = ClauseAccumulator::new("SELECT * FROM orders o WHERE 1 = 1")
///     .append(Fragment::new(" AND o.user_id = $?", vec!["u1".into()]))
///     .append(Fragment::new(" AND o.status = $?", vec!["paid".into()]))
///     .finish();
/// assert_eq!(
///     query.sql(),
///     "SELECT * FROM orders o WHERE 1 = 1 AND o.user_id = $1 AND o.status = $2"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    template: String,
    values: Vec<SqlValue>,
}

impl Fragment {
    /// Create a fragment; the template must hold one marker per value
    pub fn new(template: impl Into<String>, values: Vec<SqlValue>) -> Self {
        let template = template.into();
        debug_assert_eq!(
            template.matches(MARKER).count(),
            values.len(),
            "fragment marker count must equal its value count: {template}"
        );
        Self { template, values }
    }

    /// A fragment that binds nothing
    pub fn raw(template: impl Into<String>) -> Self {
        Self::new(template, Vec::new())
    }

    /// Number of values this fragment binds
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether this fragment binds nothing
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Growing statement text plus its ordered bound values
///
/// The running placeholder index is always `values.len()`; it is never
/// stored separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseAccumulator {
    sql: String,
    values: Vec<SqlValue>,
}

impl ClauseAccumulator {
    /// Start from a statement head that binds nothing
    pub fn new(head: &str) -> Self {
        Self {
            sql: head.to_string(),
            values: Vec::new(),
        }
    }

    /// Index of the last placeholder emitted so far (0 when none)
    pub fn index(&self) -> usize {
        self.values.len()
    }

    /// Append a fragment, numbering its markers from `index() + 1`
    #[must_use]
    pub fn append(mut self, fragment: Fragment) -> Self {
        let Fragment { template, values } = fragment;
        let mut values = values.into_iter();
        let mut pieces = template.split(MARKER);

        if let Some(first) = pieces.next() {
            self.sql.push_str(first);
        }
        for piece in pieces {
            if let Some(value) = values.next() {
                self.values.push(value);
                self.sql.push('$');
                self.sql.push_str(&self.values.len().to_string());
            }
            self.sql.push_str(piece);
        }
        self
    }

    /// Append literal text
    #[must_use]
    pub fn push_sql(mut self, text: &str) -> Self {
        self.sql.push_str(text);
        self
    }

    /// Return to the zero state: empty text, no values, index 0
    pub fn reset(&mut self) {
        self.sql.clear();
        self.values.clear();
    }

    /// Current statement text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Values bound so far
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Freeze into an executable statement
    pub fn finish(self) -> BuiltQuery {
        BuiltQuery {
            sql: self.sql,
            values: self.values,
        }
    }
}

/// A finished statement ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    sql: String,
    values: Vec<SqlValue>,
}

impl BuiltQuery {
    /// Statement text with `$n` placeholders
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values, in placeholder order
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Encode the bound values as driver arguments
    pub fn arguments(&self) -> Result<PgArguments, sqlx::error::BoxDynError> {
        let mut arguments = PgArguments::default();
        for value in &self.values {
            match value {
                SqlValue::Text(text) => arguments.add(text.as_str())?,
                SqlValue::Integer(number) => arguments.add(*number)?,
                SqlValue::Float(number) => arguments.add(*number)?,
                SqlValue::Date(date) => arguments.add(*date)?,
                SqlValue::Json(document) => arguments.add(sqlx::types::Json(document))?,
            }
        }
        Ok(arguments)
    }
}

/// A whole statement written as one fragment
///
/// ```rust
/// use storefront::query::{BuiltQuery, Fragment};
///
/// let query = BuiltQuery::from(Fragment::new(
///     r#"DELETE FROM "images" WHERE "product_id" = $?"#,
///     vec!["P000001".into()],
/// ));
/// assert_eq!(query.sql(), r#"DELETE FROM "images" WHERE "product_id" = $1"#);
/// ```
impl From<Fragment> for BuiltQuery {
    fn from(fragment: Fragment) -> Self {
        ClauseAccumulator::default().append(fragment).finish()
    }
}
