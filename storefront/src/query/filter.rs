//! Find and count query construction
//!
//! Both variants run the same clause steps over a [`ClauseAccumulator`], so
//! the filter portion of a listing and of its total can never drift apart.
//! Each step is a pure function that either appends its clause or returns
//! the accumulator untouched.
//!
//! ```text
//! find:  search -> status -> category -> date range -> sort -> paginate -> close
//! count: search -> status -> category -> date range
//! ```

use chrono::Days;

use super::accumulator::{BuiltQuery, ClauseAccumulator, Fragment};
use super::criteria::FilterCriteria;
use crate::repository::{
    OrderDirection, Pagination, RepositoryError, RepositoryOperation, RepositoryResult,
};

/// Opens the aggregate wrapper around the per-row select
const FIND_OPEN: &str = r#"SELECT COALESCE(json_agg("t"), '[]'::json) FROM ("#;
/// Closes the aggregate wrapper
const FIND_CLOSE: &str = r#") AS "t""#;
/// Wraps a single-row select into one JSON object
const FIND_ONE_OPEN: &str = r#"SELECT to_jsonb("t") FROM ("#;

/// Per-domain constants describing how an aggregate is selected and filtered
#[derive(Debug, Clone, Copy)]
pub struct QueryShape {
    /// Entity name used in error context
    pub entity: &'static str,
    /// Per-row select producing the nested aggregate, ending in `WHERE 1 = 1`
    pub select: &'static str,
    /// Count statement over the same rows, ending in `WHERE 1 = 1`
    pub count: &'static str,
    /// Primary key column, also the fallback sort column
    pub id_column: &'static str,
    /// Text columns matched by the search clause
    pub search_columns: &'static [&'static str],
    /// Column compared by the status clause, if the entity has one
    pub status_column: Option<&'static str>,
    /// Predicate with one marker for the category id, if the entity has one
    pub category_predicate: Option<&'static str>,
    /// Creation timestamp column used by the date-range clause
    pub created_at_column: &'static str,
    /// Sort keys accepted from callers and the column each maps to
    pub sort_columns: &'static [(&'static str, &'static str)],
}

impl QueryShape {
    fn sort_column(&self, key: &str) -> &'static str {
        let key = key.trim();
        self.sort_columns
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map_or(self.id_column, |(_, column)| column)
    }
}

/// One stage of the pipeline
pub type ClauseStep =
    fn(ClauseAccumulator, &FilterCriteria, &QueryShape) -> RepositoryResult<ClauseAccumulator>;

/// Steps for the find variant, in their fixed order
pub const FIND_STEPS: &[ClauseStep] = &[
    search_clause,
    status_clause,
    category_clause,
    date_range_clause,
    sort_clause,
    paginate_clause,
    close_clause,
];

/// Steps for the count variant: the filters only
pub const COUNT_STEPS: &[ClauseStep] = &[
    search_clause,
    status_clause,
    category_clause,
    date_range_clause,
];

/// Build the aggregate listing query
///
/// ```rust
/// use storefront::orders::ORDER_SHAPE;
/// use storefront::query::{build_find, FilterCriteria};
///
/// let criteria = FilterCriteria::new(1, 5).with_status("paid");
/// let query = build_find(&criteria, &ORDER_SHAPE).unwrap();
/// assert!(query.sql().contains("LOWER(o.status) = $1"));
/// assert!(query.sql().contains("OFFSET $2 LIMIT $3"));
/// ```
pub fn build_find(criteria: &FilterCriteria, shape: &QueryShape) -> RepositoryResult<BuiltQuery> {
    let head = format!("{FIND_OPEN}{}", shape.select);
    run_steps(&head, FIND_STEPS, criteria, shape)
}

/// Build the total-count query for the same filters
pub fn build_count(criteria: &FilterCriteria, shape: &QueryShape) -> RepositoryResult<BuiltQuery> {
    run_steps(shape.count, COUNT_STEPS, criteria, shape)
        .map_err(|e| e.with_operation(RepositoryOperation::Count))
}

/// Build the single-aggregate lookup by primary key
pub fn build_find_one(id: &str, shape: &QueryShape) -> BuiltQuery {
    ClauseAccumulator::new(FIND_ONE_OPEN)
        .push_sql(shape.select)
        .append(Fragment::new(
            format!(" AND {} = $?", shape.id_column),
            vec![id.into()],
        ))
        .push_sql(FIND_CLOSE)
        .finish()
}

fn run_steps(
    head: &str,
    steps: &[ClauseStep],
    criteria: &FilterCriteria,
    shape: &QueryShape,
) -> RepositoryResult<BuiltQuery> {
    let mut acc = ClauseAccumulator::new(head);
    for step in steps {
        acc = step(acc, criteria, shape)?;
    }
    let query = acc.finish();
    tracing::debug!(
        entity = shape.entity,
        sql = query.sql(),
        bound = query.values().len(),
        "built filter query"
    );
    Ok(query)
}

/// Escape LIKE metacharacters so the term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `AND (LOWER(a) LIKE $n OR LOWER(b) LIKE $n+1 ...)`, one value per column
pub fn search_clause(
    acc: ClauseAccumulator,
    criteria: &FilterCriteria,
    shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    let Some(term) = criteria.search_term() else {
        return Ok(acc);
    };
    if shape.search_columns.is_empty() {
        return Ok(acc);
    }

    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    let predicates: Vec<String> = shape
        .search_columns
        .iter()
        .map(|column| format!(r"LOWER({column}) LIKE $? ESCAPE '\'"))
        .collect();
    let values = shape
        .search_columns
        .iter()
        .map(|_| pattern.as_str().into())
        .collect();

    Ok(acc.append(Fragment::new(
        format!(" AND ({})", predicates.join(" OR ")),
        values,
    )))
}

/// `AND LOWER(status) = $n`
pub fn status_clause(
    acc: ClauseAccumulator,
    criteria: &FilterCriteria,
    shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    match (criteria.status_value(), shape.status_column) {
        (Some(status), Some(column)) => Ok(acc.append(Fragment::new(
            format!(" AND LOWER({column}) = $?"),
            vec![status.to_lowercase().into()],
        ))),
        _ => Ok(acc),
    }
}

/// `AND <category predicate>` with one bound id
pub fn category_clause(
    acc: ClauseAccumulator,
    criteria: &FilterCriteria,
    shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    match (criteria.category_id, shape.category_predicate) {
        (Some(category_id), Some(predicate)) => Ok(acc.append(Fragment::new(
            format!(" AND {predicate}"),
            vec![category_id.into()],
        ))),
        _ => Ok(acc),
    }
}

/// `AND created >= $start AND created < $end + 1 day`
pub fn date_range_clause(
    acc: ClauseAccumulator,
    criteria: &FilterCriteria,
    shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    let range = criteria
        .date_range()
        .map_err(|message| {
            RepositoryError::validation_failed(RepositoryOperation::FindMany, message)
        })?;
    let Some((start, end)) = range else {
        return Ok(acc);
    };

    let end_exclusive = end.checked_add_days(Days::new(1)).ok_or_else(|| {
        RepositoryError::validation_failed(
            RepositoryOperation::FindMany,
            format!("end date {end} is out of range"),
        )
    })?;
    let column = shape.created_at_column;

    Ok(acc.append(Fragment::new(
        format!(" AND {column} >= $? AND {column} < $?"),
        vec![start.into(), end_exclusive.into()],
    )))
}

/// `ORDER BY <whitelisted column> <ASC|DESC>`; binds nothing
pub fn sort_clause(
    acc: ClauseAccumulator,
    criteria: &FilterCriteria,
    shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    let column = shape.sort_column(&criteria.order_by);
    let direction = OrderDirection::parse_or_default(&criteria.sort).as_sql();

    let clause = if column == shape.id_column {
        format!(" ORDER BY {column} {direction}")
    } else {
        // Tie-break on the key so pages are stable
        format!(" ORDER BY {column} {direction}, {} {direction}", shape.id_column)
    };
    Ok(acc.append(Fragment::raw(clause)))
}

/// `OFFSET $n LIMIT $m`
pub fn paginate_clause(
    acc: ClauseAccumulator,
    criteria: &FilterCriteria,
    _shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    let window = Pagination::page(criteria.page, criteria.limit);
    let to_bind = |value: u64| {
        i64::try_from(value).map_err(|_| {
            RepositoryError::validation_failed(
                RepositoryOperation::FindMany,
                format!("pagination value {value} is out of range"),
            )
        })
    };

    Ok(acc.append(Fragment::new(
        " OFFSET $? LIMIT $?",
        vec![to_bind(window.offset)?.into(), to_bind(window.limit)?.into()],
    )))
}

/// Closes the aggregate wrapper opened by [`build_find`]
pub fn close_clause(
    acc: ClauseAccumulator,
    _criteria: &FilterCriteria,
    _shape: &QueryShape,
) -> RepositoryResult<ClauseAccumulator> {
    Ok(acc.push_sql(FIND_CLOSE))
}
