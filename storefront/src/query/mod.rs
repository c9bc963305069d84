//! Query construction, execution and transactional writes
//!
//! - [`ClauseAccumulator`] / [`Fragment`]: statement text plus bound values,
//!   with `$n` placeholders numbered on append
//! - [`build_find`] / [`build_count`]: the fixed filter/sort/paginate pipeline
//!   over a per-domain [`QueryShape`]
//! - [`Materializer`]: runs reads and decodes nested JSON aggregates
//! - [`TransactionalWriter`], [`insert_rows`], [`UpdateSet`]: the write side

mod accumulator;
mod criteria;
mod filter;
mod materialize;
mod write;

use std::future::Future;
use std::time::Duration;

use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

pub use accumulator::{BuiltQuery, ClauseAccumulator, Fragment, SqlValue, MARKER};
pub use criteria::{FilterCriteria, DATE_FORMAT};
pub use filter::{
    build_count, build_find, build_find_one, category_clause, close_clause, date_range_clause,
    paginate_clause, search_clause, sort_clause, status_clause, ClauseStep, QueryShape,
    COUNT_STEPS, FIND_STEPS,
};
pub use materialize::{decode, Materializer};
pub use write::{insert_returning_id, insert_rows, TransactionalWriter, UpdateSet};

/// Run `future` under `limit`, mapping expiry to a timeout error
pub(crate) async fn bounded<T, F>(
    operation: RepositoryOperation,
    limit: Duration,
    future: F,
) -> RepositoryResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    tokio::time::timeout(limit, future).await.map_err(|_| {
        RepositoryError::timeout(operation, format!("statement exceeded {}s", limit.as_secs_f64()))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;

    #[tokio::test]
    async fn test_bounded_maps_expiry_to_timeout() {
        let result: RepositoryResult<()> =
            bounded(RepositoryOperation::Insert, Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        let error = result.unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::Timeout);
        assert_eq!(error.operation, RepositoryOperation::Insert);
    }

    #[tokio::test]
    async fn test_bounded_passes_inner_result_through() {
        let result = bounded(RepositoryOperation::FindOne, Duration::from_secs(1), async {
            Err::<(), _>(RepositoryError::not_found("Order", "O1"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind, RepositoryErrorKind::NotFound);
    }
}
