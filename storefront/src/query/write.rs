//! Transactional multi-statement writes
//!
//! A [`TransactionalWriter`] owns one transaction for one facade operation.
//! Every statement runs against it under the write timeout, and
//! [`finish`](TransactionalWriter::finish) either commits or rolls back as a
//! whole. A writer dropped before `finish` (timeout, cancelled task) rolls
//! back when its transaction is dropped.
//!
//! ```rust,ignore
//! let mut writer = TransactionalWriter::begin(&pool, RepositoryOperation::Insert, "Order", timeout).await?;
//! let outcome = insert_steps(&mut writer, &order).await;
//! let id = writer.finish(outcome).await?;
//! ```

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;

use super::accumulator::{BuiltQuery, ClauseAccumulator, Fragment, SqlValue};
use super::bounded;
use super::materialize::encode;
use crate::repository::{
    RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult, WriteStep,
};

/// One transaction scoped to one write operation
pub struct TransactionalWriter {
    tx: Transaction<'static, Postgres>,
    operation: RepositoryOperation,
    entity: &'static str,
    timeout: Duration,
}

impl TransactionalWriter {
    /// Open a transaction
    pub async fn begin(
        pool: &PgPool,
        operation: RepositoryOperation,
        entity: &'static str,
        timeout: Duration,
    ) -> RepositoryResult<Self> {
        let tx = bounded(operation, timeout, async {
            pool.begin()
                .await
                .map_err(|e| RepositoryError::from_sqlx(operation, WriteStep::Begin, e))
        })
        .await
        .map_err(|e| e.with_step(WriteStep::Begin))?;

        Ok(Self {
            tx,
            operation,
            entity,
            timeout,
        })
    }

    /// Operation this writer belongs to
    pub fn operation(&self) -> RepositoryOperation {
        self.operation
    }

    /// Run a statement, returning the number of affected rows
    pub async fn execute(&mut self, step: WriteStep, query: &BuiltQuery) -> RepositoryResult<u64> {
        let operation = self.operation;
        let arguments = encode(operation, query).map_err(|e| e.with_step(step))?;
        let tx = &mut self.tx;

        let result = bounded(operation, self.timeout, async move {
            sqlx::query_with(query.sql(), arguments)
                .execute(&mut **tx)
                .await
                .map_err(|e| RepositoryError::from_sqlx(operation, step, e))
        })
        .await
        .map_err(|e| e.with_step(step))?;

        tracing::debug!(
            entity = self.entity,
            %operation,
            %step,
            rows = result.rows_affected(),
            "executed write statement"
        );
        Ok(result.rows_affected())
    }

    /// Run a statement that must touch at least one row of `id`
    pub async fn execute_existing(
        &mut self,
        step: WriteStep,
        query: &BuiltQuery,
        id: &str,
    ) -> RepositoryResult<u64> {
        let rows = self.execute(step, query).await?;
        if rows == 0 {
            return Err(RepositoryError::not_found(self.entity, id)
                .with_operation(self.operation)
                .with_step(step));
        }
        Ok(rows)
    }

    /// Run an `INSERT ... RETURNING "id"` and capture the generated id
    pub async fn fetch_id(
        &mut self,
        step: WriteStep,
        query: &BuiltQuery,
    ) -> RepositoryResult<String> {
        let operation = self.operation;
        let arguments = encode(operation, query).map_err(|e| e.with_step(step))?;
        let tx = &mut self.tx;

        bounded(operation, self.timeout, async move {
            sqlx::query_scalar_with::<_, String, _>(query.sql(), arguments)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| RepositoryError::from_sqlx(operation, step, e))
        })
        .await
        .map_err(|e| e.with_step(step))
    }

    /// Read rows inside the transaction
    pub async fn fetch_rows<T>(
        &mut self,
        step: WriteStep,
        query: &BuiltQuery,
    ) -> RepositoryResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let operation = self.operation;
        let arguments = encode(operation, query).map_err(|e| e.with_step(step))?;
        let tx = &mut self.tx;

        bounded(operation, self.timeout, async move {
            sqlx::query_as_with::<_, T, _>(query.sql(), arguments)
                .fetch_all(&mut **tx)
                .await
                .map_err(|e| RepositoryError::from_sqlx(operation, step, e))
        })
        .await
        .map_err(|e| e.with_step(step))
    }

    /// Commit on success, roll back on failure, and pass the outcome through
    pub async fn finish<T>(self, outcome: RepositoryResult<T>) -> RepositoryResult<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(cause) => {
                self.rollback(&cause).await;
                Err(cause)
            }
        }
    }

    /// A timeout here does not mean the write was discarded: the server may
    /// have applied the COMMIT before the deadline fired. Such errors say so
    /// in their message, and callers should re-read before retrying.
    async fn commit(self) -> RepositoryResult<()> {
        let Self {
            tx,
            operation,
            entity,
            timeout,
        } = self;

        bounded(operation, timeout, async {
            tx.commit()
                .await
                .map_err(|e| RepositoryError::from_sqlx(operation, WriteStep::Commit, e))
        })
        .await
        .map_err(|e| commit_failure(e.with_step(WriteStep::Commit)))?;

        tracing::info!(entity, %operation, "write committed");
        Ok(())
    }

    async fn rollback(self, cause: &RepositoryError) {
        let entity = self.entity;
        let operation = self.operation;
        tracing::warn!(entity, %operation, error = %cause, "rolling back write");

        if let Err(e) = self.tx.rollback().await {
            // The connection is discarded by the pool; nothing was committed.
            tracing::error!(entity, %operation, error = %e, "rollback failed");
        }
    }
}

fn commit_failure(mut error: RepositoryError) -> RepositoryError {
    if error.kind == RepositoryErrorKind::Timeout {
        error.message = format!("{}; commit outcome unknown", error.message);
    }
    error
}

/// Multi-row `INSERT` with one placeholder group per row
///
/// ```rust
/// use storefront::query::insert_rows;
/// use storefront::repository::RepositoryOperation;
///
/// let query = insert_rows(
///     RepositoryOperation::Insert,
///     "images",
///     &["filename", "url", "product_id"],
///     vec![
///         vec!["a.png".into(), "/a.png".into(), "P000001".into()],
///         vec!["b.png".into(), "/b.png".into(), "P000001".into()],
///     ],
/// )
/// .unwrap();
/// assert_eq!(
///     query.sql(),
///     r#"INSERT INTO "images" ("filename", "url", "product_id") VALUES ($1, $2, $3), ($4, $5, $6)"#
/// );
/// ```
pub fn insert_rows(
    operation: RepositoryOperation,
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<SqlValue>>,
) -> RepositoryResult<BuiltQuery> {
    Ok(insert_head(operation, table, columns, rows)?.finish())
}

/// Single-row `INSERT ... RETURNING "id"`
pub fn insert_returning_id(
    operation: RepositoryOperation,
    table: &str,
    columns: &[&str],
    row: Vec<SqlValue>,
) -> RepositoryResult<BuiltQuery> {
    Ok(insert_head(operation, table, columns, vec![row])?
        .push_sql(r#" RETURNING "id""#)
        .finish())
}

fn insert_head(
    operation: RepositoryOperation,
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<SqlValue>>,
) -> RepositoryResult<ClauseAccumulator> {
    if rows.is_empty() {
        return Err(RepositoryError::validation_failed(
            operation,
            format!("no rows to insert into {table}"),
        ));
    }

    let column_list = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let group = format!("({})", vec!["$?"; columns.len()].join(", "));

    let mut acc = ClauseAccumulator::new(&format!(
        "INSERT INTO \"{table}\" ({column_list}) VALUES "
    ));
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != columns.len() {
            return Err(RepositoryError::validation_failed(
                operation,
                format!(
                    "row {i} for {table} has {} values, expected {}",
                    row.len(),
                    columns.len()
                ),
            ));
        }
        if i > 0 {
            acc = acc.push_sql(", ");
        }
        acc = acc.append(Fragment::new(group.clone(), row));
    }
    Ok(acc)
}

/// Dynamic `UPDATE ... SET` over the columns that are present
///
/// `"updated_at" = now()` is always set, so the statement is valid with no
/// present column and its affected-row count doubles as an existence check.
///
/// ```rust
/// use storefront::query::UpdateSet;
///
/// let query = UpdateSet::new("products")
///     .set("title", None::<String>)
///     .set("price", Some(150.0))
///     .build("id", "P000001");
/// assert_eq!(
///     query.sql(),
///     r#"UPDATE "products" SET "price" = $1, "updated_at" = now() WHERE "id" = $2"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct UpdateSet {
    table: &'static str,
    assignments: Vec<(&'static str, SqlValue)>,
}

impl UpdateSet {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
        }
    }

    /// Assign `column` when `value` is present
    #[must_use]
    pub fn set<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.assignments.push((column, value.into()));
        }
        self
    }

    /// Columns that will be assigned, besides `updated_at`
    pub fn columns(&self) -> Vec<&'static str> {
        self.assignments.iter().map(|(column, _)| *column).collect()
    }

    pub fn build(self, id_column: &str, id: &str) -> BuiltQuery {
        let mut acc = ClauseAccumulator::new(&format!("UPDATE \"{}\" SET ", self.table));
        for (column, value) in self.assignments {
            acc = acc.append(Fragment::new(format!("\"{column}\" = $?, "), vec![value]));
        }
        acc.push_sql("\"updated_at\" = now()")
            .append(Fragment::new(
                format!(" WHERE \"{id_column}\" = $?"),
                vec![id.into()],
            ))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_timeout_reports_unknown_outcome() {
        let timed_out = commit_failure(
            RepositoryError::timeout(RepositoryOperation::Insert, "deadline exceeded")
                .with_step(WriteStep::Commit),
        );
        assert_eq!(timed_out.kind, RepositoryErrorKind::Timeout);
        assert!(timed_out.message.ends_with("commit outcome unknown"));

        let refused = commit_failure(RepositoryError::database_error(
            RepositoryOperation::Insert,
            "serialization failure",
        ));
        assert_eq!(refused.message, "serialization failure");
    }

    #[test]
    fn test_insert_returning_id() {
        let query = insert_returning_id(
            RepositoryOperation::Insert,
            "orders",
            &["user_id", "contact", "address", "transfer_slip", "status"],
            vec![
                "U000001".into(),
                "081".into(),
                "Bangkok".into(),
                serde_json::Value::Null.into(),
                "waiting".into(),
            ],
        )
        .unwrap();
        assert_eq!(
            query.sql(),
            r#"INSERT INTO "orders" ("user_id", "contact", "address", "transfer_slip", "status") VALUES ($1, $2, $3, $4, $5) RETURNING "id""#
        );
        assert_eq!(query.values().len(), 5);
    }

    #[test]
    fn test_bulk_insert_groups_are_contiguous() {
        let rows = (0..3_i64)
            .map(|qty| vec!["O1".into(), qty.into()])
            .collect();
        let query =
            insert_rows(RepositoryOperation::Insert, "products_orders", &["order_id", "qty"], rows)
                .unwrap();
        assert!(query.sql().ends_with("VALUES ($1, $2), ($3, $4), ($5, $6)"));
        assert_eq!(query.values().len(), 6);
    }

    #[test]
    fn test_bulk_insert_rejects_empty_and_ragged_rows() {
        let empty =
            insert_rows(RepositoryOperation::Insert, "images", &["url"], vec![]).unwrap_err();
        assert_eq!(empty.kind, RepositoryErrorKind::ValidationFailed);

        let ragged = insert_rows(
            RepositoryOperation::Update,
            "images",
            &["filename", "url"],
            vec![vec!["a.png".into()]],
        )
        .unwrap_err();
        assert_eq!(ragged.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(ragged.operation, RepositoryOperation::Update);
    }

    #[test]
    fn test_update_set_applies_only_present_fields() {
        let update = UpdateSet::new("products")
            .set("title", None::<String>)
            .set("description", Some(""))
            .set("price", Some(0.0));
        assert_eq!(update.columns(), vec!["description", "price"]);

        let query = update.build("id", "P1");
        assert_eq!(
            query.sql(),
            r#"UPDATE "products" SET "description" = $1, "price" = $2, "updated_at" = now() WHERE "id" = $3"#
        );
        assert_eq!(query.values()[1], SqlValue::Float(0.0));
    }

    #[test]
    fn test_update_set_with_nothing_present_still_touches_updated_at() {
        let query = UpdateSet::new("orders").build("id", "O1");
        assert_eq!(
            query.sql(),
            r#"UPDATE "orders" SET "updated_at" = now() WHERE "id" = $1"#
        );
    }
}
