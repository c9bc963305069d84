//! Order repository facade

use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;

use super::model::{NewOrder, Order, OrderStatus, OrderUpdate};
use crate::config::Config;
use crate::query::{
    build_count, build_find, build_find_one, insert_returning_id, insert_rows, BuiltQuery,
    FilterCriteria, Fragment, Materializer, QueryShape, SqlValue, TransactionalWriter, UpdateSet,
};
use crate::repository::{
    Repository, RepositoryError, RepositoryOperation, RepositoryResult, WriteStep,
};

const ENTITY: &str = "Order";

/// How orders are selected, filtered and sorted
///
/// Each row is one order with its line items aggregated under `products`
/// and `total_paid` summed from the line-item snapshots.
pub const ORDER_SHAPE: QueryShape = QueryShape {
    entity: ENTITY,
    select: r#"SELECT o.id, o.user_id, o.address, o.contact, o.transfer_slip, o.status, COALESCE((SELECT json_agg(json_build_object('id', po.id, 'qty', po.qty, 'product', po.product) ORDER BY length(po.id), po.id) FROM products_orders po WHERE po.order_id = o.id), '[]'::json) AS products, COALESCE((SELECT SUM((po.product->>'price')::FLOAT8 * po.qty) FROM products_orders po WHERE po.order_id = o.id), 0)::FLOAT8 AS total_paid, o.created_at, o.updated_at FROM orders o WHERE 1 = 1"#,
    count: "SELECT COUNT(*) FROM orders o WHERE 1 = 1",
    id_column: "o.id",
    search_columns: &["o.user_id", "o.address", "o.contact"],
    status_column: Some("o.status"),
    category_predicate: None,
    created_at_column: "o.created_at",
    sort_columns: &[
        ("id", "o.id"),
        ("created_at", "o.created_at"),
        ("updated_at", "o.updated_at"),
        ("status", "o.status"),
        ("user_id", "o.user_id"),
    ],
};

/// Orders with their line items
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
    reader: Materializer,
    write_timeout: Duration,
}

impl OrderRepository {
    pub fn new(pool: PgPool, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            reader: Materializer::new(pool.clone(), read_timeout),
            pool,
            write_timeout,
        }
    }

    pub fn from_config(pool: PgPool, config: &Config) -> Self {
        Self::new(pool, config.query.read_timeout(), config.query.write_timeout())
    }
}

impl Repository<Order, NewOrder, OrderUpdate> for OrderRepository {
    async fn find_one(&self, id: &str) -> RepositoryResult<Order> {
        let query = build_find_one(id, &ORDER_SHAPE);
        self.reader
            .fetch_one(RepositoryOperation::FindOne, &query)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    async fn find_many(&self, criteria: &FilterCriteria) -> RepositoryResult<(Vec<Order>, u64)> {
        let find = build_find(criteria, &ORDER_SHAPE)?;
        let count = build_count(criteria, &ORDER_SHAPE)?;
        futures::try_join!(
            self.reader.fetch_many(RepositoryOperation::FindMany, &find),
            self.reader.fetch_count(&count),
        )
    }

    async fn insert(&self, data: NewOrder) -> RepositoryResult<Order> {
        data.validate()?;
        let operation = RepositoryOperation::Insert;

        let mut writer =
            TransactionalWriter::begin(&self.pool, operation, ENTITY, self.write_timeout).await?;
        let outcome = insert_steps(&mut writer, &data).await;
        let id = writer.finish(outcome).await?;

        self.find_one(&id).await.map_err(|e| e.with_operation(operation))
    }

    async fn update(&self, id: &str, patch: OrderUpdate) -> RepositoryResult<Order> {
        let operation = RepositoryOperation::Update;
        let statement = update_parent(operation, id, &patch)?;

        let mut writer =
            TransactionalWriter::begin(&self.pool, operation, ENTITY, self.write_timeout).await?;
        let outcome = writer
            .execute_existing(WriteStep::UpdateParent, &statement, id)
            .await;
        writer.finish(outcome).await?;

        self.find_one(id).await.map_err(|e| e.with_operation(operation))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Delete;

        let mut writer =
            TransactionalWriter::begin(&self.pool, operation, ENTITY, self.write_timeout).await?;
        let outcome = delete_steps(&mut writer, id).await;
        writer.finish(outcome).await
    }
}

/// orders -> products_orders
async fn insert_steps(
    writer: &mut TransactionalWriter,
    data: &NewOrder,
) -> RepositoryResult<String> {
    let operation = writer.operation();

    let parent = insert_returning_id(
        operation,
        "orders",
        &["user_id", "contact", "address", "transfer_slip", "status"],
        vec![
            data.user_id.as_str().into(),
            data.contact.as_str().into(),
            data.address.as_str().into(),
            to_json(operation, &data.transfer_slip)?,
            data.status.as_str().into(),
        ],
    )?;
    let id = writer.fetch_id(WriteStep::InsertParent, &parent).await?;

    let rows = data
        .items
        .iter()
        .map(|item| {
            Ok(vec![
                id.as_str().into(),
                item.qty.into(),
                to_json(operation, &item.product)?,
            ])
        })
        .collect::<RepositoryResult<Vec<Vec<SqlValue>>>>()?;
    let children = insert_rows(
        operation,
        "products_orders",
        &["order_id", "qty", "product"],
        rows,
    )?;
    writer.execute(WriteStep::InsertChildren, &children).await?;

    Ok(id)
}

/// products_orders -> orders
async fn delete_steps(writer: &mut TransactionalWriter, id: &str) -> RepositoryResult<()> {
    let children = BuiltQuery::from(Fragment::new(
        r#"DELETE FROM "products_orders" WHERE "order_id" = $?"#,
        vec![id.into()],
    ));
    writer.execute(WriteStep::DeleteChildren, &children).await?;

    let parent = BuiltQuery::from(Fragment::new(
        r#"DELETE FROM "orders" WHERE "id" = $?"#,
        vec![id.into()],
    ));
    writer
        .execute_existing(WriteStep::DeleteParent, &parent, id)
        .await?;
    Ok(())
}

fn update_parent(
    operation: RepositoryOperation,
    id: &str,
    patch: &OrderUpdate,
) -> RepositoryResult<BuiltQuery> {
    let transfer_slip = match &patch.transfer_slip {
        Some(slip) => Some(to_json(operation, slip)?),
        None => None,
    };
    Ok(UpdateSet::new("orders")
        .set("status", patch.status.map(OrderStatus::as_str))
        .set("transfer_slip", transfer_slip)
        .build("id", id))
}

fn to_json<T: Serialize>(operation: RepositoryOperation, value: &T) -> RepositoryResult<SqlValue> {
    serde_json::to_value(value).map(SqlValue::Json).map_err(|e| {
        RepositoryError::validation_failed(
            operation,
            format!("value is not representable as JSON: {e}"),
        )
    })
}
