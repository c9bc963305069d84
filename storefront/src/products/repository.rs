//! Product repository facade

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use super::model::{Image, NewImage, NewProduct, Product, ProductUpdate};
use crate::config::Config;
use crate::query::{
    build_count, build_find, build_find_one, insert_returning_id, insert_rows, BuiltQuery,
    FilterCriteria, Fragment, Materializer, QueryShape, SqlValue, TransactionalWriter, UpdateSet,
};
use crate::repository::{
    Repository, RepositoryError, RepositoryOperation, RepositoryResult, WriteStep,
};
use crate::storage::{destination, FileStorage};

const ENTITY: &str = "Product";

/// How products are selected, filtered and sorted
///
/// Each row is one product with its category object (or `null`) and its
/// image array (possibly empty).
pub const PRODUCT_SHAPE: QueryShape = QueryShape {
    entity: ENTITY,
    select: r#"SELECT p.id, p.title, p.description, p.price, (SELECT to_jsonb(ct) FROM (SELECT c.id, c.title FROM categories c JOIN products_categories pc ON pc.category_id = c.id WHERE pc.product_id = p.id) AS ct) AS category, COALESCE((SELECT json_agg(it ORDER BY length(it.id), it.id) FROM (SELECT i.id, i.filename, i.url FROM images i WHERE i.product_id = p.id) AS it), '[]'::json) AS images, p.created_at, p.updated_at FROM products p WHERE 1 = 1"#,
    count: "SELECT COUNT(*) FROM products p WHERE 1 = 1",
    id_column: "p.id",
    search_columns: &["p.title", "p.description"],
    status_column: None,
    category_predicate: Some(
        "EXISTS (SELECT 1 FROM products_categories pcf WHERE pcf.product_id = p.id AND pcf.category_id = $?)",
    ),
    created_at_column: "p.created_at",
    sort_columns: &[
        ("id", "p.id"),
        ("title", "p.title"),
        ("price", "p.price"),
        ("created_at", "p.created_at"),
        ("updated_at", "p.updated_at"),
    ],
};

/// Products with their category and images
///
/// Image rows are replaced inside the write transaction; their backing files
/// are removed through the [`FileStorage`] collaborator only after commit.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
    reader: Materializer,
    storage: Arc<dyn FileStorage>,
    write_timeout: Duration,
    image_prefix: String,
}

impl ProductRepository {
    pub fn new(
        pool: PgPool,
        storage: Arc<dyn FileStorage>,
        read_timeout: Duration,
        write_timeout: Duration,
        image_prefix: impl Into<String>,
    ) -> Self {
        Self {
            reader: Materializer::new(pool.clone(), read_timeout),
            pool,
            storage,
            write_timeout,
            image_prefix: image_prefix.into(),
        }
    }

    pub fn from_config(pool: PgPool, storage: Arc<dyn FileStorage>, config: &Config) -> Self {
        Self::new(
            pool,
            storage,
            config.query.read_timeout(),
            config.query.write_timeout(),
            config.storage.image_prefix.clone(),
        )
    }

    /// Remove backing files of images whose rows are already gone
    ///
    /// Failures are logged; the committed write stands.
    async fn remove_files(
        &self,
        operation: RepositoryOperation,
        product_id: &str,
        images: &[Image],
    ) {
        if images.is_empty() {
            return;
        }
        let destinations: Vec<String> = images
            .iter()
            .map(|image| destination(&self.image_prefix, &image.filename))
            .collect();

        if let Err(e) = self.storage.delete_files(&destinations).await {
            let error =
                RepositoryError::storage(operation, e.to_string()).with_entity(ENTITY, product_id);
            tracing::warn!(error = %error, "image files not removed after commit");
        }
    }
}

impl Repository<Product, NewProduct, ProductUpdate> for ProductRepository {
    async fn find_one(&self, id: &str) -> RepositoryResult<Product> {
        let query = build_find_one(id, &PRODUCT_SHAPE);
        self.reader
            .fetch_one(RepositoryOperation::FindOne, &query)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    async fn find_many(&self, criteria: &FilterCriteria) -> RepositoryResult<(Vec<Product>, u64)> {
        let find = build_find(criteria, &PRODUCT_SHAPE)?;
        let count = build_count(criteria, &PRODUCT_SHAPE)?;
        futures::try_join!(
            self.reader.fetch_many(RepositoryOperation::FindMany, &find),
            self.reader.fetch_count(&count),
        )
    }

    async fn insert(&self, data: NewProduct) -> RepositoryResult<Product> {
        data.validate()?;
        let operation = RepositoryOperation::Insert;

        let mut writer =
            TransactionalWriter::begin(&self.pool, operation, ENTITY, self.write_timeout).await?;
        let outcome = insert_steps(&mut writer, &data).await;
        let id = writer.finish(outcome).await?;

        self.find_one(&id).await.map_err(|e| e.with_operation(operation))
    }

    async fn update(&self, id: &str, patch: ProductUpdate) -> RepositoryResult<Product> {
        patch.validate()?;
        let operation = RepositoryOperation::Update;

        let mut writer =
            TransactionalWriter::begin(&self.pool, operation, ENTITY, self.write_timeout).await?;
        let outcome = update_steps(&mut writer, id, &patch).await;
        let replaced = writer.finish(outcome).await?;

        let stale = stale_images(replaced, patch.images.as_deref().unwrap_or_default());
        self.remove_files(operation, id, &stale).await;
        self.find_one(id).await.map_err(|e| e.with_operation(operation))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Delete;

        let mut writer =
            TransactionalWriter::begin(&self.pool, operation, ENTITY, self.write_timeout).await?;
        let outcome = delete_steps(&mut writer, id).await;
        let removed = writer.finish(outcome).await?;

        self.remove_files(operation, id, &removed).await;
        Ok(())
    }
}

/// products -> products_categories -> images
async fn insert_steps(
    writer: &mut TransactionalWriter,
    data: &NewProduct,
) -> RepositoryResult<String> {
    let operation = writer.operation();

    let parent = insert_returning_id(
        operation,
        "products",
        &["title", "description", "price"],
        vec![
            data.title.as_str().into(),
            data.description.as_str().into(),
            data.price.into(),
        ],
    )?;
    let id = writer.fetch_id(WriteStep::InsertParent, &parent).await?;

    let category = insert_category(operation, &id, data.category_id)?;
    writer.execute(WriteStep::InsertCategory, &category).await?;

    if !data.images.is_empty() {
        let images = insert_images(operation, &id, &data.images)?;
        writer.execute(WriteStep::InsertImages, &images).await?;
    }

    Ok(id)
}

/// Scalar columns -> category -> image set; returns the replaced images
async fn update_steps(
    writer: &mut TransactionalWriter,
    id: &str,
    patch: &ProductUpdate,
) -> RepositoryResult<Vec<Image>> {
    let operation = writer.operation();

    writer
        .execute_existing(WriteStep::UpdateParent, &update_parent(id, patch), id)
        .await?;

    if let Some(category_id) = patch.category_id {
        let reassign = BuiltQuery::from(Fragment::new(
            r#"UPDATE "products_categories" SET "category_id" = $? WHERE "product_id" = $?"#,
            vec![category_id.into(), id.into()],
        ));
        let rows = writer.execute(WriteStep::UpdateCategory, &reassign).await?;
        if rows == 0 {
            let category = insert_category(operation, id, category_id)?;
            writer.execute(WriteStep::InsertCategory, &category).await?;
        }
    }

    let Some(images) = &patch.images else {
        return Ok(Vec::new());
    };
    let existing = fetch_images(writer, id).await?;
    writer
        .execute(WriteStep::DeleteImages, &delete_images(id))
        .await?;
    if !images.is_empty() {
        let insert = insert_images(operation, id, images)?;
        writer.execute(WriteStep::InsertImages, &insert).await?;
    }

    Ok(existing)
}

/// images -> products_categories -> products; returns the removed images
async fn delete_steps(writer: &mut TransactionalWriter, id: &str) -> RepositoryResult<Vec<Image>> {
    let existing = fetch_images(writer, id).await?;
    writer
        .execute(WriteStep::DeleteImages, &delete_images(id))
        .await?;

    let category = BuiltQuery::from(Fragment::new(
        r#"DELETE FROM "products_categories" WHERE "product_id" = $?"#,
        vec![id.into()],
    ));
    writer.execute(WriteStep::DeleteCategory, &category).await?;

    let parent = BuiltQuery::from(Fragment::new(
        r#"DELETE FROM "products" WHERE "id" = $?"#,
        vec![id.into()],
    ));
    writer
        .execute_existing(WriteStep::DeleteParent, &parent, id)
        .await?;

    Ok(existing)
}

async fn fetch_images(
    writer: &mut TransactionalWriter,
    product_id: &str,
) -> RepositoryResult<Vec<Image>> {
    let query = BuiltQuery::from(Fragment::new(
        r#"SELECT "id", "filename", "url" FROM "images" WHERE "product_id" = $? ORDER BY length("id"), "id""#,
        vec![product_id.into()],
    ));
    writer.fetch_rows(WriteStep::FetchImages, &query).await
}

/// Replaced images whose file is not reused by the new image set
fn stale_images(replaced: Vec<Image>, kept: &[NewImage]) -> Vec<Image> {
    replaced
        .into_iter()
        .filter(|old| !kept.iter().any(|new| new.filename == old.filename))
        .collect()
}

fn update_parent(id: &str, patch: &ProductUpdate) -> BuiltQuery {
    UpdateSet::new("products")
        .set("title", patch.title.as_deref())
        .set("description", patch.description.as_deref())
        .set("price", patch.price)
        .build("id", id)
}

fn delete_images(product_id: &str) -> BuiltQuery {
    BuiltQuery::from(Fragment::new(
        r#"DELETE FROM "images" WHERE "product_id" = $?"#,
        vec![product_id.into()],
    ))
}

fn insert_category(
    operation: RepositoryOperation,
    product_id: &str,
    category_id: i64,
) -> RepositoryResult<BuiltQuery> {
    insert_rows(
        operation,
        "products_categories",
        &["product_id", "category_id"],
        vec![vec![product_id.into(), category_id.into()]],
    )
}

fn insert_images(
    operation: RepositoryOperation,
    product_id: &str,
    images: &[NewImage],
) -> RepositoryResult<BuiltQuery> {
    let rows: Vec<Vec<SqlValue>> = images
        .iter()
        .map(|image| {
            vec![
                image.filename.as_str().into(),
                image.url.as_str().into(),
                product_id.into(),
            ]
        })
        .collect();
    insert_rows(operation, "images", &["filename", "url", "product_id"], rows)
}
