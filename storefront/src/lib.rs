//! # storefront
//!
//! Persistence core for a small e-commerce backend: products with a category
//! and images, and orders whose line items snapshot the product at purchase
//! time.
//!
//! ## Features
//!
//! - **Dynamic listing**: search, status, category and creation-day filters,
//!   whitelisted sorting and offset pagination, all with bound parameters
//! - **Atomic writes**: multi-table inserts, updates and deletes run in one
//!   transaction and report the step that failed
//! - **Nested aggregates**: each row comes back as one JSON document and is
//!   decoded straight into the domain type
//! - **Ambient stack**: figment configuration, JSON tracing, pooled PostgreSQL
//!   with retry on connect
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storefront::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let database = config
//!         .database
//!         .as_ref()
//!         .ok_or_else(|| Error::Internal("no [database] section configured".into()))?;
//!     let pool = create_pool(database).await?;
//!     initialize_schema(&pool).await?;
//!
//!     let storage = Arc::new(LocalFileStorage::from_config(&config.storage));
//!     let products = ProductRepository::from_config(pool.clone(), storage, &config);
//!     let orders = OrderRepository::from_config(pool, &config);
//!     let service = OrderService::new(orders, products, config.query.default_page_size);
//!
//!     let page = service
//!         .list_orders(FilterCriteria::new(1, 5).with_status("waiting"))
//!         .await?;
//!     println!("{} of {} orders", page.data.len(), page.total_item);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod orders;
pub mod products;
pub mod query;
pub mod repository;
pub mod storage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, QueryConfig, ServiceConfig, StorageConfig};
    pub use crate::database::{create_pool, initialize_schema};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::orders::{
        NewOrder, Order, OrderItem, OrderRepository, OrderService, OrderStatus, OrderUpdate,
        PlaceOrder, TransferSlip,
    };
    pub use crate::products::{
        Category, Image, NewImage, NewProduct, Product, ProductRepository, ProductUpdate,
    };
    pub use crate::query::FilterCriteria;
    pub use crate::repository::{
        OrderDirection, Page, Repository, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult,
    };
    pub use crate::storage::{FileStorage, LocalFileStorage};
}
