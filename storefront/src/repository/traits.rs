//! Repository trait definitions
//!
//! Uses RPITIT (Return Position Impl Trait In Traits), so implementors write
//! plain `async fn` and callers can stay generic over the facade.

use std::future::Future;

use super::error::RepositoryError;
use crate::query::FilterCriteria;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// The only entry point the rest of the system uses for an aggregate
///
/// # Type Parameters
///
/// - `Entity`: the fully materialized aggregate
/// - `Create`: input for [`insert`](Self::insert)
/// - `Patch`: partial update for [`update`](Self::update); absent fields are left alone
///
/// # Example
///
/// ```rust,ignore
/// use storefront::query::FilterCriteria;
/// use storefront::repository::Repository;
///
/// let (orders, total) = repo.find_many(&FilterCriteria::new(1, 5).with_status("paid")).await?;
/// ```
pub trait Repository<Entity, Create, Patch>: Send + Sync {
    /// Load one aggregate, or a `NotFound` error
    fn find_one(&self, id: &str) -> impl Future<Output = RepositoryResult<Entity>> + Send;

    /// Load one page of aggregates plus the total matching the same filters
    fn find_many(
        &self,
        criteria: &FilterCriteria,
    ) -> impl Future<Output = RepositoryResult<(Vec<Entity>, u64)>> + Send;

    /// Insert an aggregate and its children atomically, returning it as stored
    fn insert(&self, data: Create) -> impl Future<Output = RepositoryResult<Entity>> + Send;

    /// Apply the present fields of `patch` atomically, returning the result
    fn update(
        &self,
        id: &str,
        patch: Patch,
    ) -> impl Future<Output = RepositoryResult<Entity>> + Send;

    /// Delete an aggregate and its children atomically
    fn delete(&self, id: &str) -> impl Future<Output = RepositoryResult<()>> + Send;
}
