//! Repository facade contract, errors and pagination types
//!
//! - **Contract**: [`Repository`] (`find_one`, `find_many`, `insert`, `update`, `delete`)
//! - **Errors**: [`RepositoryError`] with operation, kind and failing [`WriteStep`]
//! - **Paging**: [`Pagination`] windows, [`OrderDirection`], and [`Page`] results

mod error;
mod pagination;
mod traits;

// Re-export all public types
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation, WriteStep};
pub use pagination::{OrderDirection, Page, Pagination};
pub use traits::{Repository, RepositoryResult};
