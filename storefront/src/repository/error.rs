//! Repository error types
//!
//! Every failure that leaves the query builder, the write engine or the
//! materializer is a [`RepositoryError`]. It carries the facade operation,
//! a coarse [`RepositoryErrorKind`], and for multi-statement writes the
//! [`WriteStep`] that failed.
//!
//! # Example
//!
//! ```rust
//! use storefront::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("Order", "ord_123");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

/// Facade operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Loading a single aggregate by id
    FindOne,
    /// Loading a filtered, sorted page of aggregates
    FindMany,
    /// Counting aggregates matching a filter
    Count,
    /// Inserting an aggregate and its children
    Insert,
    /// Applying a partial update
    Update,
    /// Deleting an aggregate and its children
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindOne => write!(f, "find_one"),
            Self::FindMany => write!(f, "find_many"),
            Self::Count => write!(f, "count"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found
    NotFound,
    /// Input was rejected before touching the store
    ValidationFailed,
    /// Database constraint violation (SQLSTATE class 23)
    ConstraintViolation,
    /// Failed to reach the database
    ConnectionFailed,
    /// Operation exceeded its time bound
    Timeout,
    /// Underlying database error
    DatabaseError,
    /// Aggregate payload did not match the entity shape
    DecodeError,
    /// File-storage collaborator failed
    StorageError,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::DecodeError => write!(f, "decode_error"),
            Self::StorageError => write!(f, "storage_error"),
        }
    }
}

/// Individual statement or phase of a repository operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStep {
    /// Opening the transaction
    Begin,
    /// Running a read query
    Query,
    /// Decoding the aggregate payload
    Decode,
    /// Inserting the root row
    InsertParent,
    /// Bulk-inserting child rows
    InsertChildren,
    /// Inserting the product/category association
    InsertCategory,
    /// Bulk-inserting image rows
    InsertImages,
    /// Updating scalar columns of the root row
    UpdateParent,
    /// Reassigning the product category
    UpdateCategory,
    /// Reading the images about to be replaced
    FetchImages,
    /// Deleting image rows
    DeleteImages,
    /// Deleting child rows
    DeleteChildren,
    /// Deleting the product/category association
    DeleteCategory,
    /// Deleting the root row
    DeleteParent,
    /// Committing the transaction
    Commit,
    /// Removing backing files after commit
    DeleteFiles,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Query => "query",
            Self::Decode => "decode",
            Self::InsertParent => "insert_parent",
            Self::InsertChildren => "insert_children",
            Self::InsertCategory => "insert_category",
            Self::InsertImages => "insert_images",
            Self::UpdateParent => "update_parent",
            Self::UpdateCategory => "update_category",
            Self::FetchImages => "fetch_images",
            Self::DeleteImages => "delete_images",
            Self::DeleteChildren => "delete_children",
            Self::DeleteCategory => "delete_category",
            Self::DeleteParent => "delete_parent",
            Self::Commit => "commit",
            Self::DeleteFiles => "delete_files",
        };
        f.write_str(name)
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use storefront::repository::{RepositoryError, RepositoryOperation, WriteStep};
///
/// let error = RepositoryError::database_error(RepositoryOperation::Insert, "relation does not exist")
///     .with_step(WriteStep::InsertChildren)
///     .with_entity("Order", "42");
/// assert_eq!(
///     error.to_string(),
///     "Repository database_error error during insert at insert_children: relation does not exist [Order: 42]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// The statement that failed, for multi-step operations
    pub step: Option<WriteStep>,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Order", "Product")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            step: None,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// The operation defaults to [`RepositoryOperation::FindOne`]; writes
    /// override it with [`with_operation`](Self::with_operation).
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::FindOne,
            RepositoryErrorKind::NotFound,
            "Entity not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create a validation failed error
    ///
    /// ```rust
    /// use storefront::repository::{RepositoryError, RepositoryOperation};
    ///
    /// let error = RepositoryError::validation_failed(
    ///     RepositoryOperation::Insert,
    ///     "order must contain at least one line item",
    /// );
    /// assert!(!error.is_retriable());
    /// ```
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create a database error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Create a decode error
    ///
    /// Distinct from [`not_found`](Self::not_found): the store answered, but
    /// the payload did not have the expected shape.
    pub fn decode(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DecodeError, message)
            .with_step(WriteStep::Decode)
    }

    /// Create a file-storage error
    pub fn storage(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::StorageError, message)
            .with_step(WriteStep::DeleteFiles)
    }

    /// Classify a driver error raised while running `step` of `operation`
    ///
    /// ```rust
    /// use storefront::repository::{
    ///     RepositoryError, RepositoryErrorKind, RepositoryOperation, WriteStep,
    /// };
    ///
    /// let error = RepositoryError::from_sqlx(
    ///     RepositoryOperation::Insert,
    ///     WriteStep::Begin,
    ///     sqlx::Error::PoolTimedOut,
    /// );
    /// assert_eq!(error.kind, RepositoryErrorKind::Timeout);
    /// assert_eq!(error.step, Some(WriteStep::Begin));
    /// ```
    pub fn from_sqlx(operation: RepositoryOperation, step: WriteStep, err: sqlx::Error) -> Self {
        Self::new(operation, classify_sqlx_error(&err), err.to_string()).with_step(step)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Set the step that failed
    #[must_use]
    pub fn with_step(mut self, step: WriteStep) -> Self {
        self.step = Some(step);
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    ///
    /// The repository itself never retries; callers decide.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Repository {} error during {}", self.kind, self.operation)?;
        if let Some(step) = self.step {
            write!(f, " at {}", step)?;
        }
        write!(f, ": {}", self.message)?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

/// Map a driver error onto the repository taxonomy
fn classify_sqlx_error(err: &sqlx::Error) -> RepositoryErrorKind {
    use sqlx::Error;
    match err {
        Error::RowNotFound => RepositoryErrorKind::NotFound,
        Error::PoolTimedOut => RepositoryErrorKind::Timeout,
        Error::Io(_) | Error::Tls(_) | Error::PoolClosed | Error::WorkerCrashed => {
            RepositoryErrorKind::ConnectionFailed
        }
        Error::ColumnDecode { .. } | Error::Decode(_) => RepositoryErrorKind::DecodeError,
        Error::Database(db) if db.code().is_some_and(|code| code.starts_with("23")) => {
            RepositoryErrorKind::ConstraintViolation
        }
        _ => RepositoryErrorKind::DatabaseError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::FindOne), "find_one");
        assert_eq!(format!("{}", RepositoryOperation::FindMany), "find_many");
        assert_eq!(format!("{}", RepositoryOperation::Count), "count");
        assert_eq!(format!("{}", RepositoryOperation::Insert), "insert");
        assert_eq!(format!("{}", RepositoryOperation::Update), "update");
        assert_eq!(format!("{}", RepositoryOperation::Delete), "delete");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(
            format!("{}", RepositoryErrorKind::ConstraintViolation),
            "constraint_violation"
        );
        assert_eq!(format!("{}", RepositoryErrorKind::DecodeError), "decode_error");
        assert_eq!(format!("{}", RepositoryErrorKind::StorageError), "storage_error");
    }

    #[test]
    fn test_write_step_display() {
        assert_eq!(WriteStep::InsertParent.to_string(), "insert_parent");
        assert_eq!(WriteStep::FetchImages.to_string(), "fetch_images");
        assert_eq!(WriteStep::DeleteFiles.to_string(), "delete_files");
    }

    #[test]
    fn test_not_found_convenience() {
        let error = RepositoryError::not_found("Product", "p_1")
            .with_operation(RepositoryOperation::Update);
        assert_eq!(error.operation, RepositoryOperation::Update);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.entity_type.as_deref(), Some("Product"));
        assert_eq!(error.entity_id.as_deref(), Some("p_1"));
        assert!(error.step.is_none());
    }

    #[test]
    fn test_decode_is_distinct_from_not_found() {
        let error = RepositoryError::decode(RepositoryOperation::FindMany, "missing field `qty`");
        assert_eq!(error.kind, RepositoryErrorKind::DecodeError);
        assert_eq!(error.step, Some(WriteStep::Decode));
        assert_ne!(error.kind, RepositoryErrorKind::NotFound);
    }

    #[test]
    fn test_from_sqlx_classification() {
        let not_found = RepositoryError::from_sqlx(
            RepositoryOperation::FindOne,
            WriteStep::Query,
            sqlx::Error::RowNotFound,
        );
        assert_eq!(not_found.kind, RepositoryErrorKind::NotFound);

        let closed = RepositoryError::from_sqlx(
            RepositoryOperation::Insert,
            WriteStep::Begin,
            sqlx::Error::PoolClosed,
        );
        assert_eq!(closed.kind, RepositoryErrorKind::ConnectionFailed);
        assert!(closed.is_retriable());

        let protocol = RepositoryError::from_sqlx(
            RepositoryOperation::Update,
            WriteStep::UpdateParent,
            sqlx::Error::Protocol("unexpected message".to_string()),
        );
        assert_eq!(protocol.kind, RepositoryErrorKind::DatabaseError);
        assert_eq!(protocol.step, Some(WriteStep::UpdateParent));
        assert!(!protocol.is_retriable());
    }

    #[test]
    fn test_is_retriable_permanent_errors() {
        assert!(!RepositoryError::not_found("Order", "1").is_retriable());
        assert!(
            !RepositoryError::validation_failed(RepositoryOperation::Insert, "empty").is_retriable()
        );
        assert!(!RepositoryError::storage(RepositoryOperation::Delete, "denied").is_retriable());
        assert!(RepositoryError::timeout(RepositoryOperation::FindMany, "30s").is_retriable());
    }

    #[test]
    fn test_display_without_step_or_entity() {
        let error = RepositoryError::validation_failed(
            RepositoryOperation::FindMany,
            "start date must not be after end date",
        );
        assert_eq!(
            error.to_string(),
            "Repository validation_failed error during find_many: start date must not be after end date"
        );
    }

    #[test]
    fn test_display_with_step_and_entity() {
        let error = RepositoryError::not_found("Order", "ord_9")
            .with_operation(RepositoryOperation::Delete)
            .with_step(WriteStep::DeleteParent);
        let display = error.to_string();
        assert!(display.contains("during delete at delete_parent"));
        assert!(display.ends_with("[Order: ord_9]"));
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: Box<dyn std::error::Error> = Box::new(RepositoryError::not_found("Order", "1"));
        assert!(error.to_string().contains("not_found"));
    }
}
