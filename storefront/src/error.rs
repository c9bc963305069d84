//! Crate-level error type
//!
//! Repository operations report [`RepositoryError`]; everything around them
//! (configuration, pool setup, schema bootstrap, file storage) reports
//! [`Error`].

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside the repository core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Connecting to or bootstrapping the database failed
    #[error("Database error: {0}")]
    Database(String),

    /// A repository operation failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A backing file could not be removed
    #[error("Failed to delete '{destination}': {source}")]
    Storage {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    /// A storage destination escaped the storage root
    #[error("Invalid storage destination '{0}': must be a relative path inside the storage root")]
    InvalidDestination(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementation for the boxed config error
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
