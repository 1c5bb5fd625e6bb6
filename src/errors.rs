use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("Duplicate key for index {index}: {key}")]
    DuplicateKey { index: String, key: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store operation failed: {category} {message}")]
    StoreOperation { category: String, message: String },

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

impl DbError {
    /// Stable label for the error kind, used when a failure is re-raised
    /// across the soft-delete boundary.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NoSuchCollection(_) => "NoSuchCollection",
            Self::CollectionAlreadyExists(_) => "CollectionAlreadyExists",
            Self::DuplicateKey { .. } => "DuplicateKey",
            Self::Configuration(_) => "ConfigurationError",
            Self::StoreOperation { .. } => "StoreOperationError",
            Self::QueryError(_) => "QueryError",
            Self::SessionError(_) => "SessionError",
        }
    }
}
