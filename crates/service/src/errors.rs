use thiserror::Error;

/// Backend-neutral failure taxonomy shared by every storage adapter.
///
/// Adapters translate driver errors into these variants at their boundary so
/// callers never see a CouchDB status code or a MongoDB error kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("note already exists: {0}")]
    AlreadyExists(String),
    #[error("note {0} was modified concurrently")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    #[error("storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            StorageError::NotFound(_) => 2001,
            StorageError::AlreadyExists(_) => 2002,
            StorageError::Conflict(_) => 2003,
            StorageError::Unavailable(_) => 2101,
            StorageError::Cancelled => 2201,
            StorageError::DeadlineExceeded => 2202,
            StorageError::Internal(_) => 2300,
        }
    }

    /// Short label used as the `outcome` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "not_found",
            StorageError::AlreadyExists(_) => "already_exists",
            StorageError::Conflict(_) => "conflict",
            StorageError::Unavailable(_) => "unavailable",
            StorageError::Cancelled => "cancelled",
            StorageError::DeadlineExceeded => "deadline_exceeded",
            StorageError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<models::errors::ModelError> for ServiceError {
    fn from(err: models::errors::ModelError) -> Self {
        match err {
            models::errors::ModelError::Validation(msg) => ServiceError::Validation(msg),
        }
    }
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Storage(StorageError::NotFound(_)))
    }
}
