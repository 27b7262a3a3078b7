use thiserror::Error;

/// Result type for datastore operations
pub type DatastoreResult<T> = Result<T, DatastoreError>;

/// Result type for raw object-storage calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors reported by an object-storage backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Storage service error ({code}): {source}")]
    Service {
        code: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BackendError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a service error carrying the remote's identifying code
    pub fn service<C, E>(code: C, error: E) -> Self
    where
        C: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Service {
            code: code.into(),
            source: error.into(),
        }
    }

    /// Identifying code of the failure
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Service { code, .. } => code,
            Self::Io { .. } => "Io",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced by the datastore adapter
#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Write failed for {key}: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Read failed for {key}: {source}")]
    ReadFailed {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Delete failed for {key}: {source}")]
    DeleteFailed {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Datastore open failed: {source}")]
    OpenFailed {
        #[source]
        source: BackendError,
    },

    #[error("Listing failed for prefix {prefix:?} ({code})")]
    ListingFailed {
        prefix: String,
        code: String,
        #[source]
        source: BackendError,
    },

    #[error("Existence check failed for {key}: {source}")]
    ExistenceCheckFailed {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Batch commit failed: {source}")]
    BatchFailed {
        #[source]
        source: Box<DatastoreError>,
    },

    #[error("The repo is already locked: {scope}")]
    AlreadyLocked {
        scope: String,
        #[source]
        source: Option<Box<DatastoreError>>,
    },
}

impl DatastoreError {
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn batch_failed(error: DatastoreError) -> Self {
        Self::BatchFailed {
            source: Box::new(error),
        }
    }

    /// Stable error code, compatible with interface-datastore codes
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ERR_NOT_FOUND",
            Self::WriteFailed { .. } => "ERR_DB_WRITE_FAILED",
            Self::ReadFailed { .. } => "ERR_DB_READ_FAILED",
            Self::DeleteFailed { .. } => "ERR_DB_DELETE_FAILED",
            Self::OpenFailed { .. } => "ERR_DB_OPEN_FAILED",
            Self::ListingFailed { .. } => "ERR_DB_LIST_FAILED",
            Self::ExistenceCheckFailed { .. } => "ERR_DB_HAS_FAILED",
            Self::BatchFailed { .. } => "ERR_DB_BATCH_FAILED",
            Self::AlreadyLocked { .. } => "ERR_LOCK_EXISTS",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_codes() {
        assert_eq!(BackendError::not_found("a").code(), "NotFound");
        assert_eq!(BackendError::service("SlowDown", "rate limited").code(), "SlowDown");
        let io = BackendError::from(std::io::Error::new(std::io::ErrorKind::Other, "eof"));
        assert_eq!(io.code(), "Io");
    }

    #[test]
    fn test_batch_failed_keeps_cause() {
        let inner = DatastoreError::WriteFailed {
            key: "/a".to_string(),
            source: BackendError::service("InternalError", "boom"),
        };
        let err = DatastoreError::batch_failed(inner);
        assert_eq!(err.code(), "ERR_DB_BATCH_FAILED");
        match err {
            DatastoreError::BatchFailed { source } => {
                assert_eq!(source.code(), "ERR_DB_WRITE_FAILED");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
