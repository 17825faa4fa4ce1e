use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport or permission failure reported by the document store.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored document that does not decode into its model.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Another mutation of the same kind is still in flight for this operator.
    #[error("Operation already in progress: {0}")]
    Busy(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

#[cfg(feature = "grpc")]
impl From<AppError> for tonic::Status {
    fn from(err: AppError) -> Self {
        use tonic::Status;

        match err {
            AppError::Database(e) => Status::internal(format!("Database error: {}", e)),
            AppError::Serialization(e) => Status::internal(format!("Serialization error: {}", e)),
            AppError::Store(msg) => Status::unavailable(msg),
            AppError::Storage(msg) => Status::internal(format!("Storage error: {}", msg)),
            AppError::NotFound(msg) => Status::not_found(msg),
            AppError::InvalidInput(msg) => Status::invalid_argument(msg),
            AppError::InvalidRecord(msg) => Status::data_loss(msg),
            AppError::Conflict(msg) => Status::failed_precondition(msg),
            AppError::Unauthenticated => Status::unauthenticated("Authentication required"),
            AppError::PermissionDenied(msg) => Status::permission_denied(msg),
            AppError::Busy(msg) => Status::aborted(msg),
            AppError::Timeout(msg) => Status::deadline_exceeded(msg),
            AppError::Cancelled(msg) => Status::cancelled(msg),
            AppError::Internal(msg) => Status::internal(msg),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
