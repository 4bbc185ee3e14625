use thiserror::Error;

/// Failure taxonomy shared by every layer of the engine.
///
/// `Validation`, `NotFound`, `Conflict` and `Forbidden` are terminal for the
/// current call. `UpstreamTransport` may be retried with the same idempotency
/// key; `UpstreamContractViolation` never is.
#[derive(Error, Debug)]
pub enum RentalError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Upstream contract violation: {0}")]
    UpstreamContractViolation(String),
    #[error("Upstream transport error: {0}")]
    UpstreamTransport(String),
    #[error("Persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RentalError {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RentalError::UpstreamTransport(_))
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        RentalError::Persistence(Box::new(std::io::Error::other(msg.into())))
    }
}

impl From<serde_json::Error> for RentalError {
    fn from(err: serde_json::Error) -> Self {
        RentalError::Persistence(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for RentalError {
    fn from(err: rocksdb::Error) -> Self {
        RentalError::Persistence(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RentalError>;
