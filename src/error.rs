use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    ConflictError(String),
    #[error("Precondition failed: {0}")]
    PreconditionError(String),
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, DistributionError>;
