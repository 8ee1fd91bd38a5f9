use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed {kind} envelope for item {id}: {reason}")]
    MalformedEnvelope {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Bug not found: {0}")]
    BugNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
