use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Identifier {field} out of range: {value}")]
    IdentifierOutOfRange { field: &'static str, value: u64 },

    #[error("Publish error: {0}")]
    PublishError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
