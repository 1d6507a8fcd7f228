use memo_indexer_shared::types::InvalidIdentity;
use thiserror::Error;

/// Errors raised while reading or writing the derived views.
#[derive(Debug, Error)]
pub enum ViewsRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] InvalidIdentity),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}
