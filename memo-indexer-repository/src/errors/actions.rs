//! Error types for the actions repository.
//! Defines specific errors that can occur during database operations related to actions.
use memo_indexer_shared::types::InvalidIdentity;
use thiserror::Error;

/// Represents errors that can occur within the actions repository.
///
/// This enum consolidates various error conditions specific to database interactions,
/// such as SQLx errors during database operations and rows that no longer decode
/// into domain types.
#[derive(Debug, Error)]
pub enum ActionsRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] InvalidIdentity),

    #[error("Invalid action kind: {0}")]
    InvalidKind(i16),

    #[error("Invalid block height: {0}")]
    InvalidHeight(i64),

    #[error("Block {0} is not stored")]
    MissingBlock(u64),
}
