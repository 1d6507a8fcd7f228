//! Error types for the derived aggregators.
use memo_indexer_repository::{ActionsRepositoryError, ViewsRepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Actions repository error: {0}")]
    Actions(#[from] ActionsRepositoryError),
    #[error("Views repository error: {0}")]
    Views(#[from] ViewsRepositoryError),
    #[error("Unknown aggregator job: {0}")]
    UnknownJob(String),
}
