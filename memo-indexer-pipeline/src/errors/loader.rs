//! Error types for the loader module of the Memo Indexer Pipeline.
//! Defines specific errors that can occur during the loading and persistence
//! of decoded actions.
use memo_indexer_repository::{ActionsRepositoryError, CursorRepositoryError};
use thiserror::Error;

/// Represents errors that can occur within the actions loader.
///
/// This enum consolidates various error conditions specific to the loading
/// process, including errors propagated from the repositories.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Actions repository error: {0}")]
    ActionsRepository(#[from] ActionsRepositoryError),
    #[error("Cursor repository error: {0}")]
    CursorRepository(#[from] CursorRepositoryError),
}
