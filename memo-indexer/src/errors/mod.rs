//! Error types for the Memo Indexer application.
//! Defines a comprehensive set of errors that can occur while configuring and
//! running the indexer, consolidating errors from the pipeline and repositories.
use memo_indexer_pipeline::errors::{
    AggregatorError, ConsumerError, DecodeError, LoaderError, ScannerError,
};
use memo_indexer_repository::{ActionsRepositoryError, CursorRepositoryError, ViewsRepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("{0} must be set")]
    MissingEnv(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("Actions repository error: {0}")]
    ActionsRepository(#[from] ActionsRepositoryError),
    #[error("Cursor repository error: {0}")]
    CursorRepository(#[from] CursorRepositoryError),
    #[error("Views repository error: {0}")]
    ViewsRepository(#[from] ViewsRepositoryError),
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
    #[error("Scanner error: {0}")]
    Scanner(#[from] ScannerError),
    #[error("Aggregator error: {0}")]
    Aggregator(#[from] AggregatorError),
    #[error("Ledger error: {0}")]
    Consumer(#[from] ConsumerError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Tracing error: {0}")]
    Tracing(String),
}
