//! Error types for the orchestrator module of the Memo Indexer Pipeline.
//! Defines specific errors that can occur while driving a scan.
use memo_indexer_repository::ActionsRepositoryError;
use thiserror::Error;

use crate::errors::{ConsumerError, LoaderError};
use crate::orchestrator::ScanMode;

/// Represents errors that stop a scan step.
///
/// Decode failures never appear here: they are counted by the scanner and the
/// scan continues. Everything in this enum leaves the cursor where it was.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("A {running} scan is already running")]
    ScanInProgress { running: ScanMode },
    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
    #[error("Actions repository error: {0}")]
    ActionsRepository(#[from] ActionsRepositoryError),
    #[error("No common ancestor with the ledger at or above height {0}")]
    UnrecoverableReorg(u64),
    #[error("Scanner task failed: {0}")]
    Task(String),
}
