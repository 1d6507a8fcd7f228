//! Error types for the consumer module of the Memo Indexer Pipeline.
//! Defines specific errors that can occur while reading blocks and transactions
//! from the ledger.
use thiserror::Error;

/// Represents errors that can occur within the ledger consumer.
///
/// This enum consolidates transport failures, errors reported by the node and
/// responses that could not be decoded into ledger types.
#[derive(Debug, Error, Clone)]
pub enum ConsumerError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Error decoding ledger data: {0}")]
    Decoding(String),
    #[error("Block {0} not found")]
    BlockNotFound(u64),
}

impl ConsumerError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConsumerError::Http(_))
    }
}
