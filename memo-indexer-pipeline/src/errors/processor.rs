//! Error types for the processor module of the Memo Indexer Pipeline.
//! Defines the reasons a transaction fails to decode into a memo action.
use memo_indexer_shared::types::ActionKind;
use thiserror::Error;

/// Why a transaction was not turned into an action.
///
/// `NotProtocol` is the common case for the ledger at large and is counted as
/// a skip; every other variant marks a protocol payload that broke a rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Transaction carries no memo payload")]
    NotProtocol,
    #[error("Malformed script: {0}")]
    MalformedScript(String),
    #[error("Unknown action kind byte: {0:#04x}")]
    UnknownKind(u8),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("{kind} payload is {size} bytes, maximum is {max}")]
    PayloadTooLarge {
        kind: ActionKind,
        size: usize,
        max: usize,
    },
    #[error("Invalid {field} hash length: {len}")]
    InvalidHash { field: &'static str, len: usize },
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Invalid poll type: {0}")]
    InvalidPollType(String),
    #[error("Field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("Could not derive the signing identity")]
    UnknownIdentity,
}
