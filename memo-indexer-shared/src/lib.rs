//! # Memo Indexer Shared
//! Domain types shared by every crate of the memo indexer: decoded actions,
//! identities, blocks, the shape of ledger transactions, derived view records,
//! the protocol rules and the chain resolver that orders identity histories.
pub mod protocol;
pub mod resolver;
pub mod types;
