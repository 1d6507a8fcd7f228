//! # Memo Indexer Pipeline
//! This crate defines the core traits and modules for turning ledger
//! transactions into stored memo actions.
//! It includes modules for consuming the ledger, decoding payloads, loading
//! changesets, orchestrating scans and running the derived aggregators, along
//! with error handling.
pub mod aggregator;
pub mod consumer;
pub mod loader;
pub mod orchestrator;
pub mod processor;

pub mod errors;
