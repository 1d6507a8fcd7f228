//! Memo Indexer Library
//!
//! This library provides the application layer of the memo indexer: settings
//! read from the environment, dependency wiring, the one-shot commands and
//! error handling.

pub mod commands;
pub mod config;
pub mod errors;

pub use config::{Dependencies, LogFormat, Settings};
pub use errors::IndexingError;
