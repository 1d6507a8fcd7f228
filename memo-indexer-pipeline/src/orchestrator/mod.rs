//! This module defines the `Scanner` responsible for driving the pipeline
//! over the ledger and the `ScannerService` that runs it in the background.
//! It integrates the consumer, processor, and loader components to move
//! transactions from the ledger into the entity store.
mod scanner;
mod service;

pub use scanner::{
    BACKFILL_CURSOR, BLOCK_CURSOR, BackfillReport, ScanMode, ScanReport, Scanner, ScannerConfig,
    ScannerTotals,
};
pub use service::{ScannerHandle, ScannerHealth, ScannerService};
